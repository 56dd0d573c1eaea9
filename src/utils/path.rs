//! URL to filesystem path resolution.

use std::path::{Component, Path, PathBuf};

/// Map a request URL to an absolute path under the project root.
///
/// Decodes percent-escapes, strips the query string, rejects traversal
/// segments, and appends `index.html` for bare directory URLs. The result is
/// lexical only; whether the path is actually servable is the resolver's call.
pub fn url_to_path(url: &str, project_root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url);

    // Reject traversal early, before touching the filesystem
    if clean.split('/').any(|seg| seg == "..") {
        return None;
    }

    let mut local = project_root.join(&clean);
    if clean.is_empty() || url.ends_with('/') {
        local = local.join("index.html");
    }
    Some(local)
}

/// Check that `path` lies within `root`, lexically.
///
/// Both paths are normalized (`.` and `..` components resolved) without
/// hitting the filesystem, so the check also holds for files that only
/// exist as open editor buffers or virtual overrides.
pub fn is_within(root: &Path, path: &Path) -> bool {
    let root = normalize_components(root);
    let path = normalize_components(path);
    path.starts_with(&root)
}

/// Resolve `.` and `..` components lexically.
fn normalize_components(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Normalize URL: decode, strip query string, trim slashes
fn normalize_url(url: &str) -> String {
    use percent_encoding::percent_decode_str;
    let decoded = percent_decode_str(url)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();

    let path = decoded.split('?').next().unwrap_or(&decoded);
    path.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_to_path_plain() {
        let root = Path::new("/proj");
        assert_eq!(
            url_to_path("/a/b.html", root),
            Some(PathBuf::from("/proj/a/b.html"))
        );
    }

    #[test]
    fn test_url_to_path_decodes_and_strips_query() {
        let root = Path::new("/proj");
        assert_eq!(
            url_to_path("/my%20file.css?v=2", root),
            Some(PathBuf::from("/proj/my file.css"))
        );
    }

    #[test]
    fn test_url_to_path_directory_gets_index() {
        let root = Path::new("/proj");
        assert_eq!(
            url_to_path("/", root),
            Some(PathBuf::from("/proj/index.html"))
        );
        assert_eq!(
            url_to_path("/docs/", root),
            Some(PathBuf::from("/proj/docs/index.html"))
        );
    }

    #[test]
    fn test_url_to_path_rejects_traversal() {
        let root = Path::new("/proj");
        assert_eq!(url_to_path("/../etc/passwd", root), None);
        assert_eq!(url_to_path("/%2e%2e/etc/passwd", root), None);
    }

    #[test]
    fn test_is_within() {
        let root = Path::new("/proj");
        assert!(is_within(root, Path::new("/proj/a.html")));
        assert!(is_within(root, Path::new("/proj/sub/./b.css")));
        assert!(!is_within(root, Path::new("/etc/passwd")));
        assert!(!is_within(root, Path::new("/proj/../etc/passwd")));
    }
}
