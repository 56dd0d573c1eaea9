//! Content Resolution
//!
//! Given a resource path, decides what the preview should receive, in strict
//! precedence order:
//!
//! 1. Security check (path outside the project root is never served)
//! 2. Virtual override (wins over everything, even dirty buffers)
//! 3. Rendered Markdown (when the file is open in an editor)
//! 4. Live instrumented document body
//! 5. Open buffer's in-memory text (makes unsaved edits visible)
//! 6. Raw disk bytes
//!
//! Steps 1-5 are synchronous map lookups; only the disk fallback does I/O.
//! Every resolution produces a result; file errors degrade to an empty
//! content marker instead of propagating, so no request is ever left hanging.

pub mod markdown;
pub mod store;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::protocol::{ChannelResponse, RequestId};
use crate::utils::mime;
pub use store::{
    DocumentStore, InMemoryDocumentStore, LiveDocument, LiveDocumentRegistry, ProjectScope,
    WorkspaceScope,
};

/// Fixed message served in place of files outside the project root.
pub const SECURITY_MESSAGE: &str =
    "Preview security: files outside the project cannot be previewed.";

/// What a path resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedContent {
    /// Explicitly registered override
    VirtualOverride(String),
    /// Open Markdown buffer rendered into the themed preview page
    RenderedMarkdown(String),
    /// Pre-instrumented live document body
    LiveInstrumented(String),
    /// Open buffer's current in-memory text
    LiveBuffer(String),
    /// Raw bytes read from storage
    DiskBytes(Vec<u8>),
    /// Path refused by the project boundary check
    SecurityRejection,
    /// Disk read failed; best-effort empty content
    Missing,
}

impl ResolvedContent {
    /// Text body for the JSON channel. Binary disk bytes degrade to lossy
    /// UTF-8 (the HTTP front serves binaries verbatim; the channel carries
    /// text resources).
    pub fn text_contents(&self) -> Option<String> {
        match self {
            Self::VirtualOverride(text)
            | Self::RenderedMarkdown(text)
            | Self::LiveInstrumented(text)
            | Self::LiveBuffer(text) => Some(text.clone()),
            Self::DiskBytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Self::SecurityRejection => Some(SECURITY_MESSAGE.to_string()),
            Self::Missing => None,
        }
    }

    /// Extra response headers. Only rendered Markdown needs one: the `.md`
    /// extension would otherwise make the consumer infer text/markdown.
    pub fn headers(&self) -> Option<BTreeMap<String, String>> {
        match self {
            Self::RenderedMarkdown(_) => Some(BTreeMap::from([(
                "Content-Type".to_string(),
                "text/html".to_string(),
            )])),
            _ => None,
        }
    }

    /// Package as the channel response for the originating request.
    pub fn into_channel_response(self, request_id: RequestId, path: String) -> ChannelResponse {
        let headers = self.headers();
        ChannelResponse::RequestResponse {
            request_id,
            path,
            contents: self.text_contents(),
            headers,
        }
    }
}

/// Resolves resource paths against overrides, open documents and disk.
///
/// One resolver per editor-host process; holds its own state and is passed
/// by reference to whatever owns the channel subscription.
pub struct ContentResolver {
    registry: Arc<LiveDocumentRegistry>,
    documents: Arc<dyn DocumentStore>,
    scope: Arc<dyn ProjectScope>,
}

impl ContentResolver {
    pub fn new(
        registry: Arc<LiveDocumentRegistry>,
        documents: Arc<dyn DocumentStore>,
        scope: Arc<dyn ProjectScope>,
    ) -> Self {
        Self {
            registry,
            documents,
            scope,
        }
    }

    pub fn registry(&self) -> &Arc<LiveDocumentRegistry> {
        &self.registry
    }

    /// Resolve the content to serve for `path`.
    ///
    /// Requests are independent: no ordering is guaranteed between concurrent
    /// resolutions, only that each one completes with exactly one result.
    pub async fn resolve(&self, path: &Path) -> ResolvedContent {
        if !self.scope.is_within_project(path) {
            crate::log!("security"; "refused path outside project: {}", path.display());
            return ResolvedContent::SecurityRejection;
        }

        if let Some(text) = self.registry.virtual_content(path) {
            return ResolvedContent::VirtualOverride(text);
        }

        // Markdown preview needs the buffer; a closed .md file falls through
        // to the raw disk read below (served unrendered, by design)
        if mime::is_markdown(path)
            && let Some(text) = self.documents.open_document_text(path)
        {
            let title = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return ResolvedContent::RenderedMarkdown(markdown::render_page(&text, &title));
        }

        if let Some(live) = self.registry.live(path)
            && let Some(body) = live.instrumented
        {
            return ResolvedContent::LiveInstrumented(body);
        }

        if let Some(text) = self.documents.open_document_text(path) {
            return ResolvedContent::LiveBuffer(text);
        }

        match tokio::fs::read(path).await {
            Ok(bytes) => ResolvedContent::DiskBytes(bytes),
            Err(e) => {
                crate::debug!("resolver"; "disk read failed for {}: {}", path.display(), e);
                ResolvedContent::Missing
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_resolver(root: &Path) -> (ContentResolver, Arc<InMemoryDocumentStore>) {
        let registry = Arc::new(LiveDocumentRegistry::new());
        let documents = Arc::new(InMemoryDocumentStore::new());
        let scope = Arc::new(WorkspaceScope::new(root));
        (
            ContentResolver::new(registry, Arc::clone(&documents) as _, scope),
            documents,
        )
    }

    #[tokio::test]
    async fn test_security_rejection_even_for_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("secret.txt");
        std::fs::write(&outside, "password").unwrap();

        let project = dir.path().join("proj");
        std::fs::create_dir(&project).unwrap();
        let (resolver, _) = make_resolver(&project);

        let resolved = resolver.resolve(&outside).await;
        assert_eq!(resolved, ResolvedContent::SecurityRejection);
        assert_eq!(resolved.text_contents().as_deref(), Some(SECURITY_MESSAGE));
    }

    #[tokio::test]
    async fn test_etc_passwd_returns_message_not_bytes() {
        let (resolver, _) = make_resolver(Path::new("/proj"));
        let resolved = resolver.resolve(Path::new("/etc/passwd")).await;
        assert_eq!(resolved, ResolvedContent::SecurityRejection);
    }

    #[tokio::test]
    async fn test_override_beats_dirty_buffer_regardless_of_order() {
        let (resolver, documents) = make_resolver(Path::new("/proj"));
        let path = Path::new("/proj/a.css");

        // Buffer first, then override
        documents.open(path, "buffer text");
        resolver
            .registry()
            .add_virtual_content_at_path(path, "override text");
        assert_eq!(
            resolver.resolve(path).await,
            ResolvedContent::VirtualOverride("override text".into())
        );

        // Override first, then (re)opened buffer
        documents.close(path);
        documents.open(path, "newer buffer text");
        assert_eq!(
            resolver.resolve(path).await,
            ResolvedContent::VirtualOverride("override text".into())
        );
    }

    #[tokio::test]
    async fn test_unsaved_buffer_served_over_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.html");
        std::fs::write(&path, "<h1>saved</h1>").unwrap();

        let (resolver, documents) = make_resolver(dir.path());
        documents.open(&path, "<h1>hi</h1>");

        assert_eq!(
            resolver.resolve(&path).await,
            ResolvedContent::LiveBuffer("<h1>hi</h1>".into())
        );
    }

    #[tokio::test]
    async fn test_open_markdown_renders_with_html_header() {
        let (resolver, documents) = make_resolver(Path::new("/proj"));
        let path = Path::new("/proj/readme.md");
        documents.open(path, "# Title");

        let resolved = resolver.resolve(path).await;
        let ResolvedContent::RenderedMarkdown(html) = &resolved else {
            panic!("expected RenderedMarkdown, got {resolved:?}");
        };
        assert!(html.contains("<h1>Title</h1>"));

        let headers = resolved.headers().unwrap();
        assert_eq!(headers.get("Content-Type").map(String::as_str), Some("text/html"));
    }

    #[tokio::test]
    async fn test_closed_markdown_falls_through_to_raw_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readme.md");
        std::fs::write(&path, "# Raw").unwrap();

        let (resolver, _) = make_resolver(dir.path());
        let resolved = resolver.resolve(&path).await;
        assert_eq!(resolved, ResolvedContent::DiskBytes(b"# Raw".to_vec()));
        assert!(resolved.headers().is_none());
    }

    #[tokio::test]
    async fn test_instrumented_body_beats_plain_buffer() {
        let (resolver, documents) = make_resolver(Path::new("/proj"));
        let path = Path::new("/proj/index.html");

        documents.open(path, "<html>plain</html>");
        resolver
            .registry()
            .add(path, LiveDocument::instrumented("<html>instrumented</html>"));

        assert_eq!(
            resolver.resolve(path).await,
            ResolvedContent::LiveInstrumented("<html>instrumented</html>".into())
        );

        // Live doc without an instrumented body falls to the buffer
        resolver.registry().add(path, LiveDocument::default());
        assert_eq!(
            resolver.resolve(path).await,
            ResolvedContent::LiveBuffer("<html>plain</html>".into())
        );
    }

    #[tokio::test]
    async fn test_disk_read_failure_resolves_to_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (resolver, _) = make_resolver(dir.path());

        let resolved = resolver.resolve(&dir.path().join("nope.html")).await;
        assert_eq!(resolved, ResolvedContent::Missing);
        assert_eq!(resolved.text_contents(), None);
    }

    #[test]
    fn test_channel_response_carries_request_identity() {
        let resolved = ResolvedContent::LiveBuffer("<h1>hi</h1>".into());
        let response =
            resolved.into_channel_response(json!("req-7"), "/proj/a.html".to_string());
        match response {
            ChannelResponse::RequestResponse {
                request_id,
                path,
                contents,
                headers,
            } => {
                assert_eq!(request_id, json!("req-7"));
                assert_eq!(path, "/proj/a.html");
                assert_eq!(contents.as_deref(), Some("<h1>hi</h1>"));
                assert!(headers.is_none());
            }
            other => panic!("expected RequestResponse, got {other:?}"),
        }
    }
}
