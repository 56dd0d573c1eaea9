//! Live document and virtual content registries.
//!
//! Both maps are populated by document-lifecycle collaborators (the editor's
//! document subsystem) and read by the resolver. All mutation goes through
//! the explicit add/remove/clear calls here; the resolver never writes.

use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// A file currently open and instrumented for live preview.
#[derive(Debug, Clone, Default)]
pub struct LiveDocument {
    /// Pre-instrumented response body (HTML with live-preview hooks
    /// injected). `None` while instrumentation has not produced one yet.
    pub instrumented: Option<String>,
}

impl LiveDocument {
    pub fn instrumented(body: impl Into<String>) -> Self {
        Self {
            instrumented: Some(body.into()),
        }
    }
}

/// Shared registries consulted during content resolution.
///
/// Thread-safe: the HTTP pool and the broker task read concurrently while
/// editor collaborators mutate.
pub struct LiveDocumentRegistry {
    live: DashMap<PathBuf, LiveDocument>,
    overrides: DashMap<PathBuf, String>,
}

impl LiveDocumentRegistry {
    pub fn new() -> Self {
        Self {
            live: DashMap::new(),
            overrides: DashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // live instrumented documents
    // ------------------------------------------------------------------

    /// Register (or replace) the live document for a path.
    pub fn add(&self, path: impl Into<PathBuf>, doc: LiveDocument) {
        self.live.insert(path.into(), doc);
    }

    /// Drop the live document for a path.
    pub fn remove(&self, path: &Path) {
        self.live.remove(path);
    }

    /// Drop all live documents.
    pub fn clear(&self) {
        self.live.clear();
    }

    pub fn live(&self, path: &Path) -> Option<LiveDocument> {
        self.live.get(path).map(|d| d.clone())
    }

    // ------------------------------------------------------------------
    // virtual content overrides
    // ------------------------------------------------------------------

    /// Register explicit content served for a path regardless of live/disk
    /// state. Overrides win over everything, including dirty buffers.
    pub fn add_virtual_content_at_path(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.overrides.insert(path.into(), text.into());
    }

    /// Remove a virtual override.
    pub fn remove_virtual_content_at_path(&self, path: &Path) {
        self.overrides.remove(path);
    }

    pub fn virtual_content(&self, path: &Path) -> Option<String> {
        self.overrides.get(path).map(|t| t.clone())
    }
}

impl Default for LiveDocumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Collaborator interfaces
// =============================================================================

/// Access to open editor documents. Owned by the editor's document
/// subsystem; the resolver only reads current in-memory text.
pub trait DocumentStore: Send + Sync {
    /// Current (possibly unsaved) text of the open document at `path`,
    /// or `None` if the file is not open in any editor.
    fn open_document_text(&self, path: &Path) -> Option<String>;
}

/// Project boundary check. Paths outside the boundary are never served.
pub trait ProjectScope: Send + Sync {
    fn is_within_project(&self, path: &Path) -> bool;
}

/// Scope rooted at a single project directory.
pub struct WorkspaceScope {
    root: PathBuf,
}

impl WorkspaceScope {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ProjectScope for WorkspaceScope {
    fn is_within_project(&self, path: &Path) -> bool {
        crate::utils::path::is_within(&self.root, path)
    }
}

/// Simple map-backed document store. The editor bridge mirrors open buffers
/// into it; tests populate it directly.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    docs: DashMap<PathBuf, String>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.docs.insert(path.into(), text.into());
    }

    pub fn close(&self, path: &Path) {
        self.docs.remove(path);
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn open_document_text(&self, path: &Path) -> Option<String> {
        self.docs.get(path).map(|t| t.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_live_lifecycle() {
        let registry = LiveDocumentRegistry::new();
        let path = Path::new("/proj/index.html");

        assert!(registry.live(path).is_none());

        registry.add(path, LiveDocument::instrumented("<html>live</html>"));
        assert_eq!(
            registry.live(path).unwrap().instrumented.as_deref(),
            Some("<html>live</html>")
        );

        registry.remove(path);
        assert!(registry.live(path).is_none());

        registry.add(path, LiveDocument::default());
        registry.clear();
        assert!(registry.live(path).is_none());
    }

    #[test]
    fn test_registry_virtual_content_lifecycle() {
        let registry = LiveDocumentRegistry::new();
        let path = Path::new("/proj/gen.css");

        registry.add_virtual_content_at_path(path, "body{}");
        assert_eq!(registry.virtual_content(path).as_deref(), Some("body{}"));

        registry.remove_virtual_content_at_path(path);
        assert!(registry.virtual_content(path).is_none());
    }

    #[test]
    fn test_workspace_scope() {
        let scope = WorkspaceScope::new("/proj");
        assert!(scope.is_within_project(Path::new("/proj/a.html")));
        assert!(!scope.is_within_project(Path::new("/etc/passwd")));
        assert!(!scope.is_within_project(Path::new("/proj/../etc/passwd")));
    }

    #[test]
    fn test_in_memory_document_store() {
        let store = InMemoryDocumentStore::new();
        let path = Path::new("/proj/a.html");

        store.open(path, "<h1>hi</h1>");
        assert_eq!(store.open_document_text(path).as_deref(), Some("<h1>hi</h1>"));

        store.close(path);
        assert!(store.open_document_text(path).is_none());
    }
}
