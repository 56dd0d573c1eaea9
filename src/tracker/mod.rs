//! Related Resource Tracker
//!
//! Maintains a real-time view of which external scripts and stylesheets
//! (including transitively `@import`-ed sheets) a previewed document depends
//! on, and notifies the host over the transport whenever the set changes.
//!
//! # Architecture
//!
//! ```text
//! mutation observer --[NodeDescriptor]--> ResourceTracker --[TrackerEvent]--> Transport
//!                                              ^
//!                           StylesheetWatcher -+ (load polls)
//! ```
//!
//! # Modules
//!
//! - `dom` - document view abstraction and node descriptors
//! - `snapshot` - related-resource snapshots and diffing
//! - `watch` - per-href stylesheet load watches
//! - `index` - host-side record of reported snapshots

pub mod dom;
pub mod index;
pub mod snapshot;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::protocol::{self, TrackerEvent};
use crate::transport::Transport;
use dom::{DocumentView, NodeDescriptor};
pub use snapshot::{RelatedSnapshot, TrackerError, related};
use watch::StylesheetWatcher;

/// Messages to the tracker actor.
#[derive(Debug)]
pub enum TrackerMsg {
    /// Nodes the mutation observer saw added
    NodesAdded(Vec<NodeDescriptor>),
    /// Nodes the mutation observer saw removed
    NodesRemoved(Vec<NodeDescriptor>),
    /// A watched stylesheet surfaced in `document.styleSheets`
    SheetLoaded(String),
    /// A watch ran out its budget (soft failure, internal bookkeeping only)
    WatchExpired(String),
    /// Shutdown
    Shutdown,
}

/// Tracker actor: owns the current snapshot and the load watches.
pub struct ResourceTracker {
    doc: Arc<dyn DocumentView>,
    transport: Arc<dyn Transport>,
    snapshot: RelatedSnapshot,
    watcher: StylesheetWatcher,
    rx: mpsc::Receiver<TrackerMsg>,
    tx: mpsc::Sender<TrackerMsg>,
    started: bool,
}

impl ResourceTracker {
    pub fn new(doc: Arc<dyn DocumentView>, transport: Arc<dyn Transport>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            doc,
            transport,
            snapshot: RelatedSnapshot::default(),
            watcher: StylesheetWatcher::new(),
            rx,
            tx,
            started: false,
        }
    }

    /// Override watch timing (tests cannot wait out the real 20s budget).
    #[cfg(test)]
    pub fn with_watch_timing(mut self, interval: std::time::Duration, budget: std::time::Duration) -> Self {
        self.watcher = StylesheetWatcher::with_timing(interval, budget);
        self
    }

    /// Sender the mutation-observer binding feeds node descriptors into.
    pub fn handle(&self) -> mpsc::Sender<TrackerMsg> {
        self.tx.clone()
    }

    /// Current snapshot, freshly computed from the document view.
    pub fn related(&self) -> Result<RelatedSnapshot, TrackerError> {
        related(self.doc.as_ref())
    }

    /// Begin observation: compute the full snapshot and send one
    /// `DocumentRelated`. Safe to call more than once per page load; repeat
    /// calls are no-ops.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.snapshot = self.related()?;
        self.send_event(&TrackerEvent::DocumentRelated {
            related: self.snapshot.clone(),
        })?;
        self.started = true;
        Ok(())
    }

    /// Retained for interface symmetry; observers are torn down by the
    /// `Shutdown` message, not by this call.
    pub fn stop(&self) {}

    /// Run the actor event loop.
    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                TrackerMsg::NodesAdded(nodes) => {
                    for node in nodes {
                        self.on_node_added(node);
                    }
                }

                TrackerMsg::NodesRemoved(nodes) => {
                    for node in nodes {
                        self.on_node_removed(node);
                    }
                }

                TrackerMsg::SheetLoaded(href) => {
                    self.watcher.finish(&href);
                    self.on_sheet_loaded();
                }

                TrackerMsg::WatchExpired(href) => {
                    // The host never learns the load failed; accepted soft failure
                    crate::debug!("tracker"; "stylesheet watch expired: {}", href);
                    self.watcher.finish(&href);
                }

                TrackerMsg::Shutdown => {
                    self.watcher.cancel_all();
                    break;
                }
            }
        }
    }

    fn on_node_added(&mut self, node: NodeDescriptor) {
        match node {
            NodeDescriptor::Script { src: Some(src) } if !src.is_empty() => {
                self.snapshot.scripts.insert(src.clone(), true);
                self.emit(TrackerEvent::ScriptAdded { src });
            }
            NodeDescriptor::StylesheetLink { href: Some(href) } if !href.is_empty() => {
                // Do not notify yet: the sheet's rules may not be parsed.
                // The watch fires once document.styleSheets exposes it.
                self.watcher
                    .start(href, Arc::clone(&self.doc), self.tx.clone());
            }
            _ => {}
        }
    }

    fn on_node_removed(&mut self, node: NodeDescriptor) {
        match node {
            NodeDescriptor::Script { src: Some(src) } if !src.is_empty() => {
                self.snapshot.scripts.remove(&src);
                self.emit(TrackerEvent::ScriptRemoved { src });
            }
            NodeDescriptor::StylesheetLink { href: Some(_) } => {
                let new = match self.related() {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        crate::log!("tracker"; "snapshot failed: {}", e);
                        return;
                    }
                };
                for (href, roots) in self.snapshot.removed_stylesheets(&new) {
                    // Drop the synthetic element holding overridden sheet text
                    self.doc.remove_element_by_id(&href);
                    self.emit(TrackerEvent::StylesheetRemoved { href, roots });
                }
                self.snapshot.stylesheets = new.stylesheets;
            }
            _ => {}
        }
    }

    fn on_sheet_loaded(&mut self) {
        let new = match self.related() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                crate::log!("tracker"; "snapshot failed: {}", e);
                return;
            }
        };
        for (href, roots) in self.snapshot.added_stylesheets(&new) {
            self.emit(TrackerEvent::StylesheetAdded { href, roots });
        }
        self.snapshot.stylesheets = new.stylesheets;
    }

    fn emit(&self, event: TrackerEvent) {
        if let Err(e) = self.send_event(&event) {
            crate::log!("tracker"; "notify failed: {}", e);
        }
    }

    fn send_event(&self, event: &TrackerEvent) -> Result<()> {
        let frame = protocol::to_frame(event)?;
        self.transport.send(frame)
    }
}

// =============================================================================
// Test fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod testutil {
    use super::dom::{DocumentView, ScriptRef, StyleSheet};
    use crate::protocol::TrackerEvent;
    use crate::transport::Transport;
    use parking_lot::Mutex;

    /// Fixture document with settable scripts and sheets.
    pub struct FakeDocument {
        pub scripts: Mutex<Vec<ScriptRef>>,
        pub sheets: Mutex<Vec<StyleSheet>>,
        pub removed_ids: Mutex<Vec<String>>,
    }

    impl FakeDocument {
        pub fn new() -> Self {
            Self {
                scripts: Mutex::new(Vec::new()),
                sheets: Mutex::new(Vec::new()),
                removed_ids: Mutex::new(Vec::new()),
            }
        }
    }

    impl DocumentView for FakeDocument {
        fn scripts(&self) -> Vec<ScriptRef> {
            self.scripts.lock().clone()
        }

        fn style_sheets(&self) -> Vec<StyleSheet> {
            self.sheets.lock().clone()
        }

        fn remove_element_by_id(&self, id: &str) {
            self.removed_ids.lock().push(id.to_string());
        }
    }

    /// Transport that records every frame it is asked to send.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub frames: Mutex<Vec<String>>,
    }

    impl RecordingTransport {
        pub fn events(&self) -> Vec<TrackerEvent> {
            self.frames
                .lock()
                .iter()
                .map(|f| serde_json::from_str(f).expect("tracker frame should parse"))
                .collect()
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, frame: String) -> anyhow::Result<()> {
            self.frames.lock().push(frame);
            Ok(())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
