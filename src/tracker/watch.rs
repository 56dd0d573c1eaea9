//! Stylesheet load watches.
//!
//! When a `<link rel=stylesheet>` node appears, the host environment may not
//! have parsed the sheet yet, so it is absent from `document.styleSheets`.
//! Each watched href gets a poll task that waits for the sheet to surface and
//! then notifies the tracker. A watch that outlives its budget expires
//! silently: the host is never told the load failed.

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::TrackerMsg;
use super::dom::DocumentView;

/// Poll interval between `document.styleSheets` checks
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Total time budget before a watch expires
const POLL_BUDGET: Duration = Duration::from_secs(20);

/// Per-href poll timers for stylesheets that have not surfaced yet.
///
/// At most one watch exists per href: starting a new watch for an
/// already-watched href aborts the old timer first, so rapid re-additions of
/// the same link can never produce duplicate Added notifications.
pub struct StylesheetWatcher {
    interval: Duration,
    budget: Duration,
    watches: FxHashMap<String, JoinHandle<()>>,
}

impl StylesheetWatcher {
    pub fn new() -> Self {
        Self::with_timing(POLL_INTERVAL, POLL_BUDGET)
    }

    /// Custom timing, for tests that cannot wait out the real budget.
    pub fn with_timing(interval: Duration, budget: Duration) -> Self {
        Self {
            interval,
            budget,
            watches: FxHashMap::default(),
        }
    }

    /// Start (or restart) a watch for `href`.
    ///
    /// Sends `SheetLoaded` once the sheet appears in the document view, or
    /// `WatchExpired` after the budget runs out.
    pub fn start(
        &mut self,
        href: String,
        doc: Arc<dyn DocumentView>,
        tx: mpsc::Sender<TrackerMsg>,
    ) {
        if let Some(old) = self.watches.remove(&href) {
            old.abort();
        }

        let interval = self.interval;
        let attempts = (self.budget.as_millis() / self.interval.as_millis().max(1)).max(1);
        let task_href = href.clone();

        let handle = tokio::spawn(async move {
            for _ in 0..attempts {
                let loaded = doc
                    .style_sheets()
                    .iter()
                    .any(|s| s.href.as_deref() == Some(task_href.as_str()));
                if loaded {
                    let _ = tx.send(TrackerMsg::SheetLoaded(task_href)).await;
                    return;
                }
                tokio::time::sleep(interval).await;
            }
            // Soft failure: bookkeeping only, nothing goes upstream
            let _ = tx.send(TrackerMsg::WatchExpired(task_href)).await;
        });

        self.watches.insert(href, handle);
    }

    /// Drop the bookkeeping entry once a watch resolved or expired.
    pub fn finish(&mut self, href: &str) {
        self.watches.remove(href);
    }

    /// Whether a watch is currently running for `href`.
    pub fn is_watching(&self, href: &str) -> bool {
        self.watches.contains_key(href)
    }

    /// Abort all outstanding watches.
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.watches.drain() {
            handle.abort();
        }
    }
}

impl Default for StylesheetWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StylesheetWatcher {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

// =============================================================================
// Tests
// =============================================================================
