//! Host-side record of reported related resources.
//!
//! Each connected preview tab streams tracker events over the channel; the
//! index keeps the latest snapshot per tab so collaborators can ask "is this
//! URL related to anything currently previewed" (the editor uses this to
//! decide whether a saved file warrants a preview refresh).

use dashmap::DashMap;

use super::RelatedSnapshot;
use crate::protocol::TrackerEvent;

/// Latest related-resource snapshot per preview client.
///
/// Thread-safe. Fed by the channel actor, read by editor collaborators.
pub struct RelatedIndex {
    clients: DashMap<u64, RelatedSnapshot>,
}

impl RelatedIndex {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Apply one tracker event reported by `client`.
    pub fn apply(&self, client: u64, event: &TrackerEvent) {
        match event {
            TrackerEvent::DocumentRelated { related } => {
                self.clients.insert(client, related.clone());
            }
            TrackerEvent::ScriptAdded { src } => {
                self.clients
                    .entry(client)
                    .or_default()
                    .scripts
                    .insert(src.clone(), true);
            }
            TrackerEvent::ScriptRemoved { src } => {
                if let Some(mut snapshot) = self.clients.get_mut(&client) {
                    snapshot.scripts.remove(src);
                }
            }
            TrackerEvent::StylesheetAdded { href, roots } => {
                self.clients
                    .entry(client)
                    .or_default()
                    .stylesheets
                    .insert(href.clone(), roots.clone());
            }
            TrackerEvent::StylesheetRemoved { href, .. } => {
                if let Some(mut snapshot) = self.clients.get_mut(&client) {
                    snapshot.stylesheets.remove(href);
                }
            }
        }
    }

    /// Whether any connected client reports `url` as a related resource.
    pub fn is_related(&self, url: &str) -> bool {
        self.clients.iter().any(|entry| entry.value().contains(url))
    }

    /// Snapshot reported by a specific client.
    pub fn snapshot(&self, client: u64) -> Option<RelatedSnapshot> {
        self.clients.get(&client).map(|s| s.clone())
    }

    /// Forget a disconnected client.
    pub fn remove_client(&self, client: u64) {
        self.clients.remove(&client);
    }
}

impl Default for RelatedIndex {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
