//! Related-resource snapshots.
//!
//! A snapshot is rebuilt from scratch on every computation by re-scanning the
//! document view; it is never patched in place. Incremental Added/Removed
//! notifications come from diffing two snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::dom::{CssRule, DocumentView, SheetAccessError, StyleSheet};

/// Errors raised while scanning the document view.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Stylesheet rules were unreadable for a reason other than cross-origin
    #[error("stylesheet rules inaccessible: {0}")]
    SheetAccess(String),
}

/// The externally referenced resources of a previewed document.
///
/// `scripts` maps script URL to `true` (wire shape fixed by the serving
/// layer); `stylesheets` maps stylesheet URL to the list of base URLs that
/// pulled it in. A sheet reachable through several `@import` chains carries
/// one base entry per chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedSnapshot {
    pub scripts: BTreeMap<String, bool>,
    pub stylesheets: BTreeMap<String, Vec<String>>,
}

impl RelatedSnapshot {
    /// Stylesheet URLs present in `newer` but not in `self`, with their roots.
    pub fn added_stylesheets(&self, newer: &Self) -> Vec<(String, Vec<String>)> {
        newer
            .stylesheets
            .iter()
            .filter(|(href, _)| !self.stylesheets.contains_key(*href))
            .map(|(href, roots)| (href.clone(), roots.clone()))
            .collect()
    }

    /// Stylesheet URLs present in `self` but not in `newer`, with their roots.
    pub fn removed_stylesheets(&self, newer: &Self) -> Vec<(String, Vec<String>)> {
        newer.added_stylesheets(self)
    }

    /// Whether a URL is referenced as a script or stylesheet.
    pub fn contains(&self, url: &str) -> bool {
        self.scripts.contains_key(url) || self.stylesheets.contains_key(url)
    }
}

/// Compute the current snapshot from the live document view.
///
/// Synchronous and side-effect-free. Scripts with an empty or missing `src`
/// are skipped. Stylesheets are walked recursively through `@import` rules,
/// accumulating the top-level sheet as the base for every sheet it reaches.
/// A cross-origin sheet contributes its own href but no imports; any other
/// rule-access failure aborts the scan.
pub fn related(doc: &dyn DocumentView) -> Result<RelatedSnapshot, TrackerError> {
    let mut snapshot = RelatedSnapshot::default();

    for script in doc.scripts() {
        if let Some(src) = script.src
            && !src.is_empty()
        {
            snapshot.scripts.insert(src, true);
        }
    }

    for sheet in doc.style_sheets() {
        if let Some(base) = sheet.href.clone() {
            walk_sheet(&sheet, &base, &mut snapshot)?;
        }
    }

    Ok(snapshot)
}

fn walk_sheet(
    sheet: &StyleSheet,
    base: &str,
    snapshot: &mut RelatedSnapshot,
) -> Result<(), TrackerError> {
    if let Some(href) = &sheet.href {
        snapshot
            .stylesheets
            .entry(href.clone())
            .or_default()
            .push(base.to_string());
    }

    let rules = match &sheet.rules {
        Ok(rules) => rules,
        // Cross-origin sheet: no rules visible, not a fatal error
        Err(SheetAccessError::CrossOrigin) => return Ok(()),
        Err(SheetAccessError::Failed(msg)) => {
            return Err(TrackerError::SheetAccess(msg.clone()));
        }
    };

    for rule in rules {
        if let CssRule::Import(inner) = rule {
            walk_sheet(inner, base, snapshot)?;
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
