//! Document view abstraction.
//!
//! The tracker core never touches a real DOM. The browser-hosting layer
//! implements [`DocumentView`] over the live document and feeds the tracker
//! plain added/removed node descriptors; tests implement it over fixtures.

use std::fmt;

/// Read access to the previewed document's resource references.
pub trait DocumentView: Send + Sync {
    /// All `<script>` elements, in document order.
    fn scripts(&self) -> Vec<ScriptRef>;

    /// `document.styleSheets`, each with its (possibly inaccessible) rules.
    fn style_sheets(&self) -> Vec<StyleSheet>;

    /// Remove a synthetic element holding overridden stylesheet text.
    /// Such elements carry the stylesheet URL as their id.
    fn remove_element_by_id(&self, id: &str);
}

/// A `<script>` element reference.
#[derive(Debug, Clone)]
pub struct ScriptRef {
    /// `src` attribute; `None` or empty for inline scripts.
    pub src: Option<String>,
}

/// A stylesheet entry, either top-level or pulled in via `@import`.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    /// Absolute URL; `None` for inline `<style>` blocks.
    pub href: Option<String>,
    /// Parsed rules, or the access error the host environment raised.
    pub rules: Result<Vec<CssRule>, SheetAccessError>,
}

impl StyleSheet {
    /// A same-origin sheet with the given href and rules.
    pub fn external(href: impl Into<String>, rules: Vec<CssRule>) -> Self {
        Self {
            href: Some(href.into()),
            rules: Ok(rules),
        }
    }

    /// A sheet whose rules cannot be read across origins.
    pub fn cross_origin(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            rules: Err(SheetAccessError::CrossOrigin),
        }
    }
}

/// A CSS rule as far as the tracker cares: imports carry a nested sheet.
#[derive(Debug, Clone)]
pub enum CssRule {
    /// `@import` rule with the imported sheet.
    Import(StyleSheet),
    /// Anything else (style rules, media blocks, ...).
    Other,
}

/// Why a sheet's rules could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetAccessError {
    /// Cross-origin sheet: treated as "no visible imports"
    CrossOrigin,
    /// Anything else is a real error and propagates
    Failed(String),
}

impl fmt::Display for SheetAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CrossOrigin => write!(f, "cross-origin stylesheet"),
            Self::Failed(msg) => write!(f, "{msg}"),
        }
    }
}

/// A node the mutation observer saw added to or removed from the document.
#[derive(Debug, Clone)]
pub enum NodeDescriptor {
    /// `<script>` element
    Script { src: Option<String> },
    /// `<link rel=stylesheet>` element
    StylesheetLink { href: Option<String> },
    /// Any other node; ignored by the tracker
    Other,
}
