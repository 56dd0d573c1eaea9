//! Markdown preview rendering.
//!
//! Converts an open Markdown buffer to a themed HTML page: GFM-style
//! extensions on, hard breaks off, no sanitization (the preview only ever
//! shows the user's own project files).

use pulldown_cmark::{Options, Parser, html};

/// Theme assets injected into the preview page.
const BOOTSTRAP_CSS: &str =
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css";
const GFM_CSS: &str =
    "https://cdn.jsdelivr.net/npm/github-markdown-css@5.6.1/github-markdown-light.min.css";
const HIGHLIGHT_CSS: &str =
    "https://cdn.jsdelivr.net/npm/highlight.js@11.10.0/styles/github.min.css";
const HIGHLIGHT_JS: &str =
    "https://cdn.jsdelivr.net/npm/highlight.js@11.10.0/lib/common.min.js";

/// Render Markdown source to an HTML fragment.
pub fn render_fragment(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);

    let parser = Parser::new_ext(text, options);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Render Markdown source to a complete themed preview page.
pub fn render_page(text: &str, title: &str) -> String {
    let body = render_fragment(text);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="{BOOTSTRAP_CSS}">
<link rel="stylesheet" href="{GFM_CSS}">
<link rel="stylesheet" href="{HIGHLIGHT_CSS}">
<style>
.markdown-body {{ box-sizing: border-box; min-width: 200px; max-width: 980px; margin: 0 auto; padding: 45px; }}
</style>
</head>
<body>
<article class="markdown-body">
{body}</article>
<script src="{HIGHLIGHT_JS}"></script>
<script>hljs.highlightAll();</script>
</body>
</html>
"#
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_renders() {
        let html = render_fragment("# Title");
        assert!(html.contains("<h1>Title</h1>"));
    }

    #[test]
    fn test_gfm_table_and_strikethrough() {
        let html = render_fragment("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_raw_html_passes_through_unsanitized() {
        let html = render_fragment("before <span class=\"x\">kept</span> after");
        assert!(html.contains("<span class=\"x\">kept</span>"));
    }

    #[test]
    fn test_page_wraps_fragment_with_theme_assets() {
        let page = render_page("# Title", "readme.md");
        assert!(page.contains("<h1>Title</h1>"));
        assert!(page.contains("<title>readme.md</title>"));
        assert!(page.contains(BOOTSTRAP_CSS));
        assert!(page.contains(GFM_CSS));
        assert!(page.contains(HIGHLIGHT_CSS));
        assert!(page.contains(HIGHLIGHT_JS));
    }
}
