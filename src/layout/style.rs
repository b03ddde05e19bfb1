//! Block styles for the typesetter and the generated reader stylesheet.
//!
//! Both come from the same numbers, so the layout the engine computes
//! matches what a browser would render with the injected CSS.

use std::fmt::Write;

use super::metrics::{Columns, DESIRED_PAGE_WIDTH, ROOT_PADDING_BOTTOM, ROOT_PADDING_TOP};

/// One CSS `rem` in pixels.
pub const REM: f32 = 16.0;
/// Body text size (`1.1rem`).
pub const BASE_FONT_SIZE: f32 = 1.1 * REM;
/// Line height of headings.
pub const HEADING_LINE_HEIGHT: f32 = 1.2;

/// Class of persisted highlight marks.
pub const HIGHLIGHT_CLASS: &str = "reader-highlight";
/// Extra class of the selected (or AI-quoted) mark.
pub const HIGHLIGHT_ACTIVE_CLASS: &str = "reader-highlight-active";
/// Class of staged context snippet marks.
pub const SNIPPET_CLASS: &str = "reader-context-snippet";
/// Class of images resolved lazily through the image source.
pub const INLINE_IMAGE_CLASS: &str = "inline-image";

/// Elements that never render.
pub const HIDDEN_ELEMENTS: &[&str] = &[
    "head", "script", "style", "title", "template", "noscript", "meta", "link",
];

/// Box properties of a block-level element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockStyle {
    /// Font size in px; `None` inherits.
    pub font_size: Option<f32>,
    /// Line-height factor; `None` inherits.
    pub line_height: Option<f32>,
    pub margin_top: f32,
    pub margin_bottom: f32,
    /// Extra left inset (list padding, blockquote padding).
    pub indent: f32,
    pub monospace: bool,
}

impl BlockStyle {
    const PLAIN: BlockStyle = BlockStyle {
        font_size: None,
        line_height: None,
        margin_top: 0.0,
        margin_bottom: 0.0,
        indent: 0.0,
        monospace: false,
    };

    const fn heading(size_rem: f32) -> BlockStyle {
        BlockStyle {
            font_size: Some(size_rem * REM),
            line_height: Some(HEADING_LINE_HEIGHT),
            margin_top: 1.6 * REM,
            margin_bottom: 0.7 * REM,
            indent: 0.0,
            monospace: false,
        }
    }

    const fn spaced(top: f32, bottom: f32) -> BlockStyle {
        BlockStyle {
            margin_top: top,
            margin_bottom: bottom,
            ..Self::PLAIN
        }
    }
}

/// Style of a block-level tag, `None` for inline content.
pub fn block_style(tag: &str) -> Option<BlockStyle> {
    let style = match tag {
        "h1" => BlockStyle::heading(2.1),
        "h2" => BlockStyle::heading(1.6),
        "h3" => BlockStyle::heading(1.3),
        "h4" | "h5" | "h6" => BlockStyle::heading(1.05),
        "p" => BlockStyle::spaced(0.0, 0.9 * REM),
        "ul" | "ol" => BlockStyle {
            indent: 1.4 * REM,
            ..BlockStyle::spaced(0.0, REM)
        },
        "li" => BlockStyle::spaced(0.0, 0.45 * REM),
        "blockquote" => BlockStyle {
            indent: 1.2 * REM,
            ..BlockStyle::spaced(1.8 * REM, 1.8 * REM)
        },
        "pre" => BlockStyle {
            monospace: true,
            indent: REM,
            font_size: Some(0.95 * BASE_FONT_SIZE),
            ..BlockStyle::spaced(2.0 * REM, 2.0 * REM)
        },
        "table" => BlockStyle::spaced(REM, REM),
        "div" | "section" | "article" | "header" | "footer" | "nav" | "aside" | "main"
        | "figure" | "figcaption" | "address" | "dl" | "dt" | "dd" | "tr" | "td" | "th"
        | "thead" | "tbody" | "tfoot" | "caption" | "center" | "body" | "html" | "hgroup"
        | "details" | "summary" => BlockStyle::PLAIN,
        _ => return None,
    };
    Some(style)
}

/// Average glyph advance as a fraction of the font size.
pub fn glyph_advance(font_family: &str, monospace: bool) -> f32 {
    let family = font_family.to_ascii_lowercase();
    if monospace || family.contains("mono") {
        0.6
    } else if family.contains("sans") {
        0.53
    } else {
        0.5
    }
}

/// Inputs to the generated stylesheet.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleOptions {
    pub columns: Columns,
    pub margin: f32,
    pub page_gap: f32,
    pub font_family: String,
    pub line_height: f32,
}

/// Pagination stylesheet installed into the surface head.
pub fn reader_css(options: &StyleOptions) -> String {
    let StyleOptions {
        columns,
        margin,
        page_gap: gap,
        font_family,
        line_height,
    } = options;
    let two = *columns == Columns::Two;
    let width = super::metrics::compute_reader_width(*columns, *margin, *gap);
    let rule = if two { "1px solid var(--page-rule)" } else { "none" };

    let mut css = String::new();
    let _ = write!(
        css,
        ":root {{ --page-gap: {gap}px; --page-content-width: {DESIRED_PAGE_WIDTH}px; \
         --page-ink: #1f1b16; --page-rule: rgba(31, 27, 22, 0.24); }}\n\
         html, body {{ width: 100%; height: 100%; margin: 0; padding: 0; overflow: hidden; }}\n\
         body {{ font-family: {font_family}; line-height: {line_height}; font-size: 1.1rem; \
         color: var(--page-ink); }}\n\
         #reader-root {{ height: 100vh; padding: {ROOT_PADDING_TOP}px 0 {ROOT_PADDING_BOTTOM}px; \
         box-sizing: border-box; column-fill: auto; column-width: var(--page-content-width); \
         column-gap: var(--page-gap); column-rule: {rule}; width: {width}px; max-width: 100%; \
         margin: 0 auto; overflow: hidden; }}\n\
         #reader-root > * {{ break-inside: avoid; padding-left: {margin}px; \
         padding-right: {margin}px; box-sizing: border-box; }}\n"
    );
    css.push_str(
        "h1, h2, h3, h4, h5, h6 { margin: 1.6rem 0 0.7rem; line-height: 1.2; font-weight: 700; }\n\
         h1 { font-size: 2.1rem; }\nh2 { font-size: 1.6rem; }\nh3 { font-size: 1.3rem; }\n\
         h4, h5, h6 { font-size: 1.05rem; }\n\
         p { margin: 0 0 0.9rem; }\n\
         ul, ol { margin: 0 0 1rem; padding-left: 1.4rem; }\nli { margin-bottom: 0.45rem; }\n\
         blockquote { margin: 1.2rem 0; padding: 0.6rem 1.2rem; font-style: italic; }\n\
         hr { border: none; border-top: 1px solid var(--page-rule); margin: 2rem auto; width: 60%; }\n\
         img, svg { display: block; max-width: 100%; height: auto; margin: 1rem auto; cursor: pointer; }\n\
         pre { font-family: monospace; padding: 1rem; margin: 1rem 0; }\n\
         table { border-collapse: collapse; width: 100%; margin: 1rem 0; }\n",
    );
    let _ = write!(
        css,
        ".{HIGHLIGHT_CLASS} {{ background-color: rgba(224, 46, 46, 0.25); cursor: pointer; }}\n\
         .{HIGHLIGHT_ACTIVE_CLASS} {{ background-color: rgba(224, 46, 46, 0.45) !important; \
         outline: 2px solid #E02E2E; }}\n\
         .{SNIPPET_CLASS} {{ background-color: rgba(0, 85, 164, 0.35); cursor: pointer; }}\n"
    );
    css
}
