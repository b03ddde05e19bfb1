//! Document preparation.
//!
//! Raw book HTML arrives as a fragment or a whole document. Before it is
//! mounted it is normalized, its embedded-image references are rewritten so
//! the image resolver can find them, and every block gets a
//! `data-block-index` used by citations and block CFIs. The prepared body
//! is then wrapped in `<div id="reader-root">`.

use crate::dom::{ArenaDom, ArenaNodeId, Query, inner_html, parse_html};
use crate::error::Result;
use crate::host::DocumentId;
use crate::layout::style::INLINE_IMAGE_CLASS;
use crate::util::parse_int_prefix;

/// Id of the element that holds the book content.
pub const READER_ROOT_ID: &str = "reader-root";

/// Elements that receive a `data-block-index`.
pub const BLOCK_SELECTOR: &str = "p, h1, h2, h3, h4, h5, h6, blockquote, pre, table, li";

/// Project Gutenberg boilerplate removed on mount.
const BOILERPLATE_IDS: &[&str] = &["pg-header", "pg-footer"];

#[derive(Debug, Clone, Copy, Default)]
pub struct PrepareOptions<'a> {
    /// Rewrites `kindle:` images into resolvable placeholders when set.
    pub document: Option<DocumentId>,
    /// Prefix for relative image sources when no document id is known.
    pub base_url: Option<&'a str>,
}

/// Bibliographic lines found in plain-text front matter
/// (`Title: ...`, `Author: ...`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub author: Option<String>,
    pub translator: Option<String>,
    pub annotator: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// Body HTML, not yet wrapped.
    pub html: String,
    pub front_matter: FrontMatter,
}

/// Strip XML declarations, doctypes and `html`/`head`/`body` tags, and
/// repair `< class="...">` tags that lost their name.
pub fn normalize_fragment(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut copied = 0;
    let mut i = 0;

    while let Some(rel) = lower[i..].find('<') {
        let at = i + rel;
        let rest = &lower[at..];
        let skip_to = if rest.starts_with("<?xml") {
            rest.find("?>").map(|end| at + end + 2)
        } else if rest.starts_with("<!doctype") || is_document_tag(rest) {
            rest.find('>').map(|end| at + end + 1)
        } else {
            None
        };

        match skip_to {
            Some(end) => {
                out.push_str(&html[copied..at]);
                copied = end;
                i = end;
            }
            None => {
                if is_nameless_class_tag(rest) {
                    out.push_str(&html[copied..at]);
                    out.push_str("<p");
                    copied = at + 1;
                }
                i = at + 1;
            }
        }
    }
    out.push_str(&html[copied..]);
    out.trim().to_string()
}

/// `<html`, `</head>`, `<body class=..>` and friends, but not `<header>`.
fn is_document_tag(tag: &str) -> bool {
    let name = tag.trim_start_matches('<');
    let name = name.strip_prefix('/').unwrap_or(name);
    ["html", "head", "body"].iter().any(|candidate| {
        name.strip_prefix(candidate).is_some_and(|after| {
            after
                .chars()
                .next()
                .is_none_or(|c| c.is_ascii_whitespace() || c == '>' || c == '/')
        })
    })
}

fn is_nameless_class_tag(tag: &str) -> bool {
    let after = &tag[1..];
    let trimmed = after.trim_start();
    trimmed.len() < after.len()
        && (trimmed.starts_with("class=\"") || trimmed.starts_with("class='"))
}

/// Wrap a fragment in a complete document with the reader root, unless it
/// already carries one.
pub fn wrap_body(html: &str) -> String {
    if html.contains(r#"id="reader-root""#) {
        return html.to_string();
    }
    let normalized = normalize_fragment(html);
    format!(
        r#"<!doctype html><html><head></head><body><div id="{READER_ROOT_ID}">{normalized}</div></body></html>"#
    )
}

/// Read `Title:`/`Author:`/`Translator:`/`Annotator:` lines.
pub fn extract_front_matter(html: &str) -> FrontMatter {
    FrontMatter {
        title: labelled_value(html, "title:"),
        author: labelled_value(html, "author:"),
        translator: labelled_value(html, "translator:"),
        annotator: labelled_value(html, "annotator:"),
    }
}

fn labelled_value(html: &str, label: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let at = lower.find(label)? + label.len();
    let value: String = html[at..]
        .trim_start()
        .chars()
        .take_while(|&c| c != '\n' && c != '<')
        .collect();
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Prepare book HTML for mounting.
///
/// A failure while rewriting leaves the normalized markup untouched rather
/// than refusing the document.
pub fn prepare_document(html: &str, options: &PrepareOptions<'_>) -> PreparedDocument {
    let front_matter = extract_front_matter(html);
    let normalized = normalize_fragment(html);
    if normalized.is_empty() {
        return PreparedDocument {
            html: html.to_string(),
            front_matter,
        };
    }
    let html = match rewrite_body(&normalized, options) {
        Ok(body) => body,
        Err(e) => {
            log::error!("failed to index document blocks: {e}");
            html.to_string()
        }
    };
    PreparedDocument { html, front_matter }
}

fn rewrite_body(normalized: &str, options: &PrepareOptions<'_>) -> Result<String> {
    let mut dom = parse_html(normalized);
    let body = dom.find_by_tag("body").unwrap_or(dom.document());

    for img in dom.elements_by_tag(body, &["img"]) {
        let src = dom.get_attr(img, "src").unwrap_or_default().to_string();
        if src.starts_with("kindle:") {
            let Some(document) = options.document else {
                continue;
            };
            let index = embedded_image_index(&src);
            dom.set_attr(img, "data-image-index", &index.to_string());
            dom.set_attr(img, "data-doc-id", &document.to_string());
            dom.set_attr(img, "data-src", &src);
            dom.remove_attr(img, "src");
            dom.add_class(img, INLINE_IMAGE_CLASS);
        } else if let Some(base) = options.base_url
            && !src.is_empty()
            && !src.starts_with("http")
            && !src.starts_with("data:")
        {
            let joined = if base.ends_with('/') {
                format!("{base}{src}")
            } else {
                format!("{base}/{src}")
            };
            dom.set_attr(img, "src", &joined);
        }
    }

    let flow_links = Query::parse(r#"link[href^="kindle:flow"]"#)?.select_all(&dom, dom.document());
    for link in flow_links {
        dom.detach(link);
    }

    if let Some(first) = dom.children(body).find(|&c| dom.is_element(c)) {
        dom.set_attr(first, "data-fid", "1");
    }

    let blocks = Query::parse(BLOCK_SELECTOR)?.select_all(&dom, body);
    for (index, block) in blocks.into_iter().enumerate() {
        dom.set_attr(block, "data-block-index", &index.to_string());
    }

    Ok(inner_html(&dom, body))
}

/// Index in `kindle:embed:XXXX?mime=...` or `kindle:flow:XXXX?...`, base 32.
fn embedded_image_index(src: &str) -> u64 {
    if !src.starts_with("kindle:embed:") && !src.starts_with("kindle:flow:") {
        return 0;
    }
    src.split(':')
        .nth(2)
        .and_then(|part| part.split('?').next())
        .and_then(|part| parse_int_prefix(part, 32))
        .unwrap_or(0)
}

/// Parse wrapped HTML and locate the reader root, falling back to `body`.
/// Boilerplate sections are removed before anything is laid out, and the
/// text runs they separated are merged so every address is taken against
/// the same tree shape that [`clear_marks`](crate::highlights::clear_marks)
/// restores.
pub fn mount(html: &str) -> (ArenaDom, ArenaNodeId) {
    let mut dom = parse_html(html);
    let root = dom
        .get_by_id(READER_ROOT_ID)
        .or_else(|| dom.find_by_tag("body"))
        .unwrap_or(dom.document());
    strip_boilerplate(&mut dom);
    dom.normalize(root);
    (dom, root)
}

/// Remove Project Gutenberg header and footer sections.
pub fn strip_boilerplate(dom: &mut ArenaDom) {
    for id in BOILERPLATE_IDS {
        if let Some(node) = dom.get_by_id(id) {
            log::debug!("removing #{id}");
            dom.detach(node);
        }
    }
}
