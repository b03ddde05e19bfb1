//! HTML serialization for arena subtrees.

use super::arena::{ArenaDom, ArenaNodeData, ArenaNodeId};

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text children are emitted verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Serialize the children of a node.
pub fn inner_html(dom: &ArenaDom, id: ArenaNodeId) -> String {
    let mut out = String::new();
    let raw = dom
        .element_name(id)
        .is_some_and(|n| RAW_TEXT_ELEMENTS.contains(&n.as_ref()));
    for child in dom.children(id) {
        write_node(dom, child, raw, &mut out);
    }
    out
}

/// Serialize a node including its own tag.
pub fn outer_html(dom: &ArenaDom, id: ArenaNodeId) -> String {
    let mut out = String::new();
    write_node(dom, id, false, &mut out);
    out
}

fn write_node(dom: &ArenaDom, id: ArenaNodeId, raw_text: bool, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };
    match &node.data {
        ArenaNodeData::Document => {
            for child in dom.children(id) {
                write_node(dom, child, false, out);
            }
        }
        ArenaNodeData::Doctype { name } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        ArenaNodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        ArenaNodeData::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                escape_into(text, false, out);
            }
        }
        ArenaNodeData::Element { name, attrs, .. } => {
            let tag = name.local.as_ref();
            out.push('<');
            out.push_str(tag);
            for attr in attrs {
                out.push(' ');
                out.push_str(attr.name.local.as_ref());
                out.push_str("=\"");
                escape_into(&attr.value, true, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag) {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&tag);
            for child in dom.children(id) {
                write_node(dom, child, raw, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

/// Escape text for HTML output. Attribute values additionally escape quotes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    escape_into(s, true, &mut out);
    out
}

fn escape_into(s: &str, attribute: bool, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_inner_html_round_trips_markup() {
        let dom = parse_html(r#"<div id="n"><p class="a">x &amp; y<br>z</p><img src="i.png"></div>"#);
        let div = dom.get_by_id("n").unwrap();
        assert_eq!(
            inner_html(&dom, div),
            r#"<p class="a">x &amp; y<br>z</p><img src="i.png">"#
        );
    }

    #[test]
    fn test_attribute_quotes_are_escaped() {
        assert_eq!(escape_html(r#"say "hi" <b>"#), "say &quot;hi&quot; &lt;b&gt;");
    }

    #[test]
    fn test_style_text_is_raw() {
        let dom = parse_html("<style>p > a { color: red }</style><p>a > b</p>");
        let style = dom.find_by_tag("style").unwrap();
        assert_eq!(inner_html(&dom, style), "p > a { color: red }");
        let p = dom.find_by_tag("p").unwrap();
        assert_eq!(inner_html(&dom, p), "a &gt; b");
    }
}
