//! Link classification inside a book.
//!
//! Books address things in two ways:
//! - **HTML**: element ids (`#footnote-1`, `chapter2.html#section-5`)
//! - **Kindle**: physical positions (`kindle:pos:fid:000B:off:00000002SO`)
//!
//! A clicked link is parsed with [`Link::parse`]; footnote links are then
//! recognized by naming conventions and their targets found with a ladder
//! of increasingly loose lookups.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

use crate::dom::{ArenaDom, ArenaNodeId, Query, inner_html, parse_html};
use crate::util::parse_int_prefix;

/// A parsed `href`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Link {
    /// External URL (http://, https://, mailto:, tel:).
    External(String),

    /// Link to an element of this document. Holds the raw (still
    /// percent-encoded) fragment, without the `#`.
    Fragment(String),

    /// Kindle position link. `fid` selects the `[data-fid]` element;
    /// `offset` is the byte offset inside it, which a single-document
    /// reader cannot use.
    KindlePosition {
        fid: Option<u32>,
        offset: Option<u32>,
    },

    /// Anything else. Kept for logging, not actionable.
    Unknown(String),
}

impl Link {
    pub fn is_external(&self) -> bool {
        matches!(self, Link::External(_))
    }

    /// The raw fragment, if this link has one.
    pub fn fragment(&self) -> Option<&str> {
        match self {
            Link::Fragment(fragment) => Some(fragment),
            _ => None,
        }
    }

    /// Parse a raw href.
    pub fn parse(href: &str) -> Link {
        let href = href.trim();

        if href.starts_with("http://")
            || href.starts_with("https://")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            return Link::External(href.to_string());
        }

        if href.to_ascii_lowercase().starts_with("kindle:pos:") {
            return Self::parse_kindle_position(href);
        }

        // `#id` and `file.html#id` both point into the one loaded document.
        if let Some((_, fragment)) = href.split_once('#')
            && !fragment.is_empty()
            && !href.contains("://")
            && !href.starts_with("kindle:")
        {
            return Link::Fragment(fragment.to_string());
        }

        Link::Unknown(href.to_string())
    }

    /// `kindle:pos:fid:XXXX:off:YYYYYYYYYY`, both parts in Kindle base32.
    fn parse_kindle_position(href: &str) -> Link {
        let lower = href.to_ascii_lowercase();
        let parts: Vec<&str> = lower.split(':').collect();
        let value_after = |key: &str| {
            parts
                .iter()
                .position(|p| *p == key)
                .and_then(|i| parts.get(i + 1))
                .copied()
        };

        let fid = value_after("fid")
            .and_then(|s| parse_int_prefix(s, 32))
            .and_then(|n| u32::try_from(n).ok());
        let offset = value_after("off").and_then(kindle_base32_decode);
        if fid.is_none() && offset.is_none() {
            return Link::Unknown(href.to_string());
        }
        Link::KindlePosition { fid, offset }
    }
}

/// Decode Kindle's base32 (digits 0-9 then A-V, case insensitive,
/// big-endian). `None` on any other character or on overflow.
pub fn kindle_base32_decode(s: &str) -> Option<u32> {
    let mut result: u64 = 0;

    for c in s.chars() {
        let digit = match c {
            '0'..='9' => c as u64 - '0' as u64,
            'A'..='V' => c as u64 - 'A' as u64 + 10,
            'a'..='v' => c as u64 - 'a' as u64 + 10,
            _ => return None,
        };

        result = result * 32 + digit;
        if result > u32::MAX as u64 {
            return None;
        }
    }

    Some(result as u32)
}

/// Percent-decode a fragment; the raw text is kept when it is not valid
/// UTF-8 once decoded.
pub fn decode_fragment(raw: &str) -> Cow<'_, str> {
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(raw),
    }
}

/// Whether a link looks like a footnote reference.
pub fn is_footnote_link(href: &str, anchor_id: &str, class: &str) -> bool {
    href.to_lowercase().contains("#fn")
        || anchor_id.starts_with("fnref")
        || class.contains("footnote")
        || class.contains("noteref")
}

/// The fragment a footnote link points at.
///
/// Links without a fragment fall back to the reference's own id:
/// `fnref3` points at `fn3`, `noteref3` at `note3`.
pub fn footnote_fragment(href: &str, anchor_id: &str) -> String {
    if let Some((_, fragment)) = href.split_once('#')
        && !fragment.is_empty()
    {
        return fragment.to_string();
    }

    let looks_like_footnote = href.to_lowercase().contains("#fn")
        || anchor_id.starts_with("fnref")
        || anchor_id.contains("footnote")
        || anchor_id.contains("noteref");
    if looks_like_footnote {
        if anchor_id.starts_with("fnref") {
            return anchor_id.replacen("fnref", "fn", 1);
        }
        if anchor_id.starts_with("noteref") {
            return anchor_id.replacen("noteref", "note", 1);
        }
    }
    String::new()
}

/// First element carrying `id`, or else `name`, equal to `target`.
pub fn find_by_id_or_name(dom: &ArenaDom, target: &str) -> Option<ArenaNodeId> {
    if target.is_empty() {
        return None;
    }
    dom.get_by_id(target).or_else(|| {
        dom.descendants(dom.document())
            .find(|&n| dom.get_attr(n, "name") == Some(target))
    })
}

/// Locate the body of a footnote.
///
/// Tries, in order: the exact id or name; the common numbered id families
/// (`footnote3`, `fn-3`, `note_3`, `n3`, `3`, ...); ids merely containing
/// the number next to `footnote`, `note` or `fn`; and finally Kindle `aid`
/// attributes containing the number.
pub fn find_footnote_target(dom: &ArenaDom, target: &str) -> Option<ArenaNodeId> {
    if let Some(found) = find_by_id_or_name(dom, target) {
        return Some(found);
    }

    let num: String = target
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if num.is_empty() {
        return None;
    }

    let families = [
        "footnote", "footnote-", "footnote_", "fn", "fn-", "fn_", "note", "note-", "note_", "f",
        "n", "ref", "id", "",
    ];
    for prefix in families {
        if let Some(found) = find_by_id_or_name(dom, &format!("{prefix}{num}")) {
            return Some(found);
        }
    }

    let loose = [
        format!(r#"[id*="footnote"][id*="{num}"]"#),
        format!(r#"[id*="note"][id*="{num}"]"#),
        format!(r#"[id*="fn"][id*="{num}"]"#),
        format!(r#"[aid*="{num}"]"#),
    ];
    loose.iter().find_map(|css| {
        Query::parse(css)
            .ok()
            .and_then(|query| query.select_first(dom, dom.document()))
    })
}

/// Strip back-links and a leading `[n]` marker from footnote HTML.
pub fn clean_footnote_content(html: &str) -> String {
    let mut dom = parse_html(html);
    let Some(body) = dom.find_by_tag("body") else {
        return html.trim().to_string();
    };

    for link in dom.elements_by_tag(body, &["a"]) {
        let text = dom.deep_text(link).trim().to_lowercase();
        if is_back_link_text(&text) {
            dom.detach(link);
        }
    }

    if let Some(first) = dom.children(body).next()
        && let Some(text) = dom.text_content(first)
    {
        let stripped = strip_reference_marker(text).to_string();
        dom.set_text(first, &stripped);
    }

    inner_html(&dom, body).trim().to_string()
}

fn is_back_link_text(text: &str) -> bool {
    text.contains("back")
        || text.contains("return")
        || text.contains("jump up")
        || matches!(text, "↩" | "↑" | "top")
        || is_bracketed_number(text)
}

/// `12`, `[12]`, `[12`, `12]`.
fn is_bracketed_number(text: &str) -> bool {
    let inner = text.strip_prefix('[').unwrap_or(text);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit())
}

/// Drop a leading `[12]` and the whitespace after it.
fn strip_reference_marker(text: &str) -> &str {
    let Some(rest) = text.strip_prefix('[') else {
        return text;
    };
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return text;
    }
    match rest[digits..].strip_prefix(']') {
        Some(after) => after.trim_start(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_external_links() {
        assert!(Link::parse("https://example.com").is_external());
        assert!(Link::parse("http://example.com").is_external());
        assert!(Link::parse("mailto:user@example.com").is_external());
    }

    #[test]
    fn test_parse_fragment_links() {
        assert_eq!(Link::parse("#footnote-1"), Link::Fragment("footnote-1".into()));
        assert_eq!(
            Link::parse("chapter2.html#section-5"),
            Link::Fragment("section-5".into())
        );
        assert!(matches!(Link::parse("#"), Link::Unknown(_)));
        assert!(matches!(Link::parse("chapter2.html"), Link::Unknown(_)));
    }

    #[test]
    fn test_parse_kindle_position() {
        let link = Link::parse("kindle:pos:fid:000B:off:00000002SO");
        match link {
            Link::KindlePosition { fid, offset } => {
                assert_eq!(fid, Some(11));
                assert!(offset.is_some_and(|o| o > 0));
            }
            other => panic!("expected kindle position, got {other:?}"),
        }
    }

    #[test]
    fn test_kindle_base32_decode() {
        assert_eq!(kindle_base32_decode("0"), Some(0));
        assert_eq!(kindle_base32_decode("A"), Some(10));
        assert_eq!(kindle_base32_decode("V"), Some(31));
        assert_eq!(kindle_base32_decode("10"), Some(32));
        assert_eq!(kindle_base32_decode("W"), None);
    }

    #[test]
    fn test_decode_fragment() {
        assert_eq!(decode_fragment("caf%C3%A9"), "café");
        assert_eq!(decode_fragment("%FF"), "%FF");
    }

    #[test]
    fn test_footnote_detection() {
        assert!(is_footnote_link("#fn3", "", ""));
        assert!(is_footnote_link("", "fnref3", ""));
        assert!(is_footnote_link("#x", "", "noteref"));
        assert!(!is_footnote_link("#chapter-3", "", "toc"));
    }

    #[test]
    fn test_footnote_fragment_falls_back_to_anchor_id() {
        assert_eq!(footnote_fragment("#fn2", "fnref2"), "fn2");
        assert_eq!(footnote_fragment("", "fnref2"), "fn2");
        assert_eq!(footnote_fragment("", "noteref4"), "note4");
        assert_eq!(footnote_fragment("", "plain"), "");
    }

    #[test]
    fn test_find_footnote_target_ladder() {
        let dom = parse_html(
            r#"<p id="note-7">seven</p><p name="fn8">eight</p><p id="chapter9-footnote">nine</p><p aid="x12">twelve</p>"#,
        );
        let text = |n: Option<ArenaNodeId>| n.map(|n| dom.deep_text(n));
        assert_eq!(text(find_footnote_target(&dom, "fn7")), Some("seven".into()));
        assert_eq!(text(find_footnote_target(&dom, "fn8")), Some("eight".into()));
        assert_eq!(text(find_footnote_target(&dom, "ref9")), Some("nine".into()));
        assert_eq!(text(find_footnote_target(&dom, "n12")), Some("twelve".into()));
        assert_eq!(find_footnote_target(&dom, "nothing"), None);
    }

    #[test]
    fn test_clean_footnote_content() {
        let html = r##"[3] A note about <i>this</i>. <a href="#r3">↩</a> <a href="#r3">[3]</a> <a href="#x">see also</a>"##;
        assert_eq!(
            clean_footnote_content(html),
            r##"A note about <i>this</i>.   <a href="#x">see also</a>"##
        );
    }

    proptest! {
        #[test]
        fn prop_kindle_base32_decode_is_case_insensitive(
            s in prop::collection::vec(
                prop_oneof![
                    prop::char::range('0','9'),
                    prop::char::range('A','V'),
                    prop::char::range('a','v'),
                ],
                1..7
            )
        ) {
            let s: String = s.into_iter().collect();
            let upper = s.to_ascii_uppercase();
            prop_assert_eq!(kindle_base32_decode(&s), kindle_base32_decode(&upper));
            prop_assert!(kindle_base32_decode(&s).is_some());
        }

        #[test]
        fn prop_kindle_base32_decode_rejects_invalid_chars(
            prefix in "[0-9A-Va-v]{0,4}",
            bad in prop::char::range('!','~')
                .prop_filter("invalid base32 char", |c| !matches!(c, '0'..='9' | 'A'..='V' | 'a'..='v')),
            suffix in "[0-9A-Va-v]{0,4}"
        ) {
            let s = format!("{prefix}{bad}{suffix}");
            prop_assert!(kindle_base32_decode(&s).is_none());
        }

        #[test]
        fn prop_fragment_only_links_keep_their_fragment(fragment in "[A-Za-z0-9_-]{1,32}") {
            let href = format!("#{fragment}");
            prop_assert_eq!(Link::parse(&href), Link::Fragment(fragment));
        }

        #[test]
        fn prop_unknown_schemes_are_unknown(
            scheme in prop_oneof![Just("ftp"), Just("data"), Just("file"), Just("ws")],
            path in "[A-Za-z0-9/_\\-]{1,24}"
        ) {
            let href = format!("{scheme}:{path}");
            prop_assert!(matches!(Link::parse(&href), Link::Unknown(_)));
        }
    }
}
