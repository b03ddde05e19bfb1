//! Best-effort text search, the fallback when a structural address is stale.
//!
//! Matching ignores case and every non-alphanumeric character, so quote
//! styles, dashes and whitespace differences between the stored snippet and
//! the document do not matter. This is deliberately approximate: repeated
//! text is disambiguated only by an occurrence index, and the first
//! occurrence is assumed when the caller has nothing better.

use crate::address::{DomPosition, LiveRange};
use crate::dom::{ArenaDom, ArenaNodeId, Query};
use crate::util::{searchable_chars, ultra_normalize};

/// Where and how to look for a snippet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchScope {
    /// Restrict the search to the element carrying `data-block-index`.
    pub block_index: Option<usize>,
    /// Zero-based match to return when the text repeats.
    pub occurrence: usize,
}

impl SearchScope {
    pub fn block(index: usize) -> Self {
        Self {
            block_index: Some(index),
            occurrence: 0,
        }
    }
}

/// Find `target` beneath `root`.
///
/// A snippet elided with `...` is matched by its longest part. A search
/// scoped to a block that finds nothing retries across the whole root.
pub fn find_text_range(
    dom: &ArenaDom,
    root: ArenaNodeId,
    target: &str,
    scope: SearchScope,
) -> Option<LiveRange> {
    let parts: Vec<&str> = target
        .split("...")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() > 1 {
        let longest = parts
            .iter()
            .copied()
            .max_by_key(|p| ultra_normalize(p).chars().count())?;
        return find_text_range(dom, root, longest, scope);
    }

    let needle: Vec<char> = ultra_normalize(target).chars().collect();
    if needle.is_empty() {
        return None;
    }

    let block = scope.block_index.and_then(|index| block_element(dom, root, index));
    let search_root = block.unwrap_or(root);

    match search_in(dom, search_root, &needle, scope.occurrence) {
        Some(range) => Some(range),
        None if block.is_some() => search_in(dom, root, &needle, scope.occurrence),
        None => None,
    }
}

/// Element carrying `data-block-index="<index>"` beneath `root`.
pub fn block_element(dom: &ArenaDom, root: ArenaNodeId, index: usize) -> Option<ArenaNodeId> {
    let query = Query::parse(&format!(r#"[data-block-index="{index}"]"#)).ok()?;
    query.select_first(dom, root)
}

fn search_in(
    dom: &ArenaDom,
    scope: ArenaNodeId,
    needle: &[char],
    occurrence: usize,
) -> Option<LiveRange> {
    // Searchable stream plus, for each of its chars, the source position.
    let mut stream: Vec<char> = Vec::new();
    let mut positions: Vec<DomPosition> = Vec::new();
    for node in dom.text_nodes(scope) {
        let Some(text) = dom.text_content(node) else {
            continue;
        };
        for (offset, c) in text.chars().enumerate() {
            for kept in searchable_chars(c) {
                stream.push(kept);
                positions.push(DomPosition::new(node, offset));
            }
        }
    }

    let start = stream
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(i, _)| i)
        .nth(occurrence)?;
    let first = positions[start];
    let last = positions[start + needle.len() - 1];
    Some(LiveRange::new(
        first,
        DomPosition::new(last.node, last.offset + 1),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn setup(html: &str) -> (ArenaDom, ArenaNodeId) {
        let dom = parse_html(html);
        let root = dom.get_by_id("reader-root").unwrap();
        (dom, root)
    }

    #[test]
    fn test_matches_across_nodes_ignoring_punctuation() {
        let (dom, root) = setup(
            r#"<div id="reader-root"><p>It was the <i>best</i> of times, it was the worst</p></div>"#,
        );
        let range = find_text_range(&dom, root, "the best of times; it", SearchScope::default())
            .unwrap();
        assert_eq!(range.text(&dom), "the best of times, it");
    }

    #[test]
    fn test_occurrence_index_selects_repeat() {
        let (dom, root) = setup(r#"<div id="reader-root"><p>echo one echo two</p></div>"#);
        let first = find_text_range(&dom, root, "echo", SearchScope::default()).unwrap();
        let second = find_text_range(
            &dom,
            root,
            "echo",
            SearchScope {
                block_index: None,
                occurrence: 1,
            },
        )
        .unwrap();
        assert_eq!(first.start.offset, 0);
        assert_eq!(second.start.offset, 9);
        assert_eq!(second.text(&dom), "echo");
    }

    #[test]
    fn test_ellipsis_uses_longest_part() {
        let (dom, root) =
            setup(r#"<div id="reader-root"><p>A short bit and then a much longer passage</p></div>"#);
        let range =
            find_text_range(&dom, root, "short ... a much longer passage", SearchScope::default())
                .unwrap();
        assert_eq!(range.text(&dom), "a much longer passage");
    }

    #[test]
    fn test_block_scope_falls_back_to_root() {
        let (dom, root) = setup(
            r#"<div id="reader-root"><p data-block-index="0">first</p><p data-block-index="1">second</p></div>"#,
        );
        let scoped = find_text_range(&dom, root, "second", SearchScope::block(1)).unwrap();
        assert_eq!(scoped.text(&dom), "second");

        let fallback = find_text_range(&dom, root, "first", SearchScope::block(1)).unwrap();
        assert_eq!(fallback.text(&dom), "first");
    }

    #[test]
    fn test_no_match_or_empty_query() {
        let (dom, root) = setup(r#"<div id="reader-root"><p>text</p></div>"#);
        assert!(find_text_range(&dom, root, "absent", SearchScope::default()).is_none());
        assert!(find_text_range(&dom, root, "?!", SearchScope::default()).is_none());
    }
}
