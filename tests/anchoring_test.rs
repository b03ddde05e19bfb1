//! Anchored ranges against real document trees: capture, resolve, and the
//! marks drawn from them.

use proptest::prelude::*;

use folio::content::{mount, wrap_body};
use folio::dom::{ArenaDom, ArenaNodeId, inner_html, select_all};
use folio::highlights::{MarkSet, clear_marks, render_marks};
use folio::{AnchoredRange, DocumentId, DomPosition, Highlight, HighlightId, LiveRange};

fn document(paragraphs: &[Vec<String>]) -> (ArenaDom, ArenaNodeId) {
    let html: String = paragraphs
        .iter()
        .enumerate()
        .map(|(i, words)| {
            // Every other paragraph carries inline markup so text nodes split.
            if i % 2 == 1 && words.len() > 1 {
                format!("<p>{} <em>{}</em></p>", words[0], words[1..].join(" "))
            } else {
                format!("<p>{}</p>", words.join(" "))
            }
        })
        .collect();
    mount(&wrap_body(&html))
}

/// Every (text node, offset) position beneath `root`, in document order.
fn positions(dom: &ArenaDom, root: ArenaNodeId) -> Vec<DomPosition> {
    dom.text_nodes(root)
        .into_iter()
        .flat_map(|node| (0..=dom.text_len(node)).map(move |offset| DomPosition::new(node, offset)))
        .collect()
}

fn highlight(id: i64, range: AnchoredRange) -> Highlight {
    Highlight {
        id: HighlightId(id),
        document_id: DocumentId(1),
        range,
        note: None,
        created_at: 0,
    }
}

fn mark_text(dom: &ArenaDom, root: ArenaNodeId) -> String {
    select_all(dom, root, "span.reader-highlight")
        .unwrap()
        .into_iter()
        .map(|span| dom.deep_text(span))
        .collect()
}

/// Each paragraph twice over, with the Gutenberg header and footer sitting
/// between the copies. Both sections are detached on mount.
fn document_with_boilerplate(paragraphs: &[Vec<String>]) -> (ArenaDom, ArenaNodeId) {
    let mut html = String::new();
    for (i, words) in paragraphs.iter().enumerate() {
        let p = format!("<p>{}</p>", words.join(" "));
        html.push_str(&p);
        match i {
            0 => html.push_str("\n<section id=\"pg-header\">License</section>\n"),
            1 => html.push_str("\n<section id=\"pg-footer\">End</section>\n"),
            _ => html.push('\n'),
        }
        html.push_str(&p);
    }
    mount(&wrap_body(&html))
}

/// Character offset of `position` within the text beneath `root`.
fn text_offset(dom: &ArenaDom, root: ArenaNodeId, position: DomPosition) -> usize {
    dom.text_nodes(root)
        .into_iter()
        .take_while(|&node| node != position.node)
        .map(|node| dom.text_len(node))
        .sum::<usize>()
        + position.offset
}

/// Character offset where the first mark starts.
fn mark_offset(dom: &ArenaDom, root: ArenaNodeId) -> Option<usize> {
    let mut offset = 0;
    for node in dom.text_nodes(root) {
        if dom.parent(node).is_some_and(|p| dom.has_class(p, "reader-highlight")) {
            return Some(offset);
        }
        offset += dom.text_len(node);
    }
    None
}

fn paragraphs() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(prop::collection::vec("[a-z]{1,8}", 1..10), 1..6)
}

proptest! {
    #[test]
    fn captured_range_resolves_to_itself(
        paragraphs in paragraphs(),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let (dom, root) = document(&paragraphs);
        let all = positions(&dom, root);
        let (i, j) = {
            let (i, j) = (a.index(all.len()), b.index(all.len()));
            (i.min(j), i.max(j))
        };
        let range = LiveRange::new(all[i], all[j]);

        let anchored = AnchoredRange::capture(&dom, root, &range).unwrap();
        prop_assert_eq!(&anchored.text, &range.text(&dom));
        prop_assert_eq!(anchored.resolve(&dom, root), Some(range));
    }

    #[test]
    fn marks_cover_exactly_the_range_text(
        paragraphs in paragraphs(),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let (mut dom, root) = document(&paragraphs);
        let all = positions(&dom, root);
        let (i, j) = {
            let (i, j) = (a.index(all.len()), b.index(all.len()));
            (i.min(j), i.max(j))
        };
        let range = LiveRange::new(all[i], all[j]);
        let text = range.text(&dom);
        prop_assume!(!text.trim().is_empty());

        let anchored = AnchoredRange::capture(&dom, root, &range).unwrap();
        let rows = [highlight(1, anchored)];
        let marks = MarkSet { highlights: &rows, ..MarkSet::default() };

        let summary = render_marks(&mut dom, root, &marks);
        prop_assert_eq!(summary.rendered, 1);
        prop_assert_eq!(mark_text(&dom, root), text);

        // Drawing again from scratch lands on the same markup.
        let first = inner_html(&dom, root);
        render_marks(&mut dom, root, &marks);
        prop_assert_eq!(inner_html(&dom, root), first);
    }

    #[test]
    fn marks_stay_put_across_renders_after_boilerplate_removal(
        paragraphs in paragraphs(),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let (mut dom, root) = document_with_boilerplate(&paragraphs);
        let all = positions(&dom, root);
        let (i, j) = {
            let (i, j) = (a.index(all.len()), b.index(all.len()));
            (i.min(j), i.max(j))
        };
        let range = LiveRange::new(all[i], all[j]);
        let text = range.text(&dom);
        prop_assume!(!text.trim().is_empty());
        let start = text_offset(&dom, root, range.start);

        let anchored = AnchoredRange::capture(&dom, root, &range).unwrap();
        let rows = [highlight(1, anchored)];
        let marks = MarkSet { highlights: &rows, ..MarkSet::default() };

        for _ in 0..3 {
            let summary = render_marks(&mut dom, root, &marks);
            prop_assert_eq!(summary.rendered, 1);
            prop_assert_eq!(mark_text(&dom, root), text.clone());
            prop_assert_eq!(mark_offset(&dom, root), Some(start));
        }
    }
}

#[test]
fn clearing_marks_restores_the_original_markup() {
    let words = |s: &str| s.split(' ').map(str::to_string).collect::<Vec<_>>();
    let (mut dom, root) = document(&[words("the quick brown fox"), words("jumps over the lazy dog")]);
    let before = inner_html(&dom, root);

    let nodes = dom.text_nodes(root);
    let range = LiveRange::new(DomPosition::new(nodes[0], 4), DomPosition::new(nodes[1], 3));
    let anchored = AnchoredRange::capture(&dom, root, &range).unwrap();
    assert_eq!(anchored.text, "quick brown foxjum");

    let rows = [highlight(1, anchored)];
    let marks = MarkSet {
        highlights: &rows,
        selected: Some(HighlightId(1)),
        ..MarkSet::default()
    };
    render_marks(&mut dom, root, &marks);
    assert_ne!(inner_html(&dom, root), before);
    assert_eq!(
        select_all(&dom, root, ".reader-highlight-active").unwrap().len(),
        2
    );

    clear_marks(&mut dom, root);
    assert_eq!(inner_html(&dom, root), before);
}

#[test]
fn stale_address_falls_back_to_text_search() {
    let words = |s: &str| s.split(' ').map(str::to_string).collect::<Vec<_>>();
    let (dom, root) = document(&[words("alpha beta gamma"), words("delta epsilon")]);
    let nodes = dom.text_nodes(root);
    let range = LiveRange::new(DomPosition::new(nodes[1], 0), DomPosition::new(nodes[1], 5));
    let anchored = AnchoredRange::capture(&dom, root, &range).unwrap();
    assert_eq!(anchored.text, "delta");

    // The same words behind a new first paragraph: the path now points at
    // the wrong text.
    let (mut moved, moved_root) = document(&[
        words("a new preface"),
        words("alpha beta gamma"),
        words("delta epsilon"),
    ]);
    assert_eq!(anchored.resolve(&moved, moved_root), None);

    let rows = [highlight(1, anchored)];
    let marks = MarkSet {
        highlights: &rows,
        ..MarkSet::default()
    };
    let summary = render_marks(&mut moved, moved_root, &marks);
    assert_eq!(summary.rendered, 1);
    assert_eq!(mark_text(&moved, moved_root), "delta");
}

#[test]
fn highlight_in_repeated_text_keeps_its_paragraph() {
    let (mut dom, root) = mount(&wrap_body(
        "<p>dup words</p>\n<section id=\"pg-header\">boiler</section>\n<p>dup words</p>",
    ));
    let second = select_all(&dom, root, "p").unwrap()[1];
    let node = dom.text_nodes(second)[0];
    let range = LiveRange::new(DomPosition::new(node, 0), DomPosition::new(node, 3));
    let anchored = AnchoredRange::capture(&dom, root, &range).unwrap();
    assert_eq!(anchored.text, "dup");

    let rows = [highlight(1, anchored)];
    let marks = MarkSet {
        highlights: &rows,
        ..MarkSet::default()
    };
    for _ in 0..3 {
        assert_eq!(render_marks(&mut dom, root, &marks).rendered, 1);
        let spans = select_all(&dom, root, "span.reader-highlight").unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(dom.deep_text(spans[0]), "dup");
        assert_eq!(dom.parent(spans[0]), Some(second));
    }
}
