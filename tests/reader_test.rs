//! End-to-end behavior of the reader facade over an in-memory host.

use folio::content::mount;
use folio::highlights::{Selection, capture_selection};
use folio::host::{FileStore, KeyValueStore, MemoryHost};
use folio::layout::Surface;
use folio::progress::progress_key;
use folio::{
    Appearance, Columns, DocumentId, DomPosition, PageMetrics, Reader, ReaderConfig, ReaderEvent,
    Rect, Size,
};

const DOC: DocumentId = DocumentId(11);
const VIEWPORT: Size = Size {
    width: 1000.0,
    height: 616.0,
};

fn paragraph(p: usize) -> String {
    let words: Vec<String> = (0..40).map(|w| format!("p{p}w{w}")).collect();
    format!("<p>{}</p>", words.join(" "))
}

fn chapters(titles: &[&str], paragraphs_each: usize) -> String {
    let mut html = String::new();
    let mut p = 0;
    for title in titles {
        html.push_str(&format!("<h2>{title}</h2>"));
        for _ in 0..paragraphs_each {
            html.push_str(&paragraph(p));
            p += 1;
        }
    }
    html
}

fn open(html: String) -> Reader<MemoryHost> {
    let mut host: MemoryHost = MemoryHost::default();
    host.documents.insert(DOC, "Test", html);
    let mut reader = Reader::new(host, ReaderConfig::default());
    reader.open(DOC, VIEWPORT).unwrap();
    reader
}

#[test]
fn test_page_from_scroll_offset() {
    let metrics = PageMetrics::new(800.0, 0.0, 1600.0, Rect::default(), Columns::One);
    assert_eq!(metrics.current_page(), 3);
    assert_eq!(metrics.scroll_target(3), 1600.0);

    // A two-column spread advances by both columns.
    let spread = PageMetrics::new(375.0, 25.0, 1600.0, Rect::default(), Columns::Two);
    assert_eq!(spread.scroll_unit(), 800.0);
    assert_eq!(spread.current_page(), 3);
}

#[test]
fn test_paging_through_a_document() {
    let mut reader = open(chapters(&["Only"], 40));
    let total = reader.total_pages();
    assert!(total > 3);
    reader.take_events();

    assert_eq!(reader.next_page(), Some(2));
    assert_eq!(reader.next_page(), Some(3));
    assert_eq!(reader.prev_page(), Some(2));
    assert_eq!(reader.scroll_to_page(total + 10), Some(total));
    assert_eq!(reader.current_page(), total);

    let pages: Vec<usize> = reader
        .take_events()
        .into_iter()
        .filter_map(|e| match e {
            ReaderEvent::PageChanged { page, .. } => Some(page),
            _ => None,
        })
        .collect();
    assert_eq!(pages, [2, 3, 2, total]);
}

#[test]
fn test_reflow_keeps_the_reading_place() {
    let mut reader = open(chapters(&["Only"], 40));
    reader.scroll_to_page(5);
    let first_block = reader.page_content(5).unwrap().blocks[0].block_index;

    reader
        .set_appearance(Appearance {
            margin: 140.0,
            line_height: 2.0,
            ..Appearance::default()
        })
        .unwrap();
    reader.animation_frame(16);

    let page = reader.current_page();
    let blocks: Vec<usize> = reader
        .page_content(page)
        .unwrap()
        .blocks
        .iter()
        .map(|b| b.block_index)
        .collect();
    assert!(blocks.contains(&first_block), "{first_block} not on page {page}: {blocks:?}");

    reader.set_columns(Columns::Two);
    reader.animation_frame(32);
    let page = reader.current_page();
    let blocks: Vec<usize> = reader
        .page_content(page)
        .unwrap()
        .blocks
        .iter()
        .map(|b| b.block_index)
        .collect();
    assert!(blocks.contains(&first_block), "{first_block} not on spread {page}: {blocks:?}");
}

#[test]
fn test_toc_navigation_over_three_headings() {
    let mut reader = open(chapters(&["One", "Two", "Three"], 12));
    let toc = reader.toc().to_vec();
    let titles: Vec<&str> = toc.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(titles, ["One", "Two", "Three"]);
    assert!(toc.iter().all(|e| e.level == 2));

    let pages: Vec<usize> = toc
        .iter()
        .map(|entry| reader.jump_to_toc_entry(&entry.id, 0).unwrap().page)
        .collect();
    assert_eq!(pages[0], 1);
    assert!(pages[0] < pages[1] && pages[1] < pages[2], "{pages:?}");
    assert_eq!(reader.current_page(), pages[2]);
    assert!(reader.jump_to_toc_entry("toc-9", 0).is_none());
}

#[test]
fn test_saved_page_is_restored_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reader.json");
    let mut store = FileStore::open(&path).unwrap();
    store.set(&progress_key(DOC), r#"{"page":7}"#).unwrap();

    let mut host = MemoryHost::with_storage(store);
    host.documents.insert(DOC, "Test", chapters(&["Only"], 60));
    let mut reader = Reader::new(host, ReaderConfig::default());
    reader.open(DOC, VIEWPORT).unwrap();
    assert_eq!(reader.current_page(), 7);

    reader.scroll_to_page(3);
    reader.animation_frame(10);
    reader.tick(1000);
    assert_eq!(reader.current_page(), 3);

    // A fresh store on the same file sees the newer page.
    let reopened = FileStore::open(&path).unwrap();
    assert_eq!(
        reopened.get(&progress_key(DOC)).unwrap().as_deref(),
        Some(r#"{"page":3}"#)
    );
}

#[test]
fn test_selection_outside_the_root_is_ignored() {
    let html = r#"<html><body><p id="outside">Outside the book</p>
        <div id="reader-root"><p id="inside">Inside the book</p></div></body></html>"#;
    let (dom, root) = mount(html);
    let outside = dom.text_nodes(dom.get_by_id("outside").unwrap())[0];
    let inside = dom.text_nodes(dom.get_by_id("inside").unwrap())[0];
    let mut surface = Surface::new(dom, root, VIEWPORT);

    let crossing = Selection::new(DomPosition::new(outside, 0), DomPosition::new(inside, 6));
    assert_eq!(capture_selection(&mut surface, &crossing), None);

    let elsewhere = Selection::new(DomPosition::new(outside, 0), DomPosition::new(outside, 7));
    assert_eq!(capture_selection(&mut surface, &elsewhere), None);
}

#[test]
fn test_highlights_survive_reopening() {
    let mut reader = open(chapters(&["Only"], 20));
    let surface = reader.surface().unwrap();
    let node = surface
        .dom()
        .text_nodes(surface.root())
        .into_iter()
        .find(|&n| surface.dom().text_content(n).is_some_and(|t| t.starts_with("p3w0 ")))
        .unwrap();
    reader.on_selection(
        Some(Selection::new(DomPosition::new(node, 0), DomPosition::new(node, 9))),
        0,
    );
    reader.tick(200);
    let id = reader.confirm_highlight().unwrap().unwrap();
    reader.save_note(id, "  worth rereading ").unwrap();

    reader.open(DOC, VIEWPORT).unwrap();
    let rows = reader.highlights();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].range.text, "p3w0 p3w1");
    assert_eq!(rows[0].note.as_deref(), Some("worth rereading"));

    let surface = reader.surface().unwrap();
    let marks = folio::dom::select_all(surface.dom(), surface.root(), "span.reader-highlight").unwrap();
    assert_eq!(marks.len(), 1);
    assert_eq!(surface.dom().deep_text(marks[0]), "p3w0 p3w1");
}

