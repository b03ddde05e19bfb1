//! The reader facade.
//!
//! A [`Reader`] owns one host and at most one loaded document. The host
//! forwards its input (viewport changes, scrolls, selections, clicks, clock
//! ticks and animation frames) and drains [`ReaderEvent`]s afterwards:
//!
//! ```
//! use folio::host::{DocumentId, MemoryHost};
//! use folio::layout::Size;
//! use folio::{Reader, ReaderConfig, ReaderEvent};
//!
//! let mut host: MemoryHost = MemoryHost::default();
//! host.documents.insert(DocumentId(1), "Example", "<p>Hello, world.</p>");
//!
//! let mut reader = Reader::new(host, ReaderConfig::default());
//! reader.open(DocumentId(1), Size::new(1000.0, 616.0)).unwrap();
//! assert_eq!(reader.total_pages(), 1);
//! assert!(matches!(reader.take_events()[0], ReaderEvent::PageChanged { page: 1, .. }));
//! ```

use crate::config::{Appearance, ReaderConfig};
use crate::content::{FrontMatter, PrepareOptions, mount, prepare_document, wrap_body};
use crate::controller::{JumpResult, LayoutController, LayoutState, PageContent};
use crate::dom::ArenaNodeId;
use crate::error::{Error, Result};
use crate::highlights::{
    ClickTarget, ContextSnippet, HighlightManager, PendingHighlight, Selection, mark_element,
    selection_rects,
};
use crate::host::{DocumentId, DocumentMetadata, Highlight, HighlightId, Host};
use crate::images::ImageResolver;
use crate::layout::{Columns, PageMetrics, Rect, Size, Surface, SurfaceFrame};
use crate::navigation::{Click, JumpStep, LinkAction, Navigator, quote_element, resolve_cfi};
use crate::progress::{ProgressTracker, load_appearance, save_appearance};
use crate::schedule::Millis;
use crate::search::{SearchScope, find_text_range};
use crate::toc::{TocEntry, build_toc};

/// Notifications for the host, drained with [`Reader::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    PageChanged { page: usize, total_pages: usize },
    /// The pending highlight was captured, replaced or cleared.
    HighlightPending(Option<PendingHighlight>),
    HighlightSelected(Option<HighlightId>),
    /// A footnote was clicked; `rect` is the link box in container
    /// coordinates.
    CitationRequested { content: String, rect: Rect },
    ImageActivated { src: String, alt: String },
    /// A link leaving the document was clicked.
    ExternalLink(String),
}

pub struct Reader<H: Host> {
    host: H,
    config: ReaderConfig,
    document: Option<DocumentId>,
    metadata: Option<DocumentMetadata>,
    front_matter: FrontMatter,
    controller: LayoutController,
    highlights: HighlightManager,
    navigator: Navigator,
    progress: ProgressTracker,
    images: ImageResolver,
    toc: Vec<TocEntry>,
    frame: SurfaceFrame,
    now: Millis,
    events: Vec<ReaderEvent>,
}

impl<H: Host> Reader<H> {
    pub fn new(host: H, config: ReaderConfig) -> Self {
        Self {
            controller: LayoutController::new(config.clone()),
            highlights: HighlightManager::new(&config),
            navigator: Navigator::new(&config),
            progress: ProgressTracker::new(&config),
            images: ImageResolver::new(),
            host,
            config,
            document: None,
            metadata: None,
            front_matter: FrontMatter::default(),
            toc: Vec::new(),
            frame: SurfaceFrame::default(),
            now: 0,
            events: Vec::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    // --- Loading ---

    /// Load a document, replacing whatever was loaded.
    ///
    /// Pending work of the previous load is dropped. Once laid out, the
    /// saved page is restored and stored highlights are drawn. A failure to
    /// list highlights leaves the document open and is reported afterwards.
    pub fn open(&mut self, document: DocumentId, viewport: Size) -> Result<()> {
        self.unmount();
        self.controller.begin_load();

        let html = match self.host.document_content(document) {
            Ok(html) => html,
            Err(e) => {
                self.controller.detach();
                return Err(e);
            }
        };
        self.metadata = self
            .host
            .document_metadata(document)
            .inspect_err(|e| log::warn!("no metadata for document {document}: {e}"))
            .ok();

        let options = PrepareOptions {
            document: Some(document),
            base_url: None,
        };
        let prepared = prepare_document(&html, &options);
        self.front_matter = prepared.front_matter;
        let (dom, root) = mount(&wrap_body(&prepared.html));

        self.document = Some(document);
        self.toc = build_toc(&dom, root);
        self.images.enqueue(&dom, root);
        self.controller
            .set_appearance(load_appearance(&self.host, document));

        let mut surface = Surface::new(dom, root, viewport);
        surface.set_frame(self.frame);
        self.controller.finish_load(surface);
        log::info!(
            "opened document {document}: {} pages, {} toc entries",
            self.controller.total_pages(),
            self.toc.len()
        );

        self.highlights.reset(Some(document));
        let listed = self.highlights.load(&self.host);
        self.render_marks();

        self.progress.begin(&self.host, document);
        if let Some(page) = self.progress.take_restore(self.controller.total_pages()) {
            log::debug!("restoring page {page}");
            self.controller.scroll_to_page(page);
        }
        let changes = self.controller.take_page_changes();
        if changes.is_empty() {
            self.push_page_event(self.controller.current_page());
        }
        for page in changes {
            self.progress.on_page_change(page, self.now);
            self.push_page_event(page);
        }
        listed
    }

    /// Tear down the loaded document. Every pending timer, frame request,
    /// retry and image job is dropped.
    pub fn unmount(&mut self) {
        self.controller.detach();
        self.highlights.reset(None);
        self.navigator.reset();
        self.progress.reset();
        self.images.clear();
        self.toc.clear();
        self.document = None;
        self.metadata = None;
        self.front_matter = FrontMatter::default();
    }

    // --- State ---

    pub fn document(&self) -> Option<DocumentId> {
        self.document
    }

    pub fn metadata(&self) -> Option<&DocumentMetadata> {
        self.metadata.as_ref()
    }

    pub fn front_matter(&self) -> &FrontMatter {
        &self.front_matter
    }

    pub fn state(&self) -> LayoutState {
        self.controller.state()
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.controller.surface()
    }

    pub fn current_page(&self) -> usize {
        self.controller.current_page()
    }

    pub fn total_pages(&self) -> usize {
        self.controller.total_pages()
    }

    pub fn page_metrics(&self) -> PageMetrics {
        self.controller.page_metrics()
    }

    pub fn columns(&self) -> Columns {
        self.controller.columns()
    }

    pub fn appearance(&self) -> &Appearance {
        self.controller.appearance()
    }

    pub fn toc(&self) -> &[TocEntry] {
        &self.toc
    }

    pub fn highlights(&self) -> &[Highlight] {
        self.highlights.highlights()
    }

    pub fn pending_highlight(&self) -> Option<&PendingHighlight> {
        self.highlights.pending()
    }

    pub fn selected_highlight(&self) -> Option<HighlightId> {
        self.highlights.selected()
    }

    pub fn snippets(&self) -> &[ContextSnippet] {
        self.highlights.snippets()
    }

    /// Visible text of `page`, grouped by block.
    pub fn page_content(&mut self, page: usize) -> Option<PageContent> {
        self.controller.page_content(page)
    }

    pub fn take_events(&mut self) -> Vec<ReaderEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Host input ---

    pub fn set_viewport(&mut self, viewport: Size) {
        self.controller.set_viewport(viewport);
    }

    /// Where the surface sits inside the host.
    pub fn set_frame(&mut self, frame: SurfaceFrame) {
        self.frame = frame;
        if let Some(surface) = self.controller.surface_mut() {
            surface.set_frame(frame);
        }
    }

    /// The surface regained focus or visibility.
    pub fn on_focus_change(&mut self) {
        self.controller.schedule_relock();
    }

    pub fn on_scroll(&mut self, scroll_left: f32, now: Millis) {
        self.now = now;
        self.controller.on_scroll(scroll_left, now);
    }

    /// The selection changed or ended; `None` when nothing is selected.
    pub fn on_selection(&mut self, selection: Option<Selection>, now: Millis) {
        self.now = now;
        self.highlights.on_selection(selection, now);
    }

    /// Client rects for drawing the live selection.
    pub fn selection_overlay(&mut self, selection: &Selection) -> Vec<Rect> {
        self.controller
            .surface_mut()
            .map(|surface| selection_rects(surface, selection))
            .unwrap_or_default()
    }

    /// Handle a click inside the content. Links are handled first; anything
    /// they do not claim goes to the highlight layer.
    pub fn on_click(&mut self, click: Click, now: Millis) {
        self.now = now;
        let Some(surface) = self.controller.surface_mut() else {
            return;
        };
        surface.refresh_layout();
        let root = surface.root();
        let action = self
            .navigator
            .resolve_link(surface.dom(), root, surface.layout(), click);

        match action {
            LinkAction::Citation { content, anchor } => {
                let rect = self.anchor_rect(anchor).unwrap_or_default();
                self.events.push(ReaderEvent::CitationRequested { content, rect });
            }
            LinkAction::Jump(target) => {
                self.controller.jump_to_element(target, now);
                self.drain_page_changes();
            }
            LinkAction::Swallow => {}
            LinkAction::External(url) => self.events.push(ReaderEvent::ExternalLink(url)),
            LinkAction::Ignore => {
                let before = self.highlight_snapshot();
                let hit = match self.controller.surface() {
                    Some(surface) => self.highlights.on_click(surface.dom(), click.target),
                    None => return,
                };
                if let ClickTarget::Image { src, alt } = hit {
                    self.events.push(ReaderEvent::ImageActivated { src, alt });
                }
                self.emit_highlight_changes(before);
            }
        }
    }

    fn anchor_rect(&mut self, anchor: ArenaNodeId) -> Option<Rect> {
        let surface = self.controller.surface_mut()?;
        surface.refresh_layout();
        let rect = surface.layout()?.element_rect(anchor)?;
        Some(surface.frame().to_container(surface.to_client(rect)))
    }

    /// Run timers that are due: snap, selection capture, image resolution,
    /// and progress saves.
    pub fn tick(&mut self, now: Millis) {
        self.now = now;
        self.controller.tick(now);

        let before = self.highlight_snapshot();
        self.highlights.tick(self.controller.surface_mut(), now);
        self.emit_highlight_changes(before);

        if self.images.pending() > 0
            && let Some(surface) = self.controller.surface_mut()
        {
            let report = self.images.resolve_pending(&self.host, surface.dom_mut());
            log::debug!("images: {} resolved, {} failed", report.resolved, report.failed);
        }

        self.drain_page_changes();
        let controller = &mut self.controller;
        self.progress.tick(&mut self.host, now, || {
            controller.first_visible_block().map(|(_, index)| index)
        });
    }

    /// Run frame work: a coalesced rebuild, then the mark render pass, then
    /// any pending highlight jump.
    pub fn animation_frame(&mut self, now: Millis) {
        self.now = now;
        if self.controller.animation_frame(now) {
            self.highlights.request_render();
            if let Some(page) = self.progress.take_restore(self.controller.total_pages()) {
                self.controller.scroll_to_page(page);
            }
        }
        if self.highlights.take_render_request() {
            self.render_marks();
        }
        if self.navigator.pending_highlight_jump().is_some() {
            self.step_highlight_jump(now);
        }
        self.drain_page_changes();
    }

    // --- Commands ---

    pub fn scroll_to_page(&mut self, page: usize) -> Option<usize> {
        let landed = self.controller.scroll_to_page(page);
        self.drain_page_changes();
        landed
    }

    pub fn prev_page(&mut self) -> Option<usize> {
        let landed = self.controller.prev_page();
        self.drain_page_changes();
        landed
    }

    pub fn next_page(&mut self) -> Option<usize> {
        let landed = self.controller.next_page();
        self.drain_page_changes();
        landed
    }

    pub fn set_columns(&mut self, columns: Columns) {
        self.controller.set_columns(columns);
    }

    /// Apply and persist typography settings. The reflow runs on the next
    /// animation frame.
    pub fn set_appearance(&mut self, appearance: Appearance) -> Result<()> {
        let document = self.document.ok_or(Error::NotLoaded)?;
        save_appearance(&mut self.host, document, &appearance)?;
        self.controller.set_appearance(appearance);
        Ok(())
    }

    /// Jump to the page holding a TOC entry.
    pub fn jump_to_toc_entry(&mut self, id: &str, now: Millis) -> Option<JumpResult> {
        let element = self.toc.iter().find(|e| e.id == id)?.element;
        self.jump_to_element(element, now)
    }

    pub fn jump_to_element(&mut self, element: ArenaNodeId, now: Millis) -> Option<JumpResult> {
        self.now = now;
        let result = self.controller.jump_to_element(element, now);
        self.drain_page_changes();
        result
    }

    /// Jump to a highlight's mark, waiting a few frames for it to be drawn.
    pub fn jump_to_highlight(&mut self, id: HighlightId, now: Millis) {
        self.navigator.begin_highlight_jump(id);
        self.step_highlight_jump(now);
    }

    fn step_highlight_jump(&mut self, now: Millis) {
        let Some(id) = self.navigator.pending_highlight_jump() else {
            return;
        };
        let mark = self
            .controller
            .surface()
            .and_then(|s| mark_element(s.dom(), s.root(), id));
        match self.navigator.step_highlight_jump(mark) {
            Some(JumpStep::Jump(mark)) => {
                self.jump_to_element(mark, now);
            }
            Some(JumpStep::Retry { render: true }) => self.render_marks(),
            Some(JumpStep::Retry { render: false } | JumpStep::GiveUp) | None => {}
        }
    }

    /// Jump to the element addressed by a block CFI or JSON path.
    pub fn scroll_to_cfi(&mut self, cfi: &str, now: Millis) -> bool {
        let element = self
            .controller
            .surface()
            .and_then(|s| resolve_cfi(s.dom(), s.root(), cfi));
        match element {
            Some(element) => self.jump_to_element(element, now).is_some(),
            None => false,
        }
    }

    /// Go to the page where a quote starts.
    pub fn scroll_to_quote(&mut self, text: &str, block_index: Option<usize>) -> Option<usize> {
        let metrics = self.controller.page_metrics();
        let surface = self.controller.surface_mut()?;
        surface.refresh_layout();
        let scope = SearchScope {
            block_index,
            occurrence: 0,
        };
        let range = find_text_range(surface.dom(), surface.root(), text, scope)?;
        let layout = surface.layout()?;
        let x = match layout.range_rects(&range.segments(surface.dom())).first() {
            Some(rect) => rect.x,
            None => {
                let element = quote_element(surface.dom(), surface.root(), text, block_index)?;
                layout.element_rect(element)?.x
            }
        };
        self.scroll_to_page(metrics.page_for_offset(x))
    }

    // --- Highlights ---

    /// Persist the pending highlight and select it.
    pub fn confirm_highlight(&mut self) -> Result<Option<HighlightId>> {
        let before = self.highlight_snapshot();
        let created = self.highlights.confirm(&mut self.host);
        self.emit_highlight_changes(before);
        created
    }

    pub fn cancel_highlight(&mut self) {
        let before = self.highlight_snapshot();
        self.highlights.cancel();
        self.emit_highlight_changes(before);
    }

    pub fn save_note(&mut self, id: HighlightId, note: &str) -> Result<()> {
        self.highlights.save_note(&mut self.host, id, note)
    }

    pub fn delete_highlight(&mut self, id: HighlightId) -> Result<()> {
        let before = self.highlight_snapshot();
        let deleted = self.highlights.delete(&mut self.host, id);
        self.emit_highlight_changes(before);
        deleted
    }

    pub fn select_highlight(&mut self, id: Option<HighlightId>) {
        let before = self.highlight_snapshot();
        self.highlights.select(id);
        self.emit_highlight_changes(before);
    }

    /// Stage the pending highlight as transient context.
    pub fn stage_pending_as_snippet(&mut self) -> Option<String> {
        let before = self.highlight_snapshot();
        let id = self.highlights.stage_pending_as_snippet();
        self.emit_highlight_changes(before);
        id
    }

    pub fn remove_snippet(&mut self, id: &str) {
        self.highlights.remove_snippet(id);
    }

    pub fn clear_snippets(&mut self) {
        self.highlights.clear_snippets();
    }

    /// Show a quote as the active mark, or clear it with `None`.
    pub fn set_active_quote(&mut self, text: Option<String>, block_index: Option<usize>) {
        self.highlights.set_active_quote(text, block_index);
    }

    /// Attach the conversation thread whose position follows the reader.
    pub fn attach_thread(&mut self, thread: Option<i64>) {
        self.progress.attach_thread(thread);
    }

    // --- Internals ---

    fn render_marks(&mut self) {
        if let Some(surface) = self.controller.surface_mut() {
            self.highlights.render(surface);
        }
    }

    fn highlight_snapshot(&self) -> (Option<HighlightId>, Option<PendingHighlight>) {
        (self.highlights.selected(), self.highlights.pending().cloned())
    }

    fn emit_highlight_changes(&mut self, before: (Option<HighlightId>, Option<PendingHighlight>)) {
        let (selected, pending) = before;
        if self.highlights.pending() != pending.as_ref() {
            self.events
                .push(ReaderEvent::HighlightPending(self.highlights.pending().cloned()));
        }
        if self.highlights.selected() != selected {
            self.events
                .push(ReaderEvent::HighlightSelected(self.highlights.selected()));
        }
    }

    fn drain_page_changes(&mut self) {
        for page in self.controller.take_page_changes() {
            self.progress.on_page_change(page, self.now);
            self.push_page_event(page);
        }
    }

    fn push_page_event(&mut self, page: usize) {
        self.events.push(ReaderEvent::PageChanged {
            page,
            total_pages: self.controller.total_pages(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::DomPosition;
    use crate::host::{KeyValueStore, MemoryHost};
    use crate::progress::progress_key;

    const DOC: DocumentId = DocumentId(1);
    const VIEWPORT: Size = Size {
        width: 1000.0,
        height: 616.0,
    };

    fn book(paragraphs: usize) -> String {
        let mut html = String::from(r##"<h1 id="top">Title</h1><p><a id="fnref1" href="#fn1">1</a> <a id="out" href="https://example.org">site</a></p>"##);
        for p in 0..paragraphs {
            let words: Vec<String> = (0..40).map(|w| format!("w{p}x{w}")).collect();
            html.push_str(&format!("<p>{}</p>", words.join(" ")));
        }
        html.push_str(r#"<p id="fn1">[1] A footnote.</p>"#);
        html
    }

    fn reader(paragraphs: usize) -> Reader<MemoryHost> {
        let mut host: MemoryHost = MemoryHost::default();
        host.documents.insert(DOC, "Book", book(paragraphs));
        let mut reader = Reader::new(host, ReaderConfig::default());
        reader.open(DOC, VIEWPORT).unwrap();
        reader
    }

    fn text_node_with(reader: &Reader<MemoryHost>, needle: &str) -> ArenaNodeId {
        let surface = reader.surface().unwrap();
        surface
            .dom()
            .text_nodes(surface.root())
            .into_iter()
            .find(|&n| surface.dom().text_content(n).is_some_and(|t| t.contains(needle)))
            .unwrap()
    }

    #[test]
    fn test_open_reports_first_page() {
        let mut reader = reader(60);
        assert_eq!(reader.state(), LayoutState::Ready);
        assert!(reader.total_pages() >= 10);
        let events = reader.take_events();
        assert_eq!(
            events,
            [ReaderEvent::PageChanged {
                page: 1,
                total_pages: reader.total_pages()
            }]
        );
        assert_eq!(reader.metadata().unwrap().title, "Book");
    }

    #[test]
    fn test_open_missing_document_fails() {
        let host: MemoryHost = MemoryHost::default();
        let mut reader = Reader::new(host, ReaderConfig::default());
        assert!(reader.open(DocumentId(9), VIEWPORT).is_err());
        assert_eq!(reader.state(), LayoutState::Unloaded);
        assert_eq!(reader.scroll_to_page(2), None);
    }

    #[test]
    fn test_progress_is_restored_and_saved() {
        let mut host: MemoryHost = MemoryHost::default();
        host.documents.insert(DOC, "Book", book(60));
        host.storage.set(&progress_key(DOC), r#"{"page":7}"#).unwrap();
        let mut reader = Reader::new(host, ReaderConfig::default());
        reader.open(DOC, VIEWPORT).unwrap();
        assert_eq!(reader.current_page(), 7);

        reader.take_events();
        reader.scroll_to_page(3);
        reader.tick(1000);
        assert_eq!(
            reader.host().get(&progress_key(DOC)).unwrap().as_deref(),
            Some(r#"{"page":3}"#)
        );

        // Later frames never re-apply the saved page.
        reader.set_columns(Columns::Two);
        reader.animation_frame(1100);
        assert_ne!(reader.current_page(), 7);
    }

    #[test]
    fn test_selection_confirm_and_jump() {
        let mut reader = reader(60);
        let node = text_node_with(&reader, "w30x0 ");
        let selection = Selection::new(DomPosition::new(node, 0), DomPosition::new(node, 5));
        reader.on_selection(Some(selection), 0);
        reader.tick(150);
        let pending = reader.pending_highlight().unwrap().clone();
        assert_eq!(pending.range.text, "w30x0");
        assert!(reader.take_events().contains(&ReaderEvent::HighlightPending(Some(pending))));

        let id = reader.confirm_highlight().unwrap().unwrap();
        assert_eq!(reader.selected_highlight(), Some(id));
        reader.animation_frame(200);

        reader.take_events();
        reader.jump_to_highlight(id, 300);
        assert!(reader.current_page() > 1);
        assert!(
            reader
                .take_events()
                .iter()
                .any(|e| matches!(e, ReaderEvent::PageChanged { .. }))
        );
    }

    #[test]
    fn test_link_clicks() {
        let mut reader = reader(5);
        let footnote = reader.surface().unwrap().dom().get_by_id("fnref1").unwrap();
        reader.on_click(Click::on(footnote), 0);
        let events = reader.take_events();
        assert!(matches!(
            &events[..],
            [ReaderEvent::CitationRequested { content, .. }] if content == "A footnote."
        ));

        let out = reader.surface().unwrap().dom().get_by_id("out").unwrap();
        reader.on_click(Click::on(out), 10);
        assert_eq!(
            reader.take_events(),
            [ReaderEvent::ExternalLink("https://example.org".to_string())]
        );
    }

    #[test]
    fn test_toc_and_cfi_navigation() {
        let mut reader = reader(60);
        assert_eq!(reader.toc().len(), 1);
        let landed = reader.jump_to_toc_entry("toc-0", 0).unwrap();
        assert_eq!(landed.page, 1);
        assert!(reader.scroll_to_cfi("epubcfi(/6/2!/4/60)", 10));
        assert!(reader.current_page() > 1);
        assert!(!reader.scroll_to_cfi("epubcfi(/6/2!/4/99999)", 20));
    }

    #[test]
    fn test_scroll_to_quote() {
        let mut reader = reader(60);
        let page = reader.scroll_to_quote("w45x3 w45x4", None).unwrap();
        assert!(page > 1);
        assert_eq!(reader.current_page(), page);
        assert_eq!(reader.scroll_to_quote("not in the book", None), None);
    }

    #[test]
    fn test_appearance_is_persisted_and_reflows() {
        let mut reader = reader(20);
        let wide = Appearance {
            margin: 120.0,
            ..Appearance::default()
        };
        let before = reader.total_pages();
        reader.set_appearance(wide.clone()).unwrap();
        assert_eq!(reader.state(), LayoutState::Reflowing);
        reader.animation_frame(16);
        assert_eq!(reader.state(), LayoutState::Ready);
        assert!(reader.total_pages() >= before);
        assert_eq!(load_appearance(reader.host(), DOC), wide);
    }

    #[test]
    fn test_unmount_drops_everything() {
        let mut reader = reader(20);
        let node = text_node_with(&reader, "w3x0 ");
        reader.on_selection(
            Some(Selection::new(DomPosition::new(node, 0), DomPosition::new(node, 4))),
            0,
        );
        reader.unmount();
        reader.tick(1000);
        assert!(reader.pending_highlight().is_none());
        assert_eq!(reader.state(), LayoutState::Unloaded);
        assert!(reader.toc().is_empty());
        assert!(matches!(reader.set_appearance(Appearance::default()), Err(Error::NotLoaded)));
    }

    #[test]
    fn test_focus_snaps_back_after_drift() {
        let mut reader = reader(60);
        reader.scroll_to_page(2);
        let target = reader.page_metrics().scroll_target(2);

        reader.on_scroll(target + 100.0, 0);
        reader.animation_frame(16);
        assert_eq!(reader.surface().unwrap().scroll_left(), target + 100.0);
        assert_eq!(reader.current_page(), 2);

        reader.on_focus_change();
        reader.animation_frame(32);
        assert_eq!(reader.surface().unwrap().scroll_left(), target);
        assert_eq!(reader.current_page(), 2);
    }

    #[test]
    fn test_selection_overlay_follows_the_visible_page() {
        let mut reader = reader(60);
        let node = text_node_with(&reader, "w0x0 ");
        let rects = reader
            .selection_overlay(&Selection::new(DomPosition::new(node, 0), DomPosition::new(node, 9)));
        assert_eq!(rects.len(), 1);
        let bounds = reader.surface().unwrap().root_rect();
        assert!(rects[0].width >= 4.0 && rects[0].height >= 4.0);
        assert!(rects[0].x >= bounds.x && rects[0].right() <= bounds.right());

        let collapsed = Selection::new(DomPosition::new(node, 3), DomPosition::new(node, 3));
        assert!(reader.selection_overlay(&collapsed).is_empty());

        let later = text_node_with(&reader, "w50x0 ");
        let off_page = Selection::new(DomPosition::new(later, 0), DomPosition::new(later, 5));
        assert!(reader.selection_overlay(&off_page).is_empty());

        reader.scroll_to_quote("w50x0 w50x1", None).unwrap();
        let later = text_node_with(&reader, "w50x0 ");
        let on_page = Selection::new(DomPosition::new(later, 0), DomPosition::new(later, 5));
        assert_eq!(reader.selection_overlay(&on_page).len(), 1);
    }
}
