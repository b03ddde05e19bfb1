//! The layout controller: pagination state of the mounted surface.
//!
//! ```text
//! Unloaded --begin_load--> Loading --finish_load--> Ready <--> Reflowing
//!     ^                                               |
//!     +------------------- detach --------------------+
//! ```
//!
//! The controller is the only owner of "current page" and page metrics.
//! Everything that cares about page changes drains them with
//! [`LayoutController::take_page_changes`]; nothing writes back. Every
//! operation on a detached surface is a no-op.

use crate::config::{Appearance, ReaderConfig};
use crate::dom::{ArenaNodeId, Query};
use crate::layout::metrics::compute_total_pages;
use crate::layout::{Columns, FlowParams, PageMetrics, Rect, Size, StyleOptions, Surface, reader_css};
use crate::schedule::{Debounced, FrameSlot, Millis};

/// Blocks starting this far left of the scroll offset still count as visible.
const VISIBLE_BLOCK_SLACK: f32 = 10.0;

/// Scroll drift tolerated before snapping back to the locked page.
const SNAP_TOLERANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    Unloaded,
    Loading,
    Ready,
    Reflowing,
}

/// Where a jump landed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpResult {
    pub page: usize,
    /// Box of the target in content coordinates.
    pub rect: Rect,
}

/// Text of one block as it appears on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBlock {
    pub block_index: usize,
    pub text: String,
}

/// Visible text of a page, block by block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    pub page: usize,
    /// Blocks joined by blank lines.
    pub text: String,
    pub blocks: Vec<PageBlock>,
}

pub struct LayoutController {
    config: ReaderConfig,
    state: LayoutState,
    surface: Option<Surface>,
    columns: Columns,
    appearance: Appearance,
    /// Last synced metrics; `None` until the first load.
    metrics: Option<PageMetrics>,
    current_page: usize,
    total_pages: usize,
    /// The page the reader means to be on.
    page_lock: usize,
    navigating_until: Option<Millis>,
    snap: Debounced<()>,
    rebuild: FrameSlot<()>,
    relock: FrameSlot<()>,
    update: FrameSlot<()>,
    page_changes: Vec<usize>,
}

impl LayoutController {
    pub fn new(config: ReaderConfig) -> Self {
        let snap = Debounced::new(config.snap_delay);
        Self {
            config,
            state: LayoutState::Unloaded,
            surface: None,
            columns: Columns::One,
            appearance: Appearance::default(),
            metrics: None,
            current_page: 1,
            total_pages: 1,
            page_lock: 1,
            navigating_until: None,
            snap,
            rebuild: FrameSlot::new(),
            relock: FrameSlot::new(),
            update: FrameSlot::new(),
            page_changes: Vec::new(),
        }
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut Surface> {
        self.surface.as_mut()
    }

    pub fn columns(&self) -> Columns {
        self.columns
    }

    pub fn appearance(&self) -> &Appearance {
        &self.appearance
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn page_lock(&self) -> usize {
        self.page_lock
    }

    pub fn is_navigating(&self, now: Millis) -> bool {
        self.navigating_until.is_some_and(|until| now < until)
    }

    /// Drop the current surface and every pending task, and wait for new
    /// content.
    pub fn begin_load(&mut self) {
        self.detach();
        self.state = LayoutState::Loading;
        log::debug!("layout: loading");
    }

    /// Attach the surface of the new load and paginate it from page 1.
    pub fn finish_load(&mut self, surface: Surface) {
        self.surface = Some(surface);
        self.current_page = 1;
        self.page_lock = 1;
        self.sync_page_metrics();
        self.set_scroll(0.0);
        self.state = LayoutState::Ready;
        self.update_pagination();
        log::debug!("layout: ready with {} pages", self.total_pages);
    }

    /// Tear down the surface. Pending work is dropped, never run.
    pub fn detach(&mut self) {
        self.surface = None;
        self.state = LayoutState::Unloaded;
        self.snap.cancel();
        self.rebuild.take();
        self.relock.take();
        self.update.take();
        self.navigating_until = None;
        self.page_changes.clear();
        self.current_page = 1;
        self.total_pages = 1;
        self.page_lock = 1;
    }

    /// Cached metrics, or zeroed fallback metrics before the first load.
    /// Never typesets.
    pub fn page_metrics(&self) -> PageMetrics {
        self.metrics.unwrap_or_else(PageMetrics::fallback)
    }

    fn flow_params(&self, viewport: Size) -> FlowParams {
        let viewport = if viewport.width > 0.0 {
            viewport
        } else {
            Size::new(self.config.fallback_width, viewport.height)
        };
        FlowParams::new(
            viewport,
            self.columns,
            self.appearance.margin,
            &self.appearance.font_family,
            self.appearance.line_height,
            self.config.image_height,
        )
    }

    /// Apply the current columns and appearance to the surface, typeset,
    /// and refresh the cached metrics.
    pub fn sync_page_metrics(&mut self) {
        let Some(viewport) = self.surface.as_ref().map(Surface::viewport) else {
            return;
        };
        let params = self.flow_params(viewport);
        let css = reader_css(&StyleOptions {
            columns: self.columns,
            margin: self.appearance.margin,
            page_gap: params.gap,
            font_family: self.appearance.font_family.clone(),
            line_height: self.appearance.line_height,
        });
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        surface.install_stylesheet(&css);
        surface.configure(params.clone());
        surface.refresh_layout();
        let columns_used = surface.layout().map_or(1, |l| l.columns_used());
        self.total_pages = compute_total_pages(columns_used, self.columns);
        self.metrics = Some(PageMetrics::new(
            params.page_width,
            params.gap,
            surface.scroll_left(),
            surface.root_rect(),
            self.columns,
        ));
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        if let Some(surface) = self.surface.as_mut() {
            surface.set_viewport(viewport);
        }
        self.schedule_rebuild();
    }

    pub fn set_columns(&mut self, columns: Columns) {
        if self.columns != columns {
            self.columns = columns;
            self.schedule_rebuild();
        }
    }

    pub fn set_appearance(&mut self, appearance: Appearance) {
        if self.appearance != appearance {
            self.appearance = appearance;
            self.schedule_rebuild();
        }
    }

    /// Coalesce a rebuild into the next animation frame. Parameters are read
    /// when the rebuild runs, so the latest request wins.
    pub fn schedule_rebuild(&mut self) {
        if self.surface.is_none() {
            return;
        }
        if self.state == LayoutState::Ready {
            self.state = LayoutState::Reflowing;
        }
        self.rebuild.request(());
    }

    /// Re-align with the locked page on the next frame, e.g. after the
    /// surface regains focus or visibility.
    pub fn schedule_relock(&mut self) {
        if self.surface.is_some() {
            self.relock.request(());
        }
    }

    /// Re-typeset with the current parameters and return to the place the
    /// reader was at.
    pub fn rebuild(&mut self) {
        if self.surface.is_none() {
            return;
        }
        self.state = LayoutState::Reflowing;
        let captured = self.visible_page();
        let anchor = self.reading_anchor(captured);
        self.sync_page_metrics();

        let target = anchor
            .and_then(|flow| self.page_of_flow(flow))
            .unwrap_or(captured)
            .clamp(1, self.total_pages);
        log::debug!("layout: rebuilt, page {captured} -> {target}");
        self.page_lock = target;
        let scroll = self.page_metrics().scroll_target(target);
        self.set_scroll(scroll);
        self.state = LayoutState::Ready;
        self.update_pagination();
    }

    /// Page shown at the current scroll offset under the applied metrics.
    fn visible_page(&self) -> usize {
        self.metrics
            .map_or(1, |m| m.current_page())
            .clamp(1, self.total_pages.max(1))
    }

    /// Flow offset of the first text on `page`, under the applied layout.
    fn reading_anchor(&mut self, page: usize) -> Option<usize> {
        let per_page = self.metrics?.columns.count();
        let surface = self.surface.as_mut()?;
        surface.refresh_layout();
        let first = (page - 1) * per_page;
        surface
            .layout()?
            .fragments_in_columns(first, first + per_page)
            .first()
            .map(|f| f.flow_offset)
    }

    fn page_of_flow(&mut self, flow: usize) -> Option<usize> {
        let per_page = self.columns.count();
        let surface = self.surface.as_mut()?;
        surface.refresh_layout();
        let fragment = surface.layout()?.fragment_at_flow(flow)?;
        Some(fragment.column / per_page + 1)
    }

    fn set_scroll(&mut self, target: f32) {
        let max = self.page_metrics().scroll_target(self.total_pages);
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        surface.set_scroll_left(target.min(max));
        if let Some(metrics) = self.metrics.as_mut() {
            metrics.scroll_left = surface.scroll_left();
        }
    }

    /// The host scrolled the surface.
    pub fn on_scroll(&mut self, scroll_left: f32, now: Millis) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        surface.set_scroll_left(scroll_left);
        if let Some(metrics) = self.metrics.as_mut() {
            metrics.scroll_left = surface.scroll_left();
        }
        if self.is_navigating(now) {
            return;
        }
        self.update.request(());
        self.snap.schedule((), now);
    }

    /// Run timers that are due.
    pub fn tick(&mut self, now: Millis) {
        if self.navigating_until.is_some_and(|until| now >= until) {
            self.navigating_until = None;
        }
        if self.snap.take_ready(now).is_some() {
            self.lock_to_page(None);
        }
    }

    /// Run frame-scheduled work. Returns true when the layout was rebuilt,
    /// so marks can be re-rendered against it.
    pub fn animation_frame(&mut self, now: Millis) -> bool {
        let rebuilt = self.rebuild.take().is_some();
        if rebuilt {
            self.rebuild();
        }
        if self.relock.take().is_some() {
            self.lock_to_page(None);
        }
        if self.update.take().is_some() && !self.is_navigating(now) {
            self.update_pagination();
        }
        rebuilt
    }

    /// Recompute total pages and the current page from the scroll offset.
    ///
    /// A page change is queued when the page differs from the last one
    /// reported. The lock follows the scroll offset once it has moved more
    /// than half a page away from the locked page.
    pub fn update_pagination(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let Some(metrics) = self.metrics.as_mut() else {
            return;
        };
        if !metrics.is_determinate() {
            return;
        }
        surface.refresh_layout();
        let Some(layout) = surface.layout() else {
            return;
        };
        let total = compute_total_pages(layout.columns_used(), self.columns);
        self.total_pages = total;
        metrics.scroll_left = surface.scroll_left();

        let page = metrics.current_page().clamp(1, total);
        if page != self.current_page {
            log::debug!("layout: page {} -> {page}", self.current_page);
            self.current_page = page;
            self.page_changes.push(page);
        }

        let unit = metrics.scroll_unit();
        let locked_at = self.page_lock.saturating_sub(1) as f32 * unit;
        if (metrics.scroll_left - locked_at).abs() > unit / 2.0 {
            self.page_lock = page;
        }
    }

    /// Scroll to `page`, clamped to the document. Returns the page landed on.
    pub fn scroll_to_page(&mut self, page: usize) -> Option<usize> {
        self.surface.as_ref()?;
        let metrics = self.metrics.filter(PageMetrics::is_determinate)?;
        let page = page.clamp(1, self.total_pages);
        self.page_lock = page;
        self.set_scroll(metrics.scroll_target(page));
        self.update_pagination();
        Some(page)
    }

    /// Snap the scroll offset back onto a page (the locked one by default)
    /// when it has drifted.
    pub fn lock_to_page(&mut self, page: Option<usize>) {
        let Some(metrics) = self.metrics.filter(PageMetrics::is_determinate) else {
            return;
        };
        let Some(scroll) = self.surface.as_ref().map(Surface::scroll_left) else {
            return;
        };
        let target = metrics.scroll_target(page.unwrap_or(self.page_lock));
        if (scroll - target).abs() > SNAP_TOLERANCE {
            self.set_scroll(target);
            self.update_pagination();
        }
    }

    pub fn prev_page(&mut self) -> Option<usize> {
        self.scroll_to_page(self.page_lock.saturating_sub(1).max(1))
    }

    pub fn next_page(&mut self) -> Option<usize> {
        self.scroll_to_page((self.page_lock + 1).min(self.total_pages))
    }

    /// Jump instantly to the page holding `element`. Scroll feedback is
    /// ignored for a short settle period afterwards.
    pub fn jump_to_element(&mut self, element: ArenaNodeId, now: Millis) -> Option<JumpResult> {
        let metrics = self.metrics.filter(PageMetrics::is_determinate)?;
        let surface = self.surface.as_mut()?;
        surface.refresh_layout();
        let rect = surface.layout()?.element_rect(element)?;

        let page = metrics.page_for_offset(rect.x).clamp(1, self.total_pages);
        self.page_lock = page;
        self.navigating_until = Some(now + self.config.navigation_settle);
        self.snap.cancel();
        self.set_scroll(metrics.scroll_target(page));
        self.update_pagination();
        Some(JumpResult { page, rect })
    }

    /// Drain page changes in the order they happened.
    pub fn take_page_changes(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.page_changes)
    }

    /// The first indexed block at or after the scroll offset, with its index.
    pub fn first_visible_block(&mut self) -> Option<(ArenaNodeId, usize)> {
        let surface = self.surface.as_mut()?;
        surface.refresh_layout();
        let scroll = surface.scroll_left();
        let query = Query::parse("[data-block-index]").ok()?;
        let dom = surface.dom();
        let layout = surface.layout()?;
        query
            .select_all(dom, surface.root())
            .into_iter()
            .find(|&block| {
                layout
                    .element_rect(block)
                    .is_some_and(|rect| rect.x >= scroll - VISIBLE_BLOCK_SLACK)
            })
            .and_then(|block| {
                let index = dom.get_attr(block, "data-block-index")?.parse().ok()?;
                Some((block, index))
            })
    }

    /// Visible text of `page`, grouped by indexed block.
    pub fn page_content(&mut self, page: usize) -> Option<PageContent> {
        let per_page = self.metrics?.columns.count();
        let surface = self.surface.as_mut()?;
        surface.refresh_layout();
        let dom = surface.dom();
        let layout = surface.layout()?;

        let first = page.checked_sub(1)? * per_page;
        let mut blocks: Vec<(ArenaNodeId, usize, String, usize)> = Vec::new();
        for fragment in layout.fragments_in_columns(first, first + per_page) {
            let Some(block) = dom.closest(fragment.node, |d, n| {
                d.get_attr(n, "data-block-index").is_some()
            }) else {
                continue;
            };
            let Some(text) = dom.text_content(fragment.node) else {
                continue;
            };
            let piece: String = text
                .chars()
                .skip(fragment.start)
                .take(fragment.end - fragment.start)
                .collect();
            let next_flow = fragment.flow_offset + (fragment.end - fragment.start);

            match blocks.last_mut() {
                Some((current, _, buf, end)) if *current == block => {
                    if fragment.flow_offset > *end {
                        buf.push(' ');
                    }
                    buf.push_str(&piece);
                    *end = next_flow;
                }
                _ => {
                    let index = dom
                        .get_attr(block, "data-block-index")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    blocks.push((block, index, piece, next_flow));
                }
            }
        }

        let blocks: Vec<PageBlock> = blocks
            .into_iter()
            .map(|(_, block_index, text, _)| PageBlock { block_index, text })
            .collect();
        let text = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Some(PageContent { page, text, blocks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{PrepareOptions, mount, prepare_document, wrap_body};

    const VIEWPORT: Size = Size {
        width: 1000.0,
        height: 616.0,
    };

    /// Paragraphs of unique words, `w<paragraph>x<word>`.
    fn book(paragraphs: usize) -> String {
        (0..paragraphs)
            .map(|p| {
                let words: Vec<String> = (0..40).map(|w| format!("w{p}x{w}")).collect();
                format!("<p>{}</p>", words.join(" "))
            })
            .collect()
    }

    fn loaded(paragraphs: usize) -> LayoutController {
        let prepared = prepare_document(&book(paragraphs), &PrepareOptions::default());
        let (dom, root) = mount(&wrap_body(&prepared.html));
        let mut controller = LayoutController::new(ReaderConfig::default());
        controller.begin_load();
        controller.finish_load(Surface::new(dom, root, VIEWPORT));
        controller
    }

    #[test]
    fn test_detached_controller_is_inert() {
        let mut controller = LayoutController::new(ReaderConfig::default());
        assert_eq!(controller.state(), LayoutState::Unloaded);
        assert!(!controller.page_metrics().is_determinate());
        assert_eq!(controller.scroll_to_page(3), None);
        controller.on_scroll(500.0, 0);
        controller.schedule_rebuild();
        assert!(!controller.animation_frame(16));
        assert_eq!(controller.page_content(1), None);
        assert!(controller.take_page_changes().is_empty());
    }

    #[test]
    fn test_load_paginates_from_first_page() {
        let controller = loaded(60);
        assert_eq!(controller.state(), LayoutState::Ready);
        assert_eq!(controller.current_page(), 1);
        assert!(controller.total_pages() >= 10);
        let metrics = controller.page_metrics();
        assert_eq!(metrics.page_width, 750.0);
        assert_eq!(metrics.stride, 750.0);
    }

    #[test]
    fn test_scroll_to_page_reports_change_once() {
        let mut controller = loaded(60);
        assert_eq!(controller.scroll_to_page(3), Some(3));
        assert_eq!(controller.page_metrics().scroll_left, 1500.0);
        assert_eq!(controller.current_page(), 3);
        assert_eq!(controller.take_page_changes(), vec![3]);
        controller.update_pagination();
        assert!(controller.take_page_changes().is_empty());

        let last = controller.total_pages();
        assert_eq!(controller.scroll_to_page(last + 10), Some(last));
        assert_eq!(controller.prev_page(), Some(last - 1));
    }

    #[test]
    fn test_scroll_updates_on_next_frame_and_snaps() {
        let mut controller = loaded(60);
        controller.on_scroll(760.0, 1000);
        assert_eq!(controller.current_page(), 1);
        controller.animation_frame(1016);
        assert_eq!(controller.current_page(), 2);
        assert_eq!(controller.page_lock(), 2);

        controller.tick(1200);
        assert_eq!(controller.page_metrics().scroll_left, 760.0);
        controller.tick(1250);
        assert_eq!(controller.page_metrics().scroll_left, 750.0);
    }

    #[test]
    fn test_navigation_suppresses_scroll_feedback() {
        let mut controller = loaded(60);
        let block = {
            let surface = controller.surface().unwrap();
            crate::search::block_element(surface.dom(), surface.root(), 30).unwrap()
        };
        let jump = controller.jump_to_element(block, 5000).unwrap();
        assert_eq!(controller.current_page(), jump.page);
        assert!(jump.page > 1);
        assert_eq!(jump.page, controller.page_metrics().page_for_offset(jump.rect.x));

        controller.on_scroll(0.0, 5100);
        controller.animation_frame(5116);
        assert_eq!(controller.current_page(), jump.page);
        assert!(!controller.is_navigating(5150));
    }

    #[test]
    fn test_reflow_keeps_reading_position() {
        let mut controller = loaded(80);
        controller.scroll_to_page(5);
        let before = controller.page_content(5).unwrap();
        let first_word = before.text.split_whitespace().next().unwrap().to_string();

        let appearance = Appearance {
            margin: 80.0,
            ..Appearance::default()
        };
        controller.set_appearance(appearance);
        assert_eq!(controller.state(), LayoutState::Reflowing);
        assert!(controller.animation_frame(16));
        assert_eq!(controller.state(), LayoutState::Ready);

        let page = controller.current_page();
        let after = controller.page_content(page).unwrap();
        assert!(after.text.split_whitespace().any(|w| w == first_word));
    }

    #[test]
    fn test_rebuilds_coalesce_into_one_frame() {
        let mut controller = loaded(20);
        controller.set_columns(Columns::Two);
        controller.set_viewport(Size::new(1800.0, 616.0));
        assert!(controller.animation_frame(16));
        assert!(!controller.animation_frame(32));
        let metrics = controller.page_metrics();
        assert_eq!(metrics.columns, Columns::Two);
        assert_eq!(metrics.scroll_unit(), 2.0 * metrics.stride);
    }

    #[test]
    fn test_page_content_groups_blocks() {
        let mut controller = loaded(3);
        let content = controller.page_content(1).unwrap();
        assert_eq!(content.blocks.len(), 3);
        assert_eq!(content.blocks[1].block_index, 1);
        assert!(content.blocks[0].text.starts_with("w0x0 w0x1 w0x2"));
        assert_eq!(content.text.matches("\n\n").count(), 2);
        assert_eq!(controller.first_visible_block().map(|(_, i)| i), Some(0));
    }
}
