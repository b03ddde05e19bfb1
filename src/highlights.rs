//! Selection capture and highlight marks.
//!
//! Marks are `<span>` wrappers spliced into the live tree. Stored addresses
//! always refer to the mark-free tree, so every render starts by unwrapping
//! the previous marks and merging the text nodes they split, resolves every
//! range against that clean tree, and only then wraps. Rendering the same
//! state twice yields the same tree.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::address::{
    AnchoredRange, DomPosition, LiveRange, compare_positions, normalize_boundary, remap_position,
    trim_range,
};
use crate::config::ReaderConfig;
use crate::dom::{ArenaDom, ArenaNodeId, Query, TextMerge};
use crate::error::{Error, Result};
use crate::host::{DocumentId, Highlight, HighlightId, HighlightStore};
use crate::layout::style::{HIGHLIGHT_ACTIVE_CLASS, HIGHLIGHT_CLASS, SNIPPET_CLASS};
use crate::layout::{Rect, Surface};
use crate::schedule::{Debounced, FrameSlot, Millis};
use crate::search::{SearchScope, find_text_range};

/// Selection rects smaller than this in either dimension are dropped.
const MIN_RECT_SIZE: f32 = 4.0;

/// Rects whose top and bottom differ by less than this share a line.
const LINE_TOLERANCE: f32 = 2.0;

/// A live selection as reported by the host. `anchor` is where the gesture
/// started, so it may come after `focus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: DomPosition,
    pub focus: DomPosition,
}

impl Selection {
    pub fn new(anchor: DomPosition, focus: DomPosition) -> Self {
        Self { anchor, focus }
    }
}

/// A captured selection waiting for confirm or cancel.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingHighlight {
    pub range: AnchoredRange,
    /// Bounding box relative to the overlay container.
    pub rect: Rect,
    /// Bounding box relative to the host viewport.
    pub viewport_rect: Rect,
}

/// A selection staged as transient context. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnippet {
    pub id: String,
    pub range: AnchoredRange,
}

/// A quote shown as an active mark, typically cited by an assistant answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveQuote {
    pub text: String,
    pub block_index: Option<usize>,
}

/// What one mark span stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkKind {
    Highlight { id: HighlightId, active: bool },
    Snippet { id: String },
    Quote,
}

impl MarkKind {
    fn create_span(&self, dom: &mut ArenaDom) -> ArenaNodeId {
        let active_class = format!("{HIGHLIGHT_CLASS} {HIGHLIGHT_ACTIVE_CLASS}");
        match self {
            MarkKind::Highlight { id, active } => {
                let class = if *active { active_class.as_str() } else { HIGHLIGHT_CLASS };
                let state = if *active { "active" } else { "idle" };
                let id = id.to_string();
                dom.create_html_element(
                    "span",
                    &[
                        ("class", class),
                        ("data-highlight-id", id.as_str()),
                        ("data-highlight-state", state),
                    ],
                )
            }
            MarkKind::Snippet { id } => dom.create_html_element(
                "span",
                &[
                    ("class", SNIPPET_CLASS),
                    ("data-snippet-id", id.as_str()),
                    ("data-highlight-state", "snippet"),
                ],
            ),
            MarkKind::Quote => dom.create_html_element(
                "span",
                &[("class", active_class.as_str()), ("data-highlight-state", "quote")],
            ),
        }
    }
}

/// Everything one render pass draws.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkSet<'a> {
    pub highlights: &'a [Highlight],
    pub selected: Option<HighlightId>,
    pub snippets: &'a [ContextSnippet],
    pub quote: Option<&'a ActiveQuote>,
}

/// Outcome of a render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Ranges that were drawn.
    pub rendered: usize,
    /// Ranges that could not be located and were left out.
    pub skipped: usize,
}

/// Remove every highlight and snippet mark beneath `root` and merge the text
/// nodes they separated. The returned merges let callers remap positions
/// taken before the cleanup.
pub fn clear_marks(dom: &mut ArenaDom, root: ArenaNodeId) -> Vec<TextMerge> {
    let marks: Vec<ArenaNodeId> = dom
        .descendants(root)
        .filter(|&n| dom.has_class(n, HIGHLIGHT_CLASS) || dom.has_class(n, SNIPPET_CLASS))
        .collect();
    if marks.is_empty() {
        return Vec::new();
    }
    for mark in marks {
        dom.unwrap_element(mark);
    }
    dom.normalize(root)
}

/// Redraw all marks beneath `root`.
///
/// Stale structural addresses fall back to text search; ranges that cannot
/// be found either way are skipped with a warning.
pub fn render_marks(dom: &mut ArenaDom, root: ArenaNodeId, marks: &MarkSet<'_>) -> RenderSummary {
    clear_marks(dom, root);

    let mut summary = RenderSummary::default();
    let mut resolved: Vec<(LiveRange, MarkKind)> = Vec::new();

    for highlight in marks.highlights {
        let kind = MarkKind::Highlight {
            id: highlight.id,
            active: marks.selected == Some(highlight.id),
        };
        match resolve_anchored(dom, root, &highlight.range) {
            Some(range) => resolved.push((range, kind)),
            None => {
                log::warn!("highlight {} could not be located; skipping", highlight.id);
                summary.skipped += 1;
            }
        }
    }
    for snippet in marks.snippets {
        match resolve_anchored(dom, root, &snippet.range) {
            Some(range) => resolved.push((range, MarkKind::Snippet { id: snippet.id.clone() })),
            None => {
                log::warn!("context snippet {} could not be located; skipping", snippet.id);
                summary.skipped += 1;
            }
        }
    }
    if let Some(quote) = marks.quote {
        let scope = SearchScope {
            block_index: quote.block_index,
            occurrence: 0,
        };
        match find_text_range(dom, root, &quote.text, scope) {
            Some(range) => resolved.push((range, MarkKind::Quote)),
            None => {
                log::warn!("active quote not found in document");
                summary.skipped += 1;
            }
        }
    }

    // Per text node: (from, to, mark) spans, nodes in first-seen order.
    let mut order: Vec<ArenaNodeId> = Vec::new();
    let mut spans: HashMap<ArenaNodeId, Vec<(usize, usize, usize)>> = HashMap::new();
    for (mark, (range, _)) in resolved.iter().enumerate() {
        for (node, from, to) in range.segments(dom) {
            spans
                .entry(node)
                .or_insert_with(|| {
                    order.push(node);
                    Vec::new()
                })
                .push((from, to, mark));
        }
    }

    for node in order {
        if let Some(node_spans) = spans.get(&node) {
            wrap_text_node(dom, node, node_spans, &resolved);
        }
    }
    summary.rendered = resolved.len();
    summary
}

fn resolve_anchored(dom: &ArenaDom, root: ArenaNodeId, range: &AnchoredRange) -> Option<LiveRange> {
    range.resolve(dom, root).or_else(|| {
        log::debug!("structural address is stale, searching for text");
        find_text_range(dom, root, &range.text, SearchScope::default())
    })
}

/// Split `node` at every span boundary and wrap each piece in the marks that
/// cover it, the earliest mark outermost.
fn wrap_text_node(
    dom: &mut ArenaDom,
    node: ArenaNodeId,
    node_spans: &[(usize, usize, usize)],
    resolved: &[(LiveRange, MarkKind)],
) {
    let len = dom.text_len(node);
    let mut cuts: Vec<usize> = node_spans
        .iter()
        .flat_map(|&(from, to, _)| [from, to])
        .filter(|&b| b > 0 && b < len)
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut pieces: Vec<(usize, ArenaNodeId)> = Vec::with_capacity(cuts.len() + 1);
    for &cut in cuts.iter().rev() {
        if let Some(tail) = dom.split_text(node, cut) {
            pieces.push((cut, tail));
        }
    }
    pieces.push((0, node));
    pieces.reverse();

    for (i, &(start, piece)) in pieces.iter().enumerate() {
        let end = pieces.get(i + 1).map_or(len, |&(next, _)| next);
        let mut covering: Vec<usize> = node_spans
            .iter()
            .filter(|&&(from, to, _)| from <= start && to >= end)
            .map(|&(_, _, mark)| mark)
            .collect();
        covering.sort_unstable();

        let mut inner = piece;
        for &mark in covering.iter().rev() {
            let span = resolved[mark].1.create_span(dom);
            dom.wrap(inner, span);
            inner = span;
        }
    }
}

/// First mark span of a highlight.
pub fn mark_element(dom: &ArenaDom, root: ArenaNodeId, id: HighlightId) -> Option<ArenaNodeId> {
    let query = Query::parse(&format!(r#"span.{HIGHLIGHT_CLASS}[data-highlight-id="{id}"]"#)).ok()?;
    query.select_first(dom, root)
}

/// Order and normalize a host selection into a text range. `None` when the
/// selection is collapsed or its ends cannot be placed on text.
pub fn selection_range(dom: &ArenaDom, selection: &Selection) -> Option<LiveRange> {
    let ordered = |start: DomPosition, end: DomPosition| -> Option<LiveRange> {
        let range = LiveRange::new(
            normalize_boundary(dom, start, true)?,
            normalize_boundary(dom, end, false)?,
        );
        (compare_positions(dom, &range.start, &range.end) == Ordering::Less).then_some(range)
    };
    ordered(selection.anchor, selection.focus)
        .or_else(|| ordered(selection.focus, selection.anchor))
}

fn range_in_root(dom: &ArenaDom, root: ArenaNodeId, range: &LiveRange) -> bool {
    dom.contains(root, range.start.node) && dom.contains(root, range.end.node)
}

/// Turn a host selection into a pending highlight.
///
/// Returns `None` for collapsed, blank or out-of-root selections. Any marks
/// present are removed first so the address refers to the mark-free tree;
/// the caller is expected to render them again.
pub fn capture_selection(surface: &mut Surface, selection: &Selection) -> Option<PendingHighlight> {
    let root = surface.root();
    let range = selection_range(surface.dom(), selection)?;
    if !range_in_root(surface.dom(), root, &range) {
        return None;
    }
    let range = trim_range(surface.dom(), range)?;

    surface.refresh_layout();
    let client: Vec<Rect> = surface
        .layout()
        .map(|layout| layout.range_rects(&range.segments(surface.dom())))
        .unwrap_or_default()
        .into_iter()
        .map(|rect| surface.to_client(rect))
        .collect();
    let bounds = Rect::bounding(&client).unwrap_or_default();
    let frame = surface.frame();

    let merges = clear_marks(surface.dom_mut(), root);
    let range = LiveRange::new(
        remap_position(range.start, &merges),
        remap_position(range.end, &merges),
    );
    let anchored = AnchoredRange::capture(surface.dom(), root, &range)?;
    Some(PendingHighlight {
        range: anchored,
        rect: frame.to_container(bounds),
        viewport_rect: frame.to_host(bounds),
    })
}

/// Client rects for drawing a live selection overlay: one rect per line,
/// clamped to the column box and the viewport.
pub fn selection_rects(surface: &mut Surface, selection: &Selection) -> Vec<Rect> {
    let root = surface.root();
    let Some(range) = selection_range(surface.dom(), selection) else {
        return Vec::new();
    };
    if !range_in_root(surface.dom(), root, &range) {
        return Vec::new();
    }
    surface.refresh_layout();
    let Some(layout) = surface.layout() else {
        return Vec::new();
    };
    let bounds = surface.root_rect();
    let viewport_height = surface.viewport().height;

    let mut merged: Vec<Rect> = Vec::new();
    for rect in layout.range_rects(&range.segments(surface.dom())) {
        let rect = surface.to_client(rect);
        if rect.width < MIN_RECT_SIZE || rect.height < MIN_RECT_SIZE {
            continue;
        }
        if rect.right() < bounds.x || rect.x > bounds.right() {
            continue;
        }
        if rect.bottom() < 0.0 || rect.y > viewport_height {
            continue;
        }
        let left = rect.x.max(bounds.x);
        let right = rect.right().min(bounds.right());
        if right - left < MIN_RECT_SIZE {
            continue;
        }
        match merged.last_mut() {
            Some(last)
                if (last.y - rect.y).abs() < LINE_TOLERANCE
                    && (last.bottom() - rect.bottom()).abs() < LINE_TOLERANCE =>
            {
                let lo = last.x.min(left);
                let hi = last.right().max(right);
                last.x = lo;
                last.width = hi - lo;
            }
            _ => merged.push(Rect::new(left, rect.y, right - left, rect.height)),
        }
    }
    merged
}

/// What a click inside the content hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget {
    Highlight(HighlightId),
    Image { src: String, alt: String },
    Elsewhere,
}

/// Classify a click on `target`.
pub fn classify_click(dom: &ArenaDom, target: ArenaNodeId) -> ClickTarget {
    if dom.is_tag(target, "img") {
        return ClickTarget::Image {
            src: dom.get_attr(target, "src").unwrap_or_default().to_string(),
            alt: dom.get_attr(target, "alt").unwrap_or_default().to_string(),
        };
    }
    dom.closest(target, |d, n| d.get_attr(n, "data-highlight-id").is_some())
        .and_then(|mark| dom.get_attr(mark, "data-highlight-id")?.parse().ok())
        .map_or(ClickTarget::Elsewhere, |id| ClickTarget::Highlight(HighlightId(id)))
}

/// Highlight state of one load: the stored list, the selection, the pending
/// capture, staged snippets and the active quote.
///
/// Every change that affects marks requests a render; the owner runs
/// [`HighlightManager::render`] on the next animation frame, after any
/// layout rebuild.
#[derive(Debug)]
pub struct HighlightManager {
    document: Option<DocumentId>,
    highlights: Vec<Highlight>,
    selected: Option<HighlightId>,
    pending: Option<PendingHighlight>,
    snippets: Vec<ContextSnippet>,
    next_snippet: u64,
    quote: Option<ActiveQuote>,
    selection: Debounced<Option<Selection>>,
    render: FrameSlot<()>,
}

impl HighlightManager {
    pub fn new(config: &ReaderConfig) -> Self {
        Self {
            document: None,
            highlights: Vec::new(),
            selected: None,
            pending: None,
            snippets: Vec::new(),
            next_snippet: 0,
            quote: None,
            selection: Debounced::new(config.selection_delay),
            render: FrameSlot::new(),
        }
    }

    /// Forget everything and start over for `document`.
    pub fn reset(&mut self, document: Option<DocumentId>) {
        self.document = document;
        self.highlights.clear();
        self.selected = None;
        self.pending = None;
        self.snippets.clear();
        self.quote = None;
        self.selection.cancel();
        self.render.take();
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    pub fn selected(&self) -> Option<HighlightId> {
        self.selected
    }

    pub fn pending(&self) -> Option<&PendingHighlight> {
        self.pending.as_ref()
    }

    pub fn snippets(&self) -> &[ContextSnippet] {
        &self.snippets
    }

    pub fn active_quote(&self) -> Option<&ActiveQuote> {
        self.quote.as_ref()
    }

    fn document(&self) -> Result<DocumentId> {
        self.document.ok_or(Error::NotLoaded)
    }

    /// Reload the stored list for the current document.
    pub fn load<S: HighlightStore>(&mut self, store: &S) -> Result<()> {
        self.highlights = store.list_highlights(self.document()?)?;
        self.render.request(());
        Ok(())
    }

    /// Replace the list directly, as after an external refresh.
    pub fn set_highlights(&mut self, highlights: Vec<Highlight>) {
        self.highlights = highlights;
        self.render.request(());
    }

    /// Queue a selection for capture; `None` means the selection went away.
    pub fn on_selection(&mut self, selection: Option<Selection>, now: Millis) {
        self.selection.schedule(selection, now);
    }

    /// Capture a debounced selection whose quiet period has elapsed. Returns
    /// true when the pending highlight was replaced.
    pub fn tick(&mut self, surface: Option<&mut Surface>, now: Millis) -> bool {
        let Some(selection) = self.selection.take_ready(now) else {
            return false;
        };
        self.pending = match (selection, surface) {
            (Some(selection), Some(surface)) => {
                let pending = capture_selection(surface, &selection);
                // Capture strips marks before addressing.
                self.render.request(());
                pending
            }
            _ => None,
        };
        true
    }

    /// Persist the pending highlight and select it.
    pub fn confirm<S: HighlightStore>(&mut self, store: &mut S) -> Result<Option<HighlightId>> {
        let document = self.document()?;
        let Some(pending) = &self.pending else {
            return Ok(None);
        };
        let id = store.create_highlight(document, &pending.range)?;
        log::debug!("created highlight {id}");
        self.pending = None;
        self.highlights = store.list_highlights(document)?;
        self.selected = Some(id);
        self.render.request(());
        Ok(Some(id))
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Store a note; blank notes remove it.
    pub fn save_note<S: HighlightStore>(&mut self, store: &mut S, id: HighlightId, note: &str) -> Result<()> {
        let document = self.document()?;
        let trimmed = note.trim();
        store.save_note(id, (!trimmed.is_empty()).then_some(trimmed))?;
        self.highlights = store.list_highlights(document)?;
        Ok(())
    }

    pub fn delete<S: HighlightStore>(&mut self, store: &mut S, id: HighlightId) -> Result<()> {
        let document = self.document()?;
        store.delete_highlight(id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.highlights = store.list_highlights(document)?;
        self.render.request(());
        Ok(())
    }

    /// Select a highlight, or clear the selection. Selecting clears the
    /// active quote. Returns true when the selection changed.
    pub fn select(&mut self, id: Option<HighlightId>) -> bool {
        if id.is_some() && self.quote.take().is_some() {
            self.render.request(());
        }
        if self.selected == id {
            return false;
        }
        self.selected = id;
        self.render.request(());
        true
    }

    /// Move the pending highlight into the staged snippets.
    pub fn stage_pending_as_snippet(&mut self) -> Option<String> {
        let pending = self.pending.take()?;
        self.next_snippet += 1;
        let id = format!("snippet-{}", self.next_snippet);
        self.snippets.push(ContextSnippet {
            id: id.clone(),
            range: pending.range,
        });
        self.render.request(());
        Some(id)
    }

    pub fn remove_snippet(&mut self, id: &str) {
        let before = self.snippets.len();
        self.snippets.retain(|s| s.id != id);
        if self.snippets.len() != before {
            self.render.request(());
        }
    }

    pub fn clear_snippets(&mut self) {
        if !self.snippets.is_empty() {
            self.snippets.clear();
            self.render.request(());
        }
    }

    /// Show `text` as the active quote, searched inside `block_index` first.
    pub fn set_active_quote(&mut self, text: Option<String>, block_index: Option<usize>) {
        let quote = text
            .filter(|t| !t.trim().is_empty())
            .map(|text| ActiveQuote { text, block_index });
        if quote != self.quote {
            self.quote = quote;
            self.render.request(());
        }
    }

    /// Apply a click on `target`: marks select their highlight, anything
    /// else except images clears the selection and the active quote.
    pub fn on_click(&mut self, dom: &ArenaDom, target: ArenaNodeId) -> ClickTarget {
        let hit = classify_click(dom, target);
        match &hit {
            ClickTarget::Highlight(id) => {
                self.select(Some(*id));
            }
            ClickTarget::Image { .. } => {}
            ClickTarget::Elsewhere => {
                self.select(None);
                self.set_active_quote(None, None);
            }
        }
        hit
    }

    /// Ask for a render on the next frame regardless of state changes.
    pub fn request_render(&mut self) {
        self.render.request(());
    }

    /// Take this frame's render request.
    pub fn take_render_request(&mut self) -> bool {
        self.render.take().is_some()
    }

    /// Redraw every mark on `surface`.
    pub fn render(&mut self, surface: &mut Surface) -> RenderSummary {
        let root = surface.root();
        let marks = MarkSet {
            highlights: &self.highlights,
            selected: self.selected,
            snippets: &self.snippets,
            quote: self.quote.as_ref(),
        };
        let summary = render_marks(surface.dom_mut(), root, &marks);
        log::debug!(
            "rendered {} marks ({} skipped)",
            summary.rendered,
            summary.skipped
        );
        summary
    }
}
