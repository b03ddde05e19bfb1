//! The column-flow typesetter.
//!
//! Content beneath the reader root is broken into lines with a fixed glyph
//! advance per font, and lines fill fixed-height columns left to right.
//! Column `n` starts at `n * stride`. Every laid-out run of characters
//! becomes a [`Fragment`] that remembers the text node, the character span
//! and a document-wide flow offset; element boxes are derived from the
//! fragments they contain.

use std::collections::HashMap;

use crate::dom::{ArenaDom, ArenaNodeData, ArenaNodeId};
use crate::util::parse_int_prefix;

use super::geometry::{Rect, Size};
use super::metrics::{
    Columns, ROOT_PADDING_TOP, compute_column_height, compute_page_gap, compute_page_width,
};
use super::style::{BASE_FONT_SIZE, BlockStyle, HIDDEN_ELEMENTS, REM, block_style, glyph_advance};

/// Vertical space taken by a horizontal rule.
const RULE_SPACE: f32 = 4.0 * REM;

/// Layout parameters. Two layouts with equal parameters over the same tree
/// are identical.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowParams {
    pub columns: Columns,
    pub page_width: f32,
    pub gap: f32,
    pub column_height: f32,
    pub margin: f32,
    pub font_family: String,
    pub line_height: f32,
    /// Height of images without an explicit `height` attribute.
    pub image_height: f32,
}

impl FlowParams {
    /// Derive column geometry from the viewport.
    pub fn new(
        viewport: Size,
        columns: Columns,
        margin: f32,
        font_family: &str,
        line_height: f32,
        image_height: f32,
    ) -> Self {
        let gap = compute_page_gap(columns);
        Self {
            columns,
            page_width: compute_page_width(viewport.width, columns, gap),
            gap,
            column_height: compute_column_height(viewport.height),
            margin,
            font_family: font_family.to_string(),
            line_height,
            image_height,
        }
    }

    pub fn stride(&self) -> f32 {
        self.page_width + self.gap
    }

    /// Width left for text once both margins are taken out of a column.
    pub fn text_width(&self) -> f32 {
        (self.page_width - 2.0 * self.margin).max(BASE_FONT_SIZE)
    }
}

/// A run of characters of one text node placed on one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub node: ArenaNodeId,
    /// Character span `[start, end)` inside the text node.
    pub start: usize,
    pub end: usize,
    /// Offset of `start` in the concatenated text of the laid-out tree.
    pub flow_offset: usize,
    pub column: usize,
    /// Box in content coordinates (before scrolling).
    pub rect: Rect,
    /// Width of one character.
    pub advance: f32,
}

impl Fragment {
    /// Box covering the characters `[from, to)` of the node, if they overlap.
    pub fn span_rect(&self, from: usize, to: usize) -> Option<Rect> {
        let lo = from.max(self.start);
        let hi = to.min(self.end);
        if lo >= hi {
            return None;
        }
        Some(Rect::new(
            self.rect.x + (lo - self.start) as f32 * self.advance,
            self.rect.y,
            (hi - lo) as f32 * self.advance,
            self.rect.height,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ElementBox {
    /// An element whose text occupies the flow range `[start, end)`. `entry`
    /// is where the cursor stood when the element opened.
    Flow {
        start: usize,
        end: usize,
        entry: (usize, Rect),
    },
    /// An image or other box with its own size.
    Replaced { column: usize, rect: Rect },
}

/// The result of typesetting one tree.
#[derive(Debug, Clone)]
pub struct FlowLayout {
    fragments: Vec<Fragment>,
    by_node: HashMap<ArenaNodeId, Vec<usize>>,
    elements: HashMap<ArenaNodeId, ElementBox>,
    columns_used: usize,
    text_length: usize,
}

impl FlowLayout {
    /// Typeset everything beneath `root`.
    pub fn compute(dom: &ArenaDom, root: ArenaNodeId, params: &FlowParams) -> Self {
        let mut setter = Typesetter::new(dom, params);
        setter.visit(root);
        setter.flush();

        let mut by_node: HashMap<ArenaNodeId, Vec<usize>> = HashMap::new();
        for (i, fragment) in setter.fragments.iter().enumerate() {
            by_node.entry(fragment.node).or_default().push(i);
        }
        Self {
            fragments: setter.fragments,
            by_node,
            elements: setter.elements,
            columns_used: setter.columns_used,
            text_length: setter.flow,
        }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Number of columns holding content (at least one).
    pub fn columns_used(&self) -> usize {
        self.columns_used
    }

    /// Characters in the laid-out text, hidden content excluded.
    pub fn text_length(&self) -> usize {
        self.text_length
    }

    /// Column and box of an element, in content coordinates.
    ///
    /// Text-bearing elements report the box of their first line; empty ones
    /// (such as bare anchor targets) report the cursor position where they
    /// opened. Hidden elements and nodes outside the root return `None`.
    pub fn element_box(&self, id: ArenaNodeId) -> Option<(usize, Rect)> {
        match *self.elements.get(&id)? {
            ElementBox::Replaced { column, rect } => Some((column, rect)),
            ElementBox::Flow { start, end, entry } => {
                let i = self.fragments.partition_point(|f| f.flow_offset < start);
                match self.fragments.get(i) {
                    Some(f) if f.flow_offset < end => Some((f.column, f.rect)),
                    _ => Some(entry),
                }
            }
        }
    }

    pub fn element_rect(&self, id: ArenaNodeId) -> Option<Rect> {
        self.element_box(id).map(|(_, rect)| rect)
    }

    /// Fragments placed on a text node, in order.
    pub fn node_fragments(&self, node: ArenaNodeId) -> impl Iterator<Item = &Fragment> {
        self.by_node
            .get(&node)
            .into_iter()
            .flatten()
            .map(|&i| &self.fragments[i])
    }

    /// Boxes covering a set of `(text node, from, to)` spans.
    pub fn range_rects(&self, segments: &[(ArenaNodeId, usize, usize)]) -> Vec<Rect> {
        segments
            .iter()
            .flat_map(|&(node, from, to)| {
                self.node_fragments(node)
                    .filter_map(move |f| f.span_rect(from, to))
            })
            .collect()
    }

    /// Fragments whose column lies in `[first, end)`.
    pub fn fragments_in_columns(&self, first: usize, end: usize) -> &[Fragment] {
        let lo = self.fragments.partition_point(|f| f.column < first);
        let hi = self.fragments.partition_point(|f| f.column < end);
        &self.fragments[lo..hi]
    }

    /// The fragment holding a flow offset, or the last one before it.
    pub fn fragment_at_flow(&self, flow_offset: usize) -> Option<&Fragment> {
        let i = self
            .fragments
            .partition_point(|f| f.flow_offset <= flow_offset);
        i.checked_sub(1).and_then(|i| self.fragments.get(i))
    }
}

#[derive(Debug, Clone, Copy)]
struct RunChar {
    c: char,
    node: ArenaNodeId,
    offset: usize,
    flow: usize,
}

/// Inherited text properties of the enclosing block.
#[derive(Debug, Clone, Copy)]
struct TextContext {
    font_size: f32,
    line_factor: f32,
    advance: f32,
    indent: f32,
}

impl TextContext {
    fn line_height(&self) -> f32 {
        self.font_size * self.line_factor
    }

    fn char_width(&self) -> f32 {
        self.font_size * self.advance
    }

    fn nested(&self, style: &BlockStyle, font_family: &str) -> TextContext {
        TextContext {
            font_size: style.font_size.unwrap_or(self.font_size),
            line_factor: style.line_height.unwrap_or(self.line_factor),
            advance: if style.monospace {
                glyph_advance(font_family, true)
            } else {
                self.advance
            },
            indent: self.indent + style.indent,
        }
    }
}

struct Typesetter<'a> {
    dom: &'a ArenaDom,
    params: &'a FlowParams,
    stride: f32,
    text_width: f32,
    column: usize,
    /// Height already filled in the current column.
    y: f32,
    flow: usize,
    columns_used: usize,
    run: Vec<RunChar>,
    context: Vec<TextContext>,
    fragments: Vec<Fragment>,
    elements: HashMap<ArenaNodeId, ElementBox>,
}

impl<'a> Typesetter<'a> {
    fn new(dom: &'a ArenaDom, params: &'a FlowParams) -> Self {
        let base = TextContext {
            font_size: BASE_FONT_SIZE,
            line_factor: params.line_height,
            advance: glyph_advance(&params.font_family, false),
            indent: 0.0,
        };
        Self {
            dom,
            params,
            stride: params.stride(),
            text_width: params.text_width(),
            column: 0,
            y: 0.0,
            flow: 0,
            columns_used: 1,
            run: Vec::new(),
            context: vec![base],
            fragments: Vec::new(),
            elements: HashMap::new(),
        }
    }

    fn current(&self) -> TextContext {
        // The base context is never popped.
        self.context[self.context.len() - 1]
    }

    fn visit(&mut self, node: ArenaNodeId) {
        let dom = self.dom;
        let Some(data) = dom.get(node).map(|n| &n.data) else {
            return;
        };
        match data {
            ArenaNodeData::Text(text) => {
                let base = self.flow;
                let mut len = 0;
                for (offset, c) in text.chars().enumerate() {
                    self.run.push(RunChar {
                        c,
                        node,
                        offset,
                        flow: base + offset,
                    });
                    len += 1;
                }
                self.flow += len;
            }
            ArenaNodeData::Element { name, .. } => {
                let tag = name.local.as_ref();
                if HIDDEN_ELEMENTS.contains(&tag) || dom.get_attr(node, "hidden").is_some() {
                    return;
                }
                match tag {
                    "img" | "svg" => self.replaced(node),
                    "br" => self.flush(),
                    "hr" => {
                        self.flush();
                        self.space(RULE_SPACE);
                    }
                    _ => self.container(node, block_style(tag)),
                }
            }
            ArenaNodeData::Document => {
                for child in dom.children(node) {
                    self.visit(child);
                }
            }
            _ => {}
        }
    }

    fn container(&mut self, node: ArenaNodeId, style: Option<BlockStyle>) {
        let start = self.flow;
        if let Some(style) = &style {
            self.flush();
            self.space(style.margin_top);
            let nested = self.current().nested(style, &self.params.font_family);
            self.context.push(nested);
        }
        let entry = self.cursor_box();
        let dom = self.dom;
        for child in dom.children(node) {
            self.visit(child);
        }
        if let Some(style) = &style {
            self.flush();
            self.context.pop();
            self.space(style.margin_bottom);
        }
        self.elements.insert(
            node,
            ElementBox::Flow {
                start,
                end: self.flow,
                entry,
            },
        );
    }

    fn replaced(&mut self, node: ArenaNodeId) {
        self.flush();
        let height = self
            .dom
            .get_attr(node, "height")
            .and_then(|h| parse_int_prefix(h, 10))
            .map_or(self.params.image_height, |h| h as f32)
            .clamp(1.0, self.params.column_height);
        let context = self.current();
        let (column, top) = self.place(height);
        let rect = Rect::new(
            self.column_left(column) + context.indent,
            top,
            (self.text_width - context.indent).max(1.0),
            height,
        );
        self.elements
            .insert(node, ElementBox::Replaced { column, rect });
    }

    fn column_left(&self, column: usize) -> f32 {
        column as f32 * self.stride + self.params.margin
    }

    /// Where the next line would start, without placing anything.
    fn cursor_box(&self) -> (usize, Rect) {
        let context = self.current();
        let (column, y) = if self.y >= self.params.column_height {
            (self.column + 1, 0.0)
        } else {
            (self.column, self.y)
        };
        let rect = Rect::new(
            self.column_left(column) + context.indent,
            ROOT_PADDING_TOP + y,
            0.0,
            context.line_height(),
        );
        (column, rect)
    }

    /// Vertical margin. Margins at the top of a column collapse away.
    fn space(&mut self, amount: f32) {
        if self.y > 0.0 {
            self.y += amount;
        }
    }

    /// Reserve `height` in the flow, breaking to a new column when the box
    /// does not fit. Returns the column and top edge.
    fn place(&mut self, height: f32) -> (usize, f32) {
        if self.y > 0.0 && self.y + height > self.params.column_height {
            self.column += 1;
            self.y = 0.0;
        }
        let top = ROOT_PADDING_TOP + self.y;
        self.y += height;
        self.columns_used = self.columns_used.max(self.column + 1);
        (self.column, top)
    }

    /// Break the pending inline run into lines.
    fn flush(&mut self) {
        if self.run.iter().all(|rc| rc.c.is_whitespace()) {
            self.run.clear();
            return;
        }
        let run = std::mem::take(&mut self.run);
        let context = self.current();
        let char_width = context.char_width();
        let available = (self.text_width - context.indent).max(char_width);
        let per_line = ((available / char_width).floor() as usize).max(1);

        let words = run
            .split(|rc| rc.c.is_whitespace())
            .filter(|w| !w.is_empty())
            .flat_map(|w| w.chunks(per_line));

        let mut line: Vec<(usize, &[RunChar])> = Vec::new();
        let mut filled = 0;
        for word in words {
            let at = if filled == 0 { 0 } else { filled + 1 };
            if filled > 0 && at + word.len() > per_line {
                self.emit_line(&line, &context);
                line.clear();
                line.push((0, word));
                filled = word.len();
            } else {
                line.push((at, word));
                filled = at + word.len();
            }
        }
        if !line.is_empty() {
            self.emit_line(&line, &context);
        }
    }

    fn emit_line(&mut self, line: &[(usize, &[RunChar])], context: &TextContext) {
        let char_width = context.char_width();
        let line_height = context.line_height();
        let (column, top) = self.place(line_height);
        let left = self.column_left(column) + context.indent;
        for &(at, word) in line {
            let mut i = 0;
            while i < word.len() {
                let first = word[i];
                let mut j = i + 1;
                while j < word.len() && word[j].node == first.node {
                    j += 1;
                }
                self.fragments.push(Fragment {
                    node: first.node,
                    start: first.offset,
                    end: word[j - 1].offset + 1,
                    flow_offset: first.flow,
                    column,
                    rect: Rect::new(
                        left + (at + i) as f32 * char_width,
                        top,
                        (j - i) as f32 * char_width,
                        line_height,
                    ),
                    advance: char_width,
                });
                i = j;
            }
        }
    }
}
