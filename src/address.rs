//! Structural addressing of text positions.
//!
//! A [`StructuralPath`] names a node by the child indices walked from a fixed
//! root. Paths survive any reflow (pagination never adds or removes nodes)
//! but not tree-shape edits, so highlights are always addressed against the
//! mark-free tree and re-resolved from the live tree on every render.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::dom::{ArenaDom, ArenaNodeId, TextMerge};
use crate::error::Result;
use crate::util::ultra_normalize;

/// Child-index sequence from a root to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuralPath(pub Vec<usize>);

impl StructuralPath {
    /// The empty path, addressing the root itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// JSON array form (`[0,3,1]`), as stored in highlight rows.
    pub fn to_json(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        format!("[{}]", parts.join(","))
    }

    /// Parse the JSON array form.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

impl From<Vec<usize>> for StructuralPath {
    fn from(v: Vec<usize>) -> Self {
        Self(v)
    }
}

/// Compute the path from `root` to `node`. `None` when `node` is not `root`
/// or one of its descendants.
pub fn locate(dom: &ArenaDom, root: ArenaNodeId, node: ArenaNodeId) -> Option<StructuralPath> {
    let mut path = Vec::new();
    let mut current = node;
    while current != root {
        let index = dom.child_index(current)?;
        path.push(index);
        current = dom.parent(current)?;
    }
    path.reverse();
    Some(StructuralPath(path))
}

/// Walk `path` down from `root`. `None` as soon as an index is out of range.
pub fn resolve(dom: &ArenaDom, root: ArenaNodeId, path: &StructuralPath) -> Option<ArenaNodeId> {
    dom.get(root)?;
    path.0
        .iter()
        .try_fold(root, |current, &index| dom.child_at(current, index))
}

/// A point in the live tree: a text node and a character offset into it, or
/// an element and a child index (as reported by a host selection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomPosition {
    pub node: ArenaNodeId,
    pub offset: usize,
}

impl DomPosition {
    pub fn new(node: ArenaNodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A live range between two text positions, start before end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRange {
    pub start: DomPosition,
    pub end: DomPosition,
}

impl LiveRange {
    pub fn new(start: DomPosition, end: DomPosition) -> Self {
        Self { start, end }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Text covered by the range.
    pub fn text(&self, dom: &ArenaDom) -> String {
        let mut out = String::new();
        for (node, from, to) in self.segments(dom) {
            if let Some(text) = dom.text_content(node) {
                out.extend(text.chars().skip(from).take(to - from));
            }
        }
        out
    }

    /// The `(text node, start, end)` character spans covered by the range, in
    /// document order. Empty spans are omitted.
    pub fn segments(&self, dom: &ArenaDom) -> Vec<(ArenaNodeId, usize, usize)> {
        let mut out = Vec::new();
        let top = dom.document();
        let mut current = Some(self.start.node);
        while let Some(node) = current {
            if let Some(text) = dom.text_content(node) {
                let len = text.chars().count();
                let from = if node == self.start.node {
                    self.start.offset.min(len)
                } else {
                    0
                };
                let to = if node == self.end.node {
                    self.end.offset.min(len)
                } else {
                    len
                };
                if to > from {
                    out.push((node, from, to));
                }
            }
            if node == self.end.node {
                break;
            }
            current = dom.next_in_order(node, top);
        }
        out
    }
}

/// A reflow-stable description of a selected span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchoredRange {
    pub start_path: StructuralPath,
    pub start_offset: usize,
    pub end_path: StructuralPath,
    pub end_offset: usize,
    pub text: String,
}

impl AnchoredRange {
    /// Address a live range relative to `root`. The tree must be free of
    /// highlight marks. Returns `None` when either end lies outside `root`.
    pub fn capture(dom: &ArenaDom, root: ArenaNodeId, range: &LiveRange) -> Option<Self> {
        Some(Self {
            start_path: locate(dom, root, range.start.node)?,
            start_offset: range.start.offset,
            end_path: locate(dom, root, range.end.node)?,
            end_offset: range.end.offset,
            text: range.text(dom),
        })
    }

    /// Resolve the structural address against the current tree.
    ///
    /// Both ends must land on text nodes with in-range offsets, in order,
    /// and the covered text must still match the snapshot (ignoring
    /// whitespace and punctuation). Any failure means the address is stale
    /// and the caller should fall back to text search.
    pub fn resolve(&self, dom: &ArenaDom, root: ArenaNodeId) -> Option<LiveRange> {
        let start = resolve(dom, root, &self.start_path)?;
        let end = resolve(dom, root, &self.end_path)?;
        if !dom.is_text(start) || !dom.is_text(end) {
            return None;
        }
        if self.start_offset > dom.text_len(start) || self.end_offset > dom.text_len(end) {
            return None;
        }
        let range = LiveRange::new(
            DomPosition::new(start, self.start_offset),
            DomPosition::new(end, self.end_offset),
        );
        if compare_positions(dom, &range.start, &range.end) == Ordering::Greater {
            return None;
        }
        if ultra_normalize(&range.text(dom)) != ultra_normalize(&self.text) {
            return None;
        }
        Some(range)
    }
}

/// Order two positions in document order.
pub fn compare_positions(dom: &ArenaDom, a: &DomPosition, b: &DomPosition) -> Ordering {
    if a.node == b.node {
        return a.offset.cmp(&b.offset);
    }
    let top = dom.document();
    let pa = locate(dom, top, a.node);
    let pb = locate(dom, top, b.node);
    match (pa, pb) {
        (Some(pa), Some(pb)) => pa.cmp(&pb),
        _ => Ordering::Equal,
    }
}

/// Normalize a selection boundary to a text position.
///
/// Element positions (`offset` = child index) move to the nearest text node:
/// forward for a range start, backward for a range end. Text offsets are
/// clamped to the node length.
pub fn normalize_boundary(dom: &ArenaDom, pos: DomPosition, is_start: bool) -> Option<DomPosition> {
    if dom.is_text(pos.node) {
        return Some(DomPosition::new(pos.node, pos.offset.min(dom.text_len(pos.node))));
    }
    let top = dom.document();
    if is_start {
        let mut current = match dom.child_at(pos.node, pos.offset) {
            Some(child) => Some(child),
            None => dom.next_skipping_children(pos.node, top),
        };
        while let Some(node) = current {
            if dom.is_text(node) {
                return Some(DomPosition::new(node, 0));
            }
            current = dom.next_in_order(node, top);
        }
        None
    } else {
        // Last text node strictly before child `offset` of the element.
        let boundary = dom
            .child_at(pos.node, pos.offset)
            .or_else(|| dom.next_skipping_children(pos.node, top));
        dom.descendants(top)
            .take_while(|&n| Some(n) != boundary)
            .filter(|&n| dom.is_text(n))
            .last()
            .map(|n| DomPosition::new(n, dom.text_len(n)))
    }
}

/// Shrink a range so it neither starts nor ends on whitespace.
pub fn trim_range(dom: &ArenaDom, range: LiveRange) -> Option<LiveRange> {
    let segments = range.segments(dom);
    let mut chars: Vec<(ArenaNodeId, usize, char)> = Vec::new();
    for (node, from, to) in segments {
        if let Some(text) = dom.text_content(node) {
            for (i, c) in text.chars().enumerate().skip(from).take(to - from) {
                chars.push((node, i, c));
            }
        }
    }
    let first = chars.iter().position(|(_, _, c)| !c.is_whitespace())?;
    let last = chars.iter().rposition(|(_, _, c)| !c.is_whitespace())?;
    let (start_node, start_offset, _) = chars[first];
    let (end_node, end_offset, _) = chars[last];
    Some(LiveRange::new(
        DomPosition::new(start_node, start_offset),
        DomPosition::new(end_node, end_offset + 1),
    ))
}

/// Translate a position through text merges performed by
/// [`ArenaDom::normalize`].
pub fn remap_position(pos: DomPosition, merges: &[TextMerge]) -> DomPosition {
    let mut pos = pos;
    for merge in merges {
        if merge.from == pos.node {
            pos = DomPosition::new(merge.into, merge.shift + pos.offset);
        }
    }
    pos
}
