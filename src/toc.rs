//! Table of contents and heading lookup.
//!
//! Gutenberg-style books carry their own contents list as a run of
//! `<a href="#...">` links; when at least three usable ones exist they
//! become the TOC, with levels guessed from the label. Otherwise the
//! `h1`-`h6` outline is used. Entries hold live node handles and are only
//! valid for the load that built them.

use crate::dom::{ArenaDom, ArenaNodeId, Query};
use crate::layout::FlowLayout;
use crate::links::find_by_id_or_name;
use crate::util::{collapse_whitespace, normalize_link_text};

const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Elements searched when no heading matches a link label.
const TEXT_CONTAINER_SELECTOR: &str = "p, div, td, li, b, i, span";

/// Minimum anchor entries before the anchor list is preferred.
const MIN_ANCHOR_ENTRIES: usize = 3;

/// A heading counts as "after" a link only past this horizontal slack.
const AFTER_REFERENCE_SLACK: f32 = 12.0;

/// Titles that open a whole work inside a collected edition.
const WORK_TITLES: &[&str] = &[
    "ALL’S",
    "AS YOU",
    "MUCH ADO",
    "A MIDSUMMER",
    "TWELFTH NIGHT",
    "THE TAMING",
    "THE TEMPEST",
    "THE WINTER’S",
    "THE TWO NOBLE",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// `toc-<n>`, unique within one build.
    pub id: String,
    /// 1 is outermost.
    pub level: u8,
    pub text: String,
    pub element: ArenaNodeId,
}

/// Build the TOC for the content beneath `root`.
pub fn build_toc(dom: &ArenaDom, root: ArenaNodeId) -> Vec<TocEntry> {
    let from_anchors = toc_from_anchors(dom, root);
    if from_anchors.len() >= MIN_ANCHOR_ENTRIES {
        return from_anchors;
    }
    toc_from_headings(dom, root)
}

/// One entry per distinct in-document link whose target exists.
pub fn toc_from_anchors(dom: &ArenaDom, root: ArenaNodeId) -> Vec<TocEntry> {
    let Ok(query) = Query::parse(r##"a[href^="#"]"##) else {
        return Vec::new();
    };
    let mut seen: Vec<String> = Vec::new();
    let mut entries = Vec::new();

    for anchor in query.select_all(dom, root) {
        let href = dom.get_attr(anchor, "href").unwrap_or_default();
        let text = collapse_whitespace(&dom.deep_text(anchor));
        if href.is_empty() || href == "#" || text.is_empty() || seen.iter().any(|h| h == href) {
            continue;
        }
        let Some(target) = find_by_id_or_name(dom, &href[1..]) else {
            continue;
        };
        seen.push(href.to_string());
        entries.push(TocEntry {
            id: format!("toc-{}", entries.len()),
            level: anchor_level(&text),
            text,
            element: target,
        });
    }
    entries
}

/// Every non-empty heading, level taken from the tag.
pub fn toc_from_headings(dom: &ArenaDom, root: ArenaNodeId) -> Vec<TocEntry> {
    dom.elements_by_tag(root, HEADING_TAGS)
        .into_iter()
        .filter_map(|heading| {
            let text = dom.deep_text(heading).trim().to_string();
            let lower = text.to_lowercase();
            if text.is_empty() || lower == "original" || lower == "original transcription" {
                return None;
            }
            let level = dom
                .element_name(heading)
                .and_then(|name| name.chars().nth(1))
                .and_then(|c| c.to_digit(10))
                .map_or(1, |d| d as u8);
            Some((level, text, heading))
        })
        .enumerate()
        .map(|(i, (level, text, element))| TocEntry {
            id: format!("toc-{i}"),
            level,
            text,
            element,
        })
        .collect()
}

/// Guess a nesting level from a contents-link label.
pub fn anchor_level(label: &str) -> u8 {
    let upper = collapse_whitespace(&label.to_uppercase());
    let without_article = upper.strip_prefix("THE ").unwrap_or(&upper);

    let major = upper.strip_prefix("BOOK").is_some_and(|rest| rest.starts_with(' '))
        || without_article == "SONNETS"
        || ["TRAGEDY", "PLAY", "COMEDY", "HISTORY", "POEM", "LIFE"]
            .iter()
            .any(|kind| starts_with_word(without_article, &format!("{kind} OF")))
        || WORK_TITLES.iter().any(|title| starts_with_word(&upper, title));
    if major {
        return 1;
    }

    let division = ["CHAPTER", "PART", "ACT"]
        .iter()
        .any(|kind| upper.strip_prefix(kind).is_some_and(|rest| rest.starts_with(' ')));
    if division { 2 } else { 3 }
}

/// `text` starts with `prefix` followed by a word boundary.
fn starts_with_word(text: &str, prefix: &str) -> bool {
    text.strip_prefix(prefix).is_some_and(|rest| {
        rest.chars()
            .next()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
    })
}

/// Normalized heading texts, built once per load on first use.
#[derive(Debug, Clone, Default)]
pub struct HeadingIndex {
    entries: Vec<(String, ArenaNodeId)>,
}

impl HeadingIndex {
    pub fn build(dom: &ArenaDom, root: ArenaNodeId) -> Self {
        let entries = dom
            .elements_by_tag(root, HEADING_TAGS)
            .into_iter()
            .map(|el| (normalize_link_text(&dom.deep_text(el)), el))
            .filter(|(norm, _)| !norm.is_empty())
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the element a link label refers to.
    ///
    /// Exact heading matches win over headings that contain (or are
    /// contained in) the label; failing both, paragraph-like elements whose
    /// text contains the label are considered. Among candidates the first one
    /// positioned after `reference` is chosen, else the earliest.
    pub fn find(
        &self,
        dom: &ArenaDom,
        root: ArenaNodeId,
        layout: Option<&FlowLayout>,
        text: &str,
        reference: Option<ArenaNodeId>,
    ) -> Option<ArenaNodeId> {
        let target = normalize_link_text(text);
        if target.is_empty() {
            return None;
        }

        let exact: Vec<ArenaNodeId> = self
            .entries
            .iter()
            .filter(|(norm, _)| *norm == target)
            .map(|&(_, el)| el)
            .collect();
        let mut candidates = if exact.is_empty() {
            self.entries
                .iter()
                .filter(|(norm, _)| norm.contains(&target) || target.contains(norm.as_str()))
                .map(|&(_, el)| el)
                .collect()
        } else {
            exact
        };

        if candidates.is_empty()
            && let Ok(query) = Query::parse(TEXT_CONTAINER_SELECTOR)
        {
            candidates = query
                .select_all(dom, root)
                .into_iter()
                .filter(|&el| normalize_link_text(&dom.deep_text(el)).contains(&target))
                .collect();
        }

        choose_after_reference(&candidates, layout, reference)
    }
}

fn choose_after_reference(
    candidates: &[ArenaNodeId],
    layout: Option<&FlowLayout>,
    reference: Option<ArenaNodeId>,
) -> Option<ArenaNodeId> {
    let first = *candidates.first()?;
    let Some(layout) = layout else {
        return Some(first);
    };

    let mut placed: Vec<(f32, ArenaNodeId)> = candidates
        .iter()
        .filter_map(|&el| layout.element_rect(el).map(|rect| (rect.x, el)))
        .collect();
    if placed.is_empty() {
        return Some(first);
    }
    placed.sort_by(|a, b| a.0.total_cmp(&b.0));

    if let Some(ref_x) = reference.and_then(|r| layout.element_rect(r)).map(|rect| rect.x)
        && let Some(&(_, el)) = placed.iter().find(|(x, _)| *x > ref_x + AFTER_REFERENCE_SLACK)
    {
        return Some(el);
    }
    Some(placed[0].1)
}
