//! Navigation targets: block CFIs, link clicks and highlight jumps.
//!
//! Nothing here scrolls. Each resolver turns an input (a CFI string, a
//! clicked node, a highlight id) into a target element or an action, and the
//! reader hands targets to the layout controller.

use crate::address::{StructuralPath, resolve};
use crate::config::ReaderConfig;
use crate::dom::{ArenaDom, ArenaNodeId, Query, inner_html};
use crate::host::HighlightId;
use crate::layout::FlowLayout;
use crate::links::{
    Link, clean_footnote_content, decode_fragment, find_by_id_or_name, find_footnote_target,
    footnote_fragment, is_footnote_link,
};
use crate::search::{SearchScope, block_element, find_text_range};
use crate::toc::HeadingIndex;

/// Block CFI for a `data-block-index`: `epubcfi(/6/2!/4/<2n>)`.
pub fn make_block_cfi(block_index: usize) -> String {
    format!("epubcfi(/6/2!/4/{})", block_index * 2)
}

/// Block index encoded in a CFI by [`make_block_cfi`]: the first `/4/<n>`
/// step, halved.
pub fn parse_cfi_block_index(cfi: &str) -> Option<usize> {
    cfi.match_indices("/4/").find_map(|(at, step)| {
        let digits: String = cfi[at + step.len()..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse::<usize>().ok().map(|n| n / 2)
    })
}

/// Element addressed by a CFI.
///
/// Block CFIs resolve through `data-block-index`; a JSON structural path
/// (`[0,4,1]`) resolves from `root`, a text node standing for its parent.
pub fn resolve_cfi(dom: &ArenaDom, root: ArenaNodeId, cfi: &str) -> Option<ArenaNodeId> {
    if let Some(element) = parse_cfi_block_index(cfi).and_then(|i| block_element(dom, root, i)) {
        return Some(element);
    }
    let path = StructuralPath::from_json(cfi).ok()?;
    let node = resolve(dom, root, &path)?;
    if dom.is_text(node) {
        dom.parent(node)
    } else {
        Some(node)
    }
}

/// Element holding the first character of a quote.
pub fn quote_element(
    dom: &ArenaDom,
    root: ArenaNodeId,
    text: &str,
    block_index: Option<usize>,
) -> Option<ArenaNodeId> {
    let scope = SearchScope {
        block_index,
        occurrence: 0,
    };
    let range = find_text_range(dom, root, text, scope)?;
    dom.parent(range.start.node)
}

/// A click as the host reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Click {
    pub target: ArenaNodeId,
    /// Main button.
    pub primary: bool,
    /// Any of meta, ctrl, shift or alt held.
    pub modified: bool,
}

impl Click {
    /// Plain primary-button click.
    pub fn on(target: ArenaNodeId) -> Self {
        Self {
            target,
            primary: true,
            modified: false,
        }
    }
}

/// What to do with a clicked link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Show footnote content in a popover next to `anchor`.
    Citation { content: String, anchor: ArenaNodeId },
    /// Navigate to an element of this document.
    Jump(ArenaNodeId),
    /// An internal link whose target is missing; consume the click.
    Swallow,
    /// Leave to the host.
    External(String),
    /// Not a link click at all.
    Ignore,
}

/// One step of a pending highlight jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpStep {
    /// The mark exists; jump to it.
    Jump(ArenaNodeId),
    /// Try again next frame, re-rendering marks first when `render` is set.
    Retry { render: bool },
    GiveUp,
}

#[derive(Debug, Clone, Copy)]
struct HighlightJump {
    id: HighlightId,
    attempts: u32,
}

/// Per-load navigation state: the lazily built heading index and the
/// pending highlight jump.
#[derive(Debug)]
pub struct Navigator {
    headings: Option<HeadingIndex>,
    jump: Option<HighlightJump>,
    max_retries: u32,
}

impl Navigator {
    pub fn new(config: &ReaderConfig) -> Self {
        Self {
            headings: None,
            jump: None,
            max_retries: config.highlight_jump_frames,
        }
    }

    /// Drop the heading index and any pending jump.
    pub fn reset(&mut self) {
        self.headings = None;
        self.jump = None;
    }

    /// Heading index for the current load, built on first use.
    pub fn headings(&mut self, dom: &ArenaDom, root: ArenaNodeId) -> &HeadingIndex {
        self.headings.get_or_insert_with(|| {
            let index = HeadingIndex::build(dom, root);
            log::debug!("indexed {} headings", index.len());
            index
        })
    }

    /// Decide what a click on a link does.
    ///
    /// Footnote references open a citation when their note can be found.
    /// Kindle position links go to their `data-fid` element, else to a
    /// heading matching the link text. Fragment links jump to the element
    /// with that id or name, and are consumed even when it is missing.
    pub fn resolve_link(
        &mut self,
        dom: &ArenaDom,
        root: ArenaNodeId,
        layout: Option<&FlowLayout>,
        click: Click,
    ) -> LinkAction {
        if !click.primary || click.modified {
            return LinkAction::Ignore;
        }
        let Some(anchor) = dom.closest_tag(click.target, "a") else {
            return LinkAction::Ignore;
        };
        let href = dom.get_attr(anchor, "href").unwrap_or_default();
        let anchor_id = dom.element_id(anchor).unwrap_or_default();
        let class = dom.get_attr(anchor, "class").unwrap_or_default();

        let footnote = is_footnote_link(href, anchor_id, class);
        let raw = footnote_fragment(href, anchor_id);

        if footnote && !raw.is_empty() {
            let target = decode_fragment(&raw);
            if let Some(note) = find_footnote_target(dom, &target) {
                return LinkAction::Citation {
                    content: clean_footnote_content(&inner_html(dom, note)),
                    anchor,
                };
            }
            log::debug!("footnote target {target} not found");
        }

        let link = Link::parse(href);
        if href.to_ascii_lowercase().starts_with("kindle:pos:") {
            let fid = match link {
                Link::KindlePosition { fid, .. } => fid,
                _ => None,
            };
            if let Some(element) = fid.and_then(|fid| fid_element(dom, fid)) {
                return LinkAction::Jump(element);
            }
            let text = dom.deep_text(anchor);
            if let Some(heading) = self
                .headings(dom, root)
                .find(dom, root, layout, &text, Some(anchor))
            {
                return LinkAction::Jump(heading);
            }
            if !footnote {
                return LinkAction::Swallow;
            }
        }

        if let Link::External(url) = link {
            return LinkAction::External(url);
        }
        if raw.is_empty() {
            return LinkAction::Ignore;
        }
        match find_by_id_or_name(dom, &decode_fragment(&raw)) {
            Some(target) => LinkAction::Jump(target),
            None => LinkAction::Swallow,
        }
    }

    /// Start jumping to a highlight's mark, replacing any pending jump.
    pub fn begin_highlight_jump(&mut self, id: HighlightId) {
        self.jump = Some(HighlightJump { id, attempts: 0 });
    }

    pub fn pending_highlight_jump(&self) -> Option<HighlightId> {
        self.jump.map(|j| j.id)
    }

    /// Advance the pending jump given whether its mark is in the tree now.
    ///
    /// The first miss asks for one re-render; later misses just wait a frame,
    /// up to the configured number of retries.
    pub fn step_highlight_jump(&mut self, mark: Option<ArenaNodeId>) -> Option<JumpStep> {
        let jump = self.jump.as_mut()?;
        if let Some(mark) = mark {
            self.jump = None;
            return Some(JumpStep::Jump(mark));
        }
        if jump.attempts >= self.max_retries {
            log::warn!("highlight {} has no mark; giving up", jump.id);
            self.jump = None;
            return Some(JumpStep::GiveUp);
        }
        let render = jump.attempts == 0;
        jump.attempts += 1;
        Some(JumpStep::Retry { render })
    }
}

fn fid_element(dom: &ArenaDom, fid: u32) -> Option<ArenaNodeId> {
    let query = Query::parse(&format!(r#"[data-fid="{fid}"]"#)).ok()?;
    query.select_first(dom, dom.document())
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

    fn click_link(nav: &mut Navigator, dom: &ArenaDom, root: ArenaNodeId, id: &str) -> LinkAction {
        let anchor = dom.get_by_id(id).unwrap();
        let target = dom.children(anchor).next().unwrap_or(anchor);
        nav.resolve_link(dom, root, None, Click::on(target))
    }

    #[test]
    fn test_block_cfi_round_trip() {
        assert_eq!(make_block_cfi(0), "epubcfi(/6/2!/4/0)");
        assert_eq!(make_block_cfi(12), "epubcfi(/6/2!/4/24)");
        assert_eq!(parse_cfi_block_index("epubcfi(/6/2!/4/24)"), Some(12));
        assert_eq!(parse_cfi_block_index("epubcfi(/6/2!/4/7/2:3)"), Some(3));
        assert_eq!(parse_cfi_block_index("[0,1]"), None);
        assert_eq!(parse_cfi_block_index("epubcfi(/6/2!/4/)"), None);
    }

    #[test]
    fn test_resolve_cfi_block_and_path() {
        let html = r#"<div id="reader-root"><p data-block-index="0">zero</p><p data-block-index="1">one <b>bold</b></p></div>"#;
        let (dom, root) = setup(html);
        let ps = dom.elements_by_tag(root, &["p"]);
        assert_eq!(resolve_cfi(&dom, root, &make_block_cfi(1)), Some(ps[1]));
        assert_eq!(resolve_cfi(&dom, root, "[1,0]"), Some(ps[1]));
        let b = dom.find_by_tag("b").unwrap();
        assert_eq!(resolve_cfi(&dom, root, "[1,1]"), Some(b));
        assert_eq!(resolve_cfi(&dom, root, "[9]"), None);
        assert_eq!(resolve_cfi(&dom, root, "not a cfi"), None);
    }

    #[test]
    fn test_quote_element() {
        let html = r#"<div id="reader-root"><p data-block-index="0">same words</p><p data-block-index="1">same <i>words</i></p></div>"#;
        let (dom, root) = setup(html);
        let ps = dom.elements_by_tag(root, &["p"]);
        assert_eq!(quote_element(&dom, root, "same words", None), Some(ps[0]));
        assert_eq!(quote_element(&dom, root, "same words", Some(1)), Some(ps[1]));
        assert_eq!(quote_element(&dom, root, "absent", None), None);
    }

    #[test]
    fn test_footnote_link_opens_citation() {
        let html = r##"<div id="reader-root">
            <p>Text<a id="fnref1" href="#fn1">[1]</a></p>
            <p id="fn1"><a href="#fnref1">↩</a>[1] The note itself.</p></div>"##;
        let (dom, root) = setup(html);
        let mut nav = Navigator::new(&ReaderConfig::default());
        let action = click_link(&mut nav, &dom, root, "fnref1");
        let anchor = dom.get_by_id("fnref1").unwrap();
        assert_eq!(
            action,
            LinkAction::Citation {
                content: "The note itself.".to_string(),
                anchor
            }
        );
    }

    #[test]
    fn test_fragment_links_jump_or_swallow() {
        let html = r##"<div id="reader-root"><a id="l1" href="#ch%202">Go</a><a id="l2" href="#gone">Nowhere</a>
            <a id="l3" href="https://example.org/#top">Out</a><a id="l4" href="notes.html">Plain</a>
            <h2 id="ch 2">Two</h2></div>"##;
        let (dom, root) = setup(html);
        let mut nav = Navigator::new(&ReaderConfig::default());
        let h2 = dom.find_by_tag("h2").unwrap();
        assert_eq!(click_link(&mut nav, &dom, root, "l1"), LinkAction::Jump(h2));
        assert_eq!(click_link(&mut nav, &dom, root, "l2"), LinkAction::Swallow);
        assert_eq!(
            click_link(&mut nav, &dom, root, "l3"),
            LinkAction::External("https://example.org/#top".to_string())
        );
        assert_eq!(click_link(&mut nav, &dom, root, "l4"), LinkAction::Ignore);

        let l1 = dom.get_by_id("l1").unwrap();
        let modified = Click {
            target: l1,
            primary: true,
            modified: true,
        };
        assert_eq!(nav.resolve_link(&dom, root, None, modified), LinkAction::Ignore);
        assert_eq!(nav.resolve_link(&dom, root, None, Click::on(root)), LinkAction::Ignore);
    }

    #[test]
    fn test_kindle_position_links() {
        let html = r#"<div id="reader-root" data-fid="1">
            <a id="k1" href="kindle:pos:fid:000B:off:0000000000">Eleven</a>
            <a id="k2" href="kindle:pos:fid:0099:off:0000000000">Chapter Two</a>
            <a id="k3" href="kindle:pos:fid:0099:off:0000000000">Missing</a>
            <div data-fid="11">target</div><h2>CHAPTER TWO</h2></div>"#;
        let (dom, root) = setup(html);
        let mut nav = Navigator::new(&ReaderConfig::default());
        let fid = Query::parse(r#"[data-fid="11"]"#).unwrap().select_first(&dom, root).unwrap();
        assert_eq!(click_link(&mut nav, &dom, root, "k1"), LinkAction::Jump(fid));
        let h2 = dom.find_by_tag("h2").unwrap();
        assert_eq!(click_link(&mut nav, &dom, root, "k2"), LinkAction::Jump(h2));
        assert_eq!(click_link(&mut nav, &dom, root, "k3"), LinkAction::Swallow);
    }

    #[test]
    fn test_highlight_jump_retries() {
        let mut nav = Navigator::new(&ReaderConfig::default());
        assert_eq!(nav.step_highlight_jump(None), None);

        nav.begin_highlight_jump(HighlightId(3));
        assert_eq!(nav.step_highlight_jump(None), Some(JumpStep::Retry { render: true }));
        for _ in 0..3 {
            assert_eq!(nav.step_highlight_jump(None), Some(JumpStep::Retry { render: false }));
        }
        assert_eq!(nav.step_highlight_jump(None), Some(JumpStep::GiveUp));
        assert_eq!(nav.pending_highlight_jump(), None);

        nav.begin_highlight_jump(HighlightId(4));
        let mark = ArenaNodeId(5);
        assert_eq!(nav.step_highlight_jump(Some(mark)), Some(JumpStep::Jump(mark)));
        assert_eq!(nav.pending_highlight_jump(), None);
    }
}
