//! The live document tree behind the reading surface.
//!
//! HTML is parsed with html5ever into an [`ArenaDom`]; CSS selector queries
//! run through the `selectors` crate; subtrees serialize back to HTML for
//! citation overlays and exports.
//!
//! # Example
//!
//! ```
//! use folio::dom::{parse_html, select_all};
//!
//! let dom = parse_html("<h1>One</h1><p>Body</p><h2>Two</h2>");
//! let headings = select_all(&dom, dom.document(), "h1, h2").unwrap();
//! assert_eq!(headings.len(), 2);
//! ```

mod arena;
mod select;
mod serialize;
mod tree_sink;

pub use arena::{
    ArenaDom, ArenaNode, ArenaNodeData, ArenaNodeId, Attribute, ChildrenIter, Descendants,
    TextMerge, byte_index,
};
pub use select::{ElementRef, Query, ReaderSelectors, select_all, select_first};
pub use serialize::{escape_html, inner_html, outer_html};

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

use tree_sink::ArenaSink;

/// Parse an HTML document (or fragment) into an arena DOM.
pub fn parse_html(html: &str) -> ArenaDom {
    let sink = ArenaSink::new();
    parse_document(sink, ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
        .into_dom()
}

/// Parse HTML bytes, detecting the encoding from a BOM or XML declaration.
pub fn parse_html_bytes(html: &[u8]) -> ArenaDom {
    let hint_encoding = crate::util::extract_xml_encoding(html);
    let html_str = crate::util::decode_text(html, hint_encoding);
    parse_html(&html_str)
}
