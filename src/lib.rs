//! # folio
//!
//! Pagination and durable highlight anchoring for reflowable ebook documents.
//!
//! ## Features
//!
//! - Horizontal, column-based pagination of one HTML document, in one or two
//!   columns per page, that keeps the reader's place across reflows
//! - Highlights anchored by structural path and character offset, validated
//!   against their text snapshot and re-found by fuzzy search when stale
//! - Transient context snippets and an active quote, drawn as marks
//! - Table of contents from in-document links or headings, footnote
//!   citations, Kindle position links, and block-level CFI pointers
//! - Debounced reading-progress and appearance persistence
//! - Lazy resolution of embedded images through the host
//!
//! ## Quick Start
//!
//! ```
//! use folio::host::{DocumentId, MemoryHost};
//! use folio::layout::Size;
//! use folio::{Reader, ReaderConfig};
//!
//! let mut host: MemoryHost = MemoryHost::default();
//! let body: String = (0..200).map(|i| format!("<p>Paragraph {i} of the book.</p>")).collect();
//! host.documents.insert(DocumentId(7), "A Book", body);
//!
//! let mut reader = Reader::new(host, ReaderConfig::default());
//! reader.open(DocumentId(7), Size::new(1000.0, 616.0)).unwrap();
//! assert!(reader.total_pages() > 1);
//!
//! reader.next_page();
//! assert_eq!(reader.current_page(), 2);
//! ```
//!
//! The host owns the clock: it forwards input with a millisecond timestamp
//! and calls [`Reader::tick`] and [`Reader::animation_frame`] to let
//! debounced and frame-scheduled work run.

pub mod address;
pub mod config;
pub mod content;
pub mod controller;
pub mod dom;
pub mod error;
pub mod highlights;
pub mod host;
pub mod images;
pub mod layout;
pub mod links;
pub mod navigation;
pub mod progress;
pub mod reader;
pub mod schedule;
pub mod search;
pub mod toc;
pub(crate) mod util;

pub use address::{AnchoredRange, DomPosition, LiveRange, StructuralPath};
pub use config::{Appearance, ReaderConfig, ReadingProgress};
pub use controller::{JumpResult, LayoutController, LayoutState, PageContent};
pub use error::{Error, Result};
pub use highlights::{PendingHighlight, Selection};
pub use host::{DocumentId, Highlight, HighlightId, Host, MemoryHost};
pub use layout::{Columns, PageMetrics, Rect, Size};
pub use navigation::Click;
pub use reader::{Reader, ReaderEvent};
pub use search::{SearchScope, find_text_range};
pub use toc::TocEntry;
