//! Pagination geometry.
//!
//! - [`metrics`]: page width, gap, stride and the page/scroll arithmetic
//! - [`style`]: block styles and the generated reader stylesheet
//! - [`flow`]: the column-flow typesetter
//! - [`surface`]: the live document handle and coordinate translation

pub mod flow;
pub mod geometry;
pub mod metrics;
pub mod style;
pub mod surface;

pub use flow::{FlowLayout, FlowParams, Fragment};
pub use geometry::{Point, Rect, Size};
pub use metrics::{Columns, PageMetrics};
pub use style::{StyleOptions, reader_css};
pub use surface::{Surface, SurfaceFrame};
