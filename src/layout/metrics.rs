//! Pagination metrics: the single source of truth for "where is page N".
//!
//! Pages are columns of a horizontally scrolling multi-column box. Each
//! column is `page_width` wide and columns are `gap` apart, so the column
//! stride is `page_width + gap`. In two-column mode a spread of two columns
//! is one logical page and one scroll unit.

use serde::{Deserialize, Serialize};

use super::geometry::Rect;

/// Widest a single page column is allowed to grow.
pub const DESIRED_PAGE_WIDTH: f32 = 750.0;
/// Gap between the two columns of a spread.
pub const TWO_COLUMN_GAP: f32 = 80.0;
/// Vertical padding of the content root.
pub const ROOT_PADDING_TOP: f32 = 52.0;
pub const ROOT_PADDING_BOTTOM: f32 = 64.0;

/// Sub-pixel slack when mapping scroll offsets to pages.
const SCROLL_EPSILON: f32 = 0.5;

/// Number of visible columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Columns {
    #[default]
    One,
    Two,
}

impl Columns {
    pub fn count(self) -> usize {
        match self {
            Columns::One => 1,
            Columns::Two => 2,
        }
    }
}

impl TryFrom<u8> for Columns {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Columns::One),
            2 => Ok(Columns::Two),
            other => Err(format!("unsupported column count {other}")),
        }
    }
}

impl From<Columns> for u8 {
    fn from(columns: Columns) -> u8 {
        columns.count() as u8
    }
}

/// Gap between adjacent columns.
pub fn compute_page_gap(columns: Columns) -> f32 {
    match columns {
        Columns::One => 0.0,
        Columns::Two => TWO_COLUMN_GAP,
    }
}

/// Preferred width of the reading container: the desired page width per
/// column, the gap between the two columns of a spread, and a margin on
/// each side.
pub fn compute_reader_width(columns: Columns, margin: f32, gap: f32) -> f32 {
    match columns {
        Columns::One => DESIRED_PAGE_WIDTH + margin * 2.0,
        Columns::Two => DESIRED_PAGE_WIDTH * 2.0 + gap + margin * 2.0,
    }
}

/// Column width that fits `viewport_width`, capped at the desired width.
pub fn compute_page_width(viewport_width: f32, columns: Columns, gap: f32) -> f32 {
    let count = columns.count() as f32;
    let available = viewport_width - gap * (count - 1.0);
    (available / count).clamp(0.0, DESIRED_PAGE_WIDTH)
}

/// Width of the visible column box.
pub fn compute_container_width(page_width: f32, columns: Columns, gap: f32) -> f32 {
    let count = columns.count() as f32;
    page_width * count + gap * (count - 1.0)
}

/// Height available to a column inside a viewport.
pub fn compute_column_height(viewport_height: f32) -> f32 {
    (viewport_height - ROOT_PADDING_TOP - ROOT_PADDING_BOTTOM).max(1.0)
}

/// Logical page count for a number of laid-out columns.
pub fn compute_total_pages(columns_used: usize, columns: Columns) -> usize {
    columns_used.div_ceil(columns.count()).max(1)
}

/// 1-based page shown at a scroll offset, before clamping.
pub fn compute_page_from_scroll(scroll_left: f32, scroll_unit: f32) -> usize {
    if scroll_unit <= 0.0 {
        return 1;
    }
    ((scroll_left.max(0.0) + SCROLL_EPSILON) / scroll_unit).floor() as usize + 1
}

/// Scroll offset that shows `page`.
pub fn compute_scroll_target(page: usize, scroll_unit: f32) -> f32 {
    (page.saturating_sub(1) as f32 * scroll_unit).max(0.0)
}

/// Cached geometry of the paginated surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetrics {
    pub page_width: f32,
    pub gap: f32,
    pub stride: f32,
    pub scroll_left: f32,
    /// Visible column box in surface coordinates.
    pub root_rect: Rect,
    pub columns: Columns,
}

impl Default for PageMetrics {
    fn default() -> Self {
        Self::fallback()
    }
}

impl PageMetrics {
    /// Build metrics from layout parameters.
    pub fn new(page_width: f32, gap: f32, scroll_left: f32, root_rect: Rect, columns: Columns) -> Self {
        Self {
            page_width,
            gap,
            stride: page_width + gap,
            scroll_left,
            root_rect,
            columns,
        }
    }

    /// Zeroed metrics handed out before the surface has ever loaded.
    pub fn fallback() -> Self {
        Self::new(0.0, 0.0, 0.0, Rect::default(), Columns::One)
    }

    /// False for fallback metrics.
    pub fn is_determinate(&self) -> bool {
        self.stride > 0.0
    }

    /// Horizontal distance between consecutive logical pages.
    pub fn scroll_unit(&self) -> f32 {
        self.stride * self.columns.count() as f32
    }

    /// Page at the cached scroll offset.
    pub fn current_page(&self) -> usize {
        compute_page_from_scroll(self.scroll_left, self.scroll_unit())
    }

    /// Page containing a horizontal content offset.
    pub fn page_for_offset(&self, offset_x: f32) -> usize {
        if self.scroll_unit() <= 0.0 {
            return 1;
        }
        (offset_x.max(0.0) / self.scroll_unit()).floor() as usize + 1
    }

    /// Scroll offset that brings `page` into view.
    pub fn scroll_target(&self, page: usize) -> f32 {
        compute_scroll_target(page, self.scroll_unit())
    }

    /// Visible content-space range `[start, end)` of a page.
    pub fn page_span(&self, page: usize) -> (f32, f32) {
        let start = self.scroll_target(page);
        (start, start + self.scroll_unit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_gap_and_reader_width() {
        assert_eq!(compute_page_gap(Columns::One), 0.0);
        assert_eq!(compute_page_gap(Columns::Two), 80.0);
        assert_eq!(compute_reader_width(Columns::One, 40.0, 0.0), 830.0);
        assert_eq!(compute_reader_width(Columns::Two, 40.0, 80.0), 1660.0);
    }

    #[test]
    fn test_page_width_caps_at_desired() {
        assert_eq!(compute_page_width(2000.0, Columns::One, 0.0), 750.0);
        assert_eq!(compute_page_width(600.0, Columns::One, 0.0), 600.0);
        assert_eq!(compute_page_width(1280.0, Columns::Two, 80.0), 600.0);
        assert_eq!(compute_container_width(600.0, Columns::Two, 80.0), 1280.0);
    }

    #[test]
    fn test_scroll_to_page_round_trip() {
        let metrics = PageMetrics::new(800.0, 0.0, 1600.0, Rect::default(), Columns::One);
        assert_eq!(metrics.stride, 800.0);
        assert_eq!(metrics.current_page(), 3);
        assert_eq!(metrics.scroll_target(3), 1600.0);
    }

    #[test]
    fn test_two_columns_treat_a_spread_as_one_page() {
        let metrics = PageMetrics::new(600.0, 80.0, 0.0, Rect::default(), Columns::Two);
        assert_eq!(metrics.scroll_unit(), 1360.0);
        assert_eq!(metrics.page_for_offset(700.0), 1);
        assert_eq!(metrics.page_for_offset(1400.0), 2);
        assert_eq!(compute_total_pages(5, Columns::Two), 3);
    }

    #[test]
    fn test_fallback_is_indeterminate() {
        let metrics = PageMetrics::fallback();
        assert!(!metrics.is_determinate());
        assert_eq!(metrics.current_page(), 1);
        assert_eq!(metrics.page_for_offset(5000.0), 1);
    }

    #[test]
    fn test_columns_serde() {
        assert_eq!(serde_json::to_string(&Columns::Two).unwrap(), "2");
        assert_eq!(serde_json::from_str::<Columns>("1").unwrap(), Columns::One);
        assert!(serde_json::from_str::<Columns>("3").is_err());
    }

    proptest! {
        #[test]
        fn prop_scroll_target_maps_back_to_page(
            page in 1usize..500,
            page_width in 200.0f32..750.0,
            two in any::<bool>(),
        ) {
            let columns = if two { Columns::Two } else { Columns::One };
            let gap = compute_page_gap(columns);
            let mut metrics = PageMetrics::new(page_width, gap, 0.0, Rect::default(), columns);
            metrics.scroll_left = metrics.scroll_target(page);
            prop_assert_eq!(metrics.current_page(), page);
        }

        #[test]
        fn prop_total_pages_covers_every_column(used in 0usize..1000, two in any::<bool>()) {
            let columns = if two { Columns::Two } else { Columns::One };
            let pages = compute_total_pages(used, columns);
            prop_assert!(pages >= 1);
            prop_assert!(pages * columns.count() >= used);
            prop_assert!(used == 0 || (pages - 1) * columns.count() < used);
        }
    }
}
