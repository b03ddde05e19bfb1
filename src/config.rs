//! Reader configuration and the small JSON records persisted per document.

use serde::{Deserialize, Serialize};

use crate::schedule::Millis;

/// Tunables of the reading engine.
///
/// The defaults match the desktop reader: a short selection debounce so
/// dragging does not produce intermediate pending highlights, and longer
/// delays for anything that writes to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    /// Quiet period after a selection gesture before it is captured.
    pub selection_delay: Millis,
    /// Delay before the current page is written to storage.
    pub progress_delay: Millis,
    /// Delay before the conversation-thread pointer is updated.
    pub thread_pointer_delay: Millis,
    /// Delay before a drifting scroll offset snaps back to the locked page.
    pub snap_delay: Millis,
    /// How long scroll feedback is ignored after a programmatic jump.
    pub navigation_settle: Millis,
    /// Animation frames a highlight jump waits for its mark to appear.
    pub highlight_jump_frames: u32,
    /// Height given to images without explicit dimensions.
    pub image_height: f32,
    /// Viewport width assumed when the host reports none.
    pub fallback_width: f32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            selection_delay: 150,
            progress_delay: 400,
            thread_pointer_delay: 1000,
            snap_delay: 250,
            navigation_settle: 150,
            highlight_jump_frames: 4,
            image_height: 240.0,
            fallback_width: crate::layout::metrics::DESIRED_PAGE_WIDTH,
        }
    }
}

/// Typography settings, stored as `{fontFamily, lineHeight, margin}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Appearance {
    pub font_family: String,
    pub line_height: f32,
    /// Horizontal page margin in px.
    pub margin: f32,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            font_family: "'EB Garamond', serif".to_string(),
            line_height: 1.65,
            margin: 40.0,
        }
    }
}

/// Saved reading position, stored as `{page}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub page: usize,
}
