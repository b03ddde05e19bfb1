//! Error types for folio operations.

use thiserror::Error;

/// Errors surfaced to the host.
///
/// Reflow, selection and navigation never produce these; they degrade to
/// no-ops instead. Only collaborator calls (storage, document source) and
/// malformed input parsing are reported.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("document source error: {0}")]
    DocumentSource(String),

    #[error("inline resource {index} of document {document} failed: {reason}")]
    InlineResource {
        document: i64,
        index: u32,
        reason: String,
    },

    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("no document is loaded")]
    NotLoaded,

    #[error("unknown highlight: {0}")]
    UnknownHighlight(i64),
}

pub type Result<T> = std::result::Result<T, Error>;
