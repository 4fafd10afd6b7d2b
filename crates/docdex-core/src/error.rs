//! Error taxonomy shared by the ingestion, search, and feedback paths.
//!
//! Pipeline-internal failures (extraction, embedding) are usually captured
//! onto the document record rather than returned to the caller; see
//! [`crate::ingest`]. Everything surfaced synchronously — search, feedback,
//! record lookups — uses these variants.

use thiserror::Error;

/// Errors produced by the Docdex core pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced document or feedback ID does not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input: empty query, missing required field, illegal
    /// status transition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The file's format is not one the text extractor understands.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The format was recognized but extraction failed partway.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// The embedding provider could not be reached or timed out.
    /// Transient; callers may retry.
    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The metadata store and vector index disagree about a document.
    /// Detected by the reconciliation pass or a partial delete.
    #[error("store and index inconsistent for {id}: {detail}")]
    Inconsistent { id: String, detail: String },

    /// A storage backend failure (database, blob store).
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for failures worth retrying (provider hiccups, backend errors),
    /// false for deterministic rejections.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ProviderUnavailable(_) | Error::Storage(_))
    }
}
