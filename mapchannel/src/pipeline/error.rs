//! Pipeline error types.
//!
//! Failures fall into two classes. Retryable failures (a map server that is
//! busy, a timed-out request) are retried by the channel according to its
//! [`RetryPolicy`](super::RetryPolicy). Everything else is permanent and is
//! surfaced to the receiver immediately. Format mismatches between stages
//! are programming errors and always permanent.

use thiserror::Error;

use crate::geo::GeoError;
use crate::raster::MapAttr;

/// Errors raised while fetching or processing map data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// The source is temporarily unable to serve data.
    #[error("Source '{source_name}' temporarily unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    /// The source failed permanently (bad configuration, missing data).
    #[error("Source '{source_name}' failed: {reason}")]
    SourceFailed { source_name: String, reason: String },

    /// Raster bytes could not be decoded.
    #[error("Failed to decode raster: {0}")]
    Decode(String),

    /// The geographic request is invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] GeoError),

    /// A raster's band layout is not what the consuming stage accepts.
    #[error("Format mismatch at {stage} input {input}: expected one of {expected:?}, got {actual:?}")]
    FormatMismatch {
        stage: String,
        input: usize,
        expected: Vec<MapAttr>,
        actual: Option<MapAttr>,
    },

    /// A stage was called with an input index it does not have.
    #[error("{stage} has no input {index}")]
    InvalidInput { stage: String, index: usize },

    /// A raster does not have the dimensions its request implies.
    #[error("Raster is {actual_width}×{actual_height} but request needs {width}×{height}")]
    RasterSize {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// The pipeline set handed to a channel is inconsistent.
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// A retryable failure persisted past the retry budget.
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<PipelineError>,
    },

    /// The pass was superseded or the channel shut down.
    #[error("Processing pass cancelled")]
    Cancelled,

    /// A background processing task panicked or was aborted.
    #[error("Processing task failed: {0}")]
    TaskFailed(String),
}

impl PipelineError {
    /// Create an [`PipelineError::Unavailable`] error.
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a [`PipelineError::SourceFailed`] error.
    pub fn source_failed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceFailed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// True if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// True if this error means the pass was superseded rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
