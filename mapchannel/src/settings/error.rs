//! Settings and session error types.

use thiserror::Error;

use crate::pipeline::PipelineError;

/// Errors raised while restoring settings or building a session.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A required property is absent from the property bag.
    #[error("Missing property '{0}'")]
    MissingProperty(String),

    /// A property could not be parsed.
    #[error("Invalid property {key} = '{value}': {reason}")]
    InvalidProperty {
        key: String,
        value: String,
        reason: String,
    },

    /// The session document is not valid JSON for this schema.
    #[error("Invalid session document: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing the session file failed.
    #[error("Session I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Building a source, stage or pipeline failed.
    #[error("Failed to build pipeline: {0}")]
    Pipeline(#[from] PipelineError),
}
