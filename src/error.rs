//! Error types for paperfmt library.

use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestrator::Stage;

/// Result type alias for paperfmt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while processing a manuscript.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The container is not a readable package or a required part is missing.
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// The primary markup part is not well-formed or lacks a required element.
    #[error("Malformed markup: {0}")]
    MalformedMarkup(String),

    /// The requested template is not registered.
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    /// A template failed validation at registration time.
    #[error("Invalid template '{name}': {reason}")]
    InvalidTemplate {
        /// Template name
        name: String,
        /// What failed validation
        reason: String,
    },

    /// An operation was called while the job is in the wrong stage.
    #[error("Cannot {operation} while job is {stage}")]
    InvalidState {
        /// The rejected operation
        operation: &'static str,
        /// The job's current stage
        stage: Stage,
    },

    /// No job exists for the file identifier.
    #[error("Unknown file id: {0}")]
    UnknownFileId(String),

    /// A caller-issued file identifier was already used.
    #[error("File id already used: {0}")]
    DuplicateFileId(String),

    /// The template cannot be expressed in the output markup.
    #[error("Rendering error: {0}")]
    Render(String),

    /// A stage exceeded its time budget.
    #[error("{stage} stage timed out after {elapsed:?}")]
    Timeout {
        /// Stage that was running
        stage: &'static str,
        /// Time spent before giving up
        elapsed: Duration,
    },

    /// The job was cancelled while a stage was running.
    #[error("Job was cancelled")]
    Cancelled,

    /// The orchestrator is draining and accepts no new work.
    #[error("Orchestrator is shutting down")]
    ShuttingDown,

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "io_error",
            Error::CorruptArchive(_) => "corrupt_archive",
            Error::MalformedMarkup(_) => "malformed_markup",
            Error::UnknownTemplate(_) => "unknown_template",
            Error::InvalidTemplate { .. } => "invalid_template",
            Error::InvalidState { .. } => "invalid_state",
            Error::UnknownFileId(_) => "unknown_file_id",
            Error::DuplicateFileId(_) => "duplicate_file_id",
            Error::Render(_) => "render_error",
            Error::Timeout { .. } => "timeout",
            Error::Cancelled => "cancelled",
            Error::ShuttingDown => "shutting_down",
            Error::Json(_) => "json_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// HTTP status a transport layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::CorruptArchive(_) | Error::MalformedMarkup(_) | Error::UnknownTemplate(_) => 400,
            Error::UnknownFileId(_) => 404,
            Error::InvalidState { .. } | Error::DuplicateFileId(_) => 409,
            Error::Render(_) | Error::InvalidTemplate { .. } => 422,
            Error::Timeout { .. } => 504,
            Error::ShuttingDown => 503,
            Error::Cancelled => 410,
            Error::Io(_) | Error::Json(_) | Error::Other(_) => 500,
        }
    }

    /// Whether this error ends the job in the `Failed` stage.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::UnknownTemplate(_)
                | Error::InvalidState { .. }
                | Error::UnknownFileId(_)
                | Error::DuplicateFileId(_)
                | Error::Render(_)
                | Error::ShuttingDown
        )
    }

    /// Response body for transport layers.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
        }
    }
}

/// The `{ error }` response shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
    /// Stable error code
    pub code: String,
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::CorruptArchive(e.to_string()),
            _ => Error::CorruptArchive(err.to_string()),
        }
    }
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Error::MalformedMarkup(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Render(format!("markup serialization failed: {}", err))
    }
}
