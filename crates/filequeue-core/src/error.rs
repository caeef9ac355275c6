//! Unified application error types for FileQueue.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Persisting, reading, or deleting a job record failed.
    Storage,
    /// The requested job does not exist in any partition.
    JobNotFound,
    /// A job was constructed or mutated with invalid data.
    InvalidJob,
    /// No handler is registered for a job's name and no default exists.
    HandlerNotFound,
    /// A handler failed while executing a job.
    JobFailed,
    /// A handler failed on the job's last permitted attempt.
    MaxAttemptsExceeded,
    /// A record was not where the caller expected it (lost claim, concurrent delete).
    Conflict,
    /// Input validation failed (schedule parameters, time strings).
    Validation,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
}

impl ErrorKind {
    /// Numeric code recorded alongside job error details.
    pub fn code(&self) -> i64 {
        match self {
            Self::Storage => 100,
            Self::JobNotFound => 101,
            Self::InvalidJob => 102,
            Self::HandlerNotFound => 200,
            Self::JobFailed => 300,
            Self::MaxAttemptsExceeded => 301,
            Self::Conflict => 400,
            Self::Validation => 401,
            Self::Configuration => 500,
            Self::Serialization => 501,
            Self::Internal => 502,
        }
    }

    /// Whether this kind marks a handler failure that was already recorded on the job.
    pub fn is_job_failure(&self) -> bool {
        matches!(self, Self::JobFailed | Self::MaxAttemptsExceeded)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage => write!(f, "STORAGE"),
            Self::JobNotFound => write!(f, "JOB_NOT_FOUND"),
            Self::InvalidJob => write!(f, "INVALID_JOB"),
            Self::HandlerNotFound => write!(f, "HANDLER_NOT_FOUND"),
            Self::JobFailed => write!(f, "JOB_FAILED"),
            Self::MaxAttemptsExceeded => write!(f, "MAX_ATTEMPTS_EXCEEDED"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified application error used throughout FileQueue.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls. This provides a single error type for
/// every public queue, storage, worker, and scheduler operation.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a job-not-found error.
    pub fn job_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::JobNotFound, message)
    }

    /// Create an invalid-job error.
    pub fn invalid_job(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidJob, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Numeric code of this error's kind.
    pub fn code(&self) -> i64 {
        self.kind.code()
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
