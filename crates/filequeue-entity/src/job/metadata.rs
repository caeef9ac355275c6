//! Audit metadata attached to a job.
//!
//! The metadata map is open: callers may store anything, but the keys below
//! are written by the queue itself. Only `completed_at` is read back (by
//! cleanup).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open mapping of audit fields.
pub type JobMetadata = Map<String, Value>;

/// Epoch seconds at which the job was constructed.
pub const CREATED_AT: &str = "created_at";
/// Epoch seconds at which the latest attempt was claimed.
pub const PROCESSING_STARTED_AT: &str = "processing_started_at";
/// Epoch seconds at which the job completed.
pub const COMPLETED_AT: &str = "completed_at";
/// Epoch seconds at which the job was parked as failed.
pub const FAILED_AT: &str = "failed_at";
/// Value returned by the handler on success.
pub const RESULT: &str = "result";
/// [`JobErrorDetail`] of the latest failed attempt.
pub const ERROR: &str = "error";
/// Epoch seconds at which a failed job was manually requeued.
pub const RETRIED_AT: &str = "retried_at";

/// Error detail recorded when a handler fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobErrorDetail {
    /// Human-readable failure message.
    pub message: String,
    /// Numeric failure code.
    pub code: i64,
    /// Where the failure was raised (handler, dispatch, listener, ...).
    pub origin: String,
}
