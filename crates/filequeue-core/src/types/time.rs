//! Epoch-second timestamps used by job records and schedules.

use chrono::Utc;

/// Current wall-clock time as epoch seconds.
pub fn now_epoch() -> i64 {
    Utc::now().timestamp()
}
