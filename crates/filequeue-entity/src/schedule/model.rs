//! Schedule entity model.

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use filequeue_core::types::ScheduleId;

use crate::job::{JobOptions, JobPayload};

/// How often a schedule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Recurrence {
    /// Every `interval` minutes, measured from the last evaluation.
    Minutes {
        /// Interval in minutes.
        interval: u32,
    },
    /// Every day at a time of day.
    Daily {
        /// Local time of day.
        time: NaiveTime,
    },
    /// Every week on a weekday at a time of day.
    Weekly {
        /// Weekday to fire on.
        day: Weekday,
        /// Local time of day.
        time: NaiveTime,
    },
    /// Every month on a day of month (clamped to the month's length).
    Monthly {
        /// Day of month, 1..=31.
        day: u32,
        /// Local time of day.
        time: NaiveTime,
    },
}

impl Recurrence {
    /// The schedule type tag.
    pub fn schedule_type(&self) -> ScheduleType {
        match self {
            Self::Minutes { .. } => ScheduleType::Minutes,
            Self::Daily { .. } => ScheduleType::Daily,
            Self::Weekly { .. } => ScheduleType::Weekly,
            Self::Monthly { .. } => ScheduleType::Monthly,
        }
    }
}

/// Schedule type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    /// Fixed minute interval.
    Minutes,
    /// Once a day.
    Daily,
    /// Once a week.
    Weekly,
    /// Once a month.
    Monthly,
}

impl ScheduleType {
    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minutes => "minutes",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recurrence definition that produces a new job each time it is due.
///
/// Schedules live only in the scheduler's memory; they are not persisted to
/// the job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Schedule identifier.
    pub id: ScheduleId,
    /// Recurrence rule.
    pub recurrence: Recurrence,
    /// Name of the job created on each run.
    pub job_name: String,
    /// Payload copied into each created job.
    pub payload: JobPayload,
    /// Options copied into each created job.
    pub options: JobOptions,
    /// Epoch seconds at registration.
    pub created_at: i64,
    /// Epoch seconds of the next due run.
    pub next_run: i64,
    /// Epoch seconds of the last run, if any.
    pub last_run: Option<i64>,
}

impl Schedule {
    /// The schedule type tag.
    pub fn schedule_type(&self) -> ScheduleType {
        self.recurrence.schedule_type()
    }

    /// Whether the schedule should fire at `now`.
    pub fn is_due(&self, now: i64) -> bool {
        self.next_run <= now
    }
}
