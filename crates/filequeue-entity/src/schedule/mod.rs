//! Recurring schedule definitions.

pub mod model;

pub use model::{Recurrence, Schedule, ScheduleType};
