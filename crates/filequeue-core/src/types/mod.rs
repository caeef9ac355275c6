//! Core type definitions used across the FileQueue workspace.

pub mod id;
pub mod time;

pub use id::*;
pub use time::now_epoch;
