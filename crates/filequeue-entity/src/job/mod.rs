//! Job domain entities.

pub mod metadata;
pub mod model;
pub mod payload;
pub mod status;

pub use metadata::{JobErrorDetail, JobMetadata};
pub use model::{Job, JobOptions};
pub use payload::JobPayload;
pub use status::JobStatus;
