//! End-to-end scenarios against the file-backed queue.

mod helpers;

mod queue_test;
mod scheduler_test;
mod storage_test;
mod worker_test;
