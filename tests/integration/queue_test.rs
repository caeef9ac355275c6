//! Queue lifecycle scenarios.

use std::time::Duration;

use serde_json::json;

use filequeue::{CleanupThreshold, ErrorKind, JobOptions, JobPayload, JobStatus, JobStorage};

use crate::helpers::{TestQueue, always_fail, echo, payload};

#[tokio::test]
async fn test_added_job_is_processed_and_completed() {
    let t = TestQueue::new().await;
    let job = t
        .queue
        .add("log", payload(json!({"message": "hi"})), JobOptions::new())
        .await
        .expect("add");
    assert_eq!(t.files_in(JobStatus::Pending), 1);

    let done = t
        .queue
        .process_next(&echo)
        .await
        .expect("process")
        .expect("a job");

    assert_eq!(done.id(), job.id());
    assert_eq!(done.status(), JobStatus::Completed);
    assert_eq!(done.result(), Some(&json!({"message": "hi"})));
    assert!(done.completed_at().is_some());
    assert_eq!(t.files_in(JobStatus::Pending), 0);
    assert_eq!(t.files_in(JobStatus::Completed), 1);

    let stored = t.queue.find_job(job.id()).await.expect("find");
    assert_eq!(stored.status(), JobStatus::Completed);
    assert_eq!(stored.attempts(), 1);
}

#[tokio::test]
async fn test_delayed_job_waits_for_its_time() {
    let t = TestQueue::new().await;
    t.queue
        .later("email", JobPayload::new(), 2, JobOptions::new())
        .await
        .expect("later");

    assert!(t.queue.process_next(&echo).await.expect("process").is_none());

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    let done = t.queue.process_next(&echo).await.expect("process");
    assert!(done.is_some());
}

#[tokio::test]
async fn test_failing_job_retries_then_parks_as_failed() {
    let t = TestQueue::new().await;
    let job = t
        .queue
        .add("flaky", JobPayload::new(), JobOptions::new().max_attempts(2))
        .await
        .expect("add");

    let err = t.queue.process_next(&always_fail).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::JobFailed);
    let stored = t.queue.find_job(job.id()).await.expect("find");
    assert_eq!(stored.status(), JobStatus::Pending);
    assert_eq!(stored.attempts(), 1);

    let err = t.queue.process_next(&always_fail).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::MaxAttemptsExceeded);
    let stored = t.queue.find_job(job.id()).await.expect("find");
    assert_eq!(stored.status(), JobStatus::Failed);
    assert_eq!(stored.attempts(), 2);
    let detail = stored.last_error().expect("error detail");
    assert_eq!(detail.message, "always fails");
    assert_eq!(detail.code, 7);

    assert!(t.queue.process_next(&always_fail).await.expect("process").is_none());
    assert_eq!(t.files_in(JobStatus::Failed), 1);

    let retried = t.queue.retry(job.id()).await.expect("retry");
    assert_eq!(retried.status(), JobStatus::Pending);
    assert_eq!(retried.attempts(), 0);
    assert!(t.queue.process_next(&echo).await.expect("process").is_some());
}

#[tokio::test]
async fn test_cleanup_is_idempotent() {
    let t = TestQueue::new().await;
    for i in 0..3 {
        t.queue
            .add(format!("job-{i}"), JobPayload::new(), JobOptions::new())
            .await
            .expect("add");
    }
    let batch = t.queue.process_jobs(&echo, 0).await.expect("batch");
    assert_eq!(batch.processed.len(), 3);

    // Everything completed before a cutoff one hour in the future.
    let cutoff = chrono::Utc::now().timestamp() + 3600;
    let removed = t
        .queue
        .cleanup(CleanupThreshold::from_raw(cutoff))
        .await
        .expect("cleanup");
    assert_eq!(removed, 3);

    let removed = t
        .queue
        .cleanup(CleanupThreshold::from_raw(cutoff))
        .await
        .expect("cleanup");
    assert_eq!(removed, 0);
    assert_eq!(t.queue.stats().await.expect("stats").total, 0);
}

#[tokio::test]
async fn test_cleanup_expired_keeps_recent_jobs() {
    let t = TestQueue::new().await;
    t.queue
        .add("log", JobPayload::new(), JobOptions::new())
        .await
        .expect("add");
    t.queue.process_next(&echo).await.expect("process");

    assert_eq!(t.queue.cleanup_expired().await.expect("cleanup"), 0);
    assert_eq!(t.files_in(JobStatus::Completed), 1);
}

#[tokio::test]
async fn test_process_jobs_with_count_stops_at_first_failure() {
    let t = TestQueue::new().await;
    for _ in 0..3 {
        t.queue
            .add("flaky", JobPayload::new(), JobOptions::new().max_attempts(1))
            .await
            .expect("add");
    }

    let batch = t.queue.process_jobs(&always_fail, 3).await.expect("batch");
    assert!(batch.processed.is_empty());
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(t.files_in(JobStatus::Pending), 2);

    let batch = t.queue.process_jobs(&always_fail, 0).await.expect("batch");
    assert_eq!(batch.errors.len(), 2);
    assert_eq!(t.queue.failed_jobs().await.expect("failed").len(), 3);
}

#[tokio::test]
async fn test_queue_from_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = filequeue::AppConfig::default();
    config.storage.root_path = dir.path().join("jobs").to_string_lossy().into_owned();
    config.queue.default_max_attempts = 4;

    let queue = filequeue::JobQueue::from_config(&config).await.expect("queue");
    let job = queue
        .add("log", JobPayload::new(), JobOptions::new())
        .await
        .expect("add");
    assert_eq!(job.max_attempts(), 4);
    assert_eq!(queue.storage().provider_type(), "file");
    assert!(dir.path().join("jobs").join("pending").join(format!("{}.json", job.id())).is_file());
}
