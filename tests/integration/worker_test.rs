//! Worker run loop scenarios.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use filequeue::{
    Job, JobExecutionError, JobOptions, JobPayload, JobStatus, JobStorage, Worker, WorkerEvent,
};

use crate::helpers::{TestQueue, payload};

#[tokio::test]
async fn test_worker_runs_registered_handlers_until_limit() {
    let t = TestQueue::new().await;
    for n in 1..=3 {
        t.queue
            .add("square", payload(json!({ "n": n })), JobOptions::new())
            .await
            .expect("add");
    }

    let mut worker = Worker::new(Arc::clone(&t.queue));
    worker
        .set_sleep_time(Duration::from_millis(10))
        .register_handler("square", |payload: JobPayload, _job: Job| async move {
            let n = payload.get("n").and_then(Value::as_i64).unwrap_or(0);
            Ok::<_, JobExecutionError>(json!(n * n))
        });

    let stats = worker.run(3, None).await.expect("run");
    assert_eq!(stats.jobs_processed, 3);
    assert_eq!(stats.jobs_successful, 3);
    assert_eq!(stats.jobs_failed, 0);

    let mut results: Vec<i64> = t
        .storage
        .jobs_by_status(JobStatus::Completed, None)
        .await
        .expect("completed")
        .iter()
        .filter_map(|job| job.result().and_then(Value::as_i64))
        .collect();
    results.sort();
    assert_eq!(results, vec![1, 4, 9]);
}

#[tokio::test]
async fn test_unregistered_job_fails_with_handler_not_found() {
    let t = TestQueue::new().await;
    let job = t
        .queue
        .add("unknown", JobPayload::new(), JobOptions::new().max_attempts(1))
        .await
        .expect("add");

    let failures = Arc::new(Mutex::new(Vec::new()));
    let mut worker = Worker::new(Arc::clone(&t.queue));
    let sink = Arc::clone(&failures);
    worker
        .set_sleep_time(Duration::from_millis(10))
        .on(WorkerEvent::OnFailure, move |event| {
            if let filequeue::WorkerEventPayload::Failure { error, .. } = event {
                sink.lock().expect("lock").push(error.to_string());
            }
            Ok(())
        });

    let stats = worker
        .run(1, Some(Duration::from_millis(300)))
        .await
        .expect("run");
    assert_eq!(stats.jobs_failed, 1);
    assert_eq!(stats.jobs_successful, 0);
    assert_eq!(
        *failures.lock().expect("lock"),
        vec!["No handler registered for job type 'unknown'".to_string()]
    );

    let stored = t.queue.find_job(job.id()).await.expect("find");
    assert_eq!(stored.status(), JobStatus::Failed);
    assert_eq!(stored.last_error().expect("detail").code, 200);
}

#[tokio::test]
async fn test_default_handler_catches_everything() {
    let t = TestQueue::new().await;
    t.queue
        .add("anything", JobPayload::new(), JobOptions::new())
        .await
        .expect("add");

    let mut worker = Worker::new(Arc::clone(&t.queue));
    worker
        .set_sleep_time(Duration::from_millis(10))
        .register_default_handler(|_payload: JobPayload, job: Job| async move {
            Ok::<_, JobExecutionError>(json!({ "handled": job.name() }))
        });

    let stats = worker.run(1, None).await.expect("run");
    assert_eq!(stats.jobs_successful, 1);
    assert_eq!(t.files_in(JobStatus::Completed), 1);
}

#[tokio::test]
async fn test_worker_stops_on_timeout_and_reports_shutdown() {
    let t = TestQueue::new().await;
    let shutdown_stats = Arc::new(Mutex::new(None));

    let mut worker = Worker::new(Arc::clone(&t.queue));
    let sink = Arc::clone(&shutdown_stats);
    worker
        .set_sleep_time(Duration::from_millis(20))
        .set_adaptive_polling(true, Duration::from_millis(50))
        .on(WorkerEvent::OnShutdown, move |event| {
            if let filequeue::WorkerEventPayload::Shutdown { stats } = event {
                *sink.lock().expect("lock") = Some((*stats).clone());
            }
            Ok(())
        });

    let stats = worker
        .run(0, Some(Duration::from_millis(300)))
        .await
        .expect("run");
    assert_eq!(stats.jobs_processed, 0);
    assert!(stats.end_time >= stats.start_time);
    assert_eq!(shutdown_stats.lock().expect("lock").clone(), Some(stats));
}
