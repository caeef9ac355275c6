//! File storage behaviour shared between processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use filequeue::{
    ErrorKind, Job, JobCache, JobExecutionError, JobId, JobOptions, JobPayload, JobQueue,
    JobStatus, JobStorage,
};

use crate::helpers::{TestQueue, always_fail, echo};

#[tokio::test]
async fn test_cache_eviction_falls_through_to_disk() {
    let t = TestQueue::with_cache(Some(JobCache::new(3))).await;
    let mut jobs = Vec::new();
    for i in 0..4 {
        let job = t
            .queue
            .add(format!("job-{i}"), JobPayload::new(), JobOptions::new())
            .await
            .expect("add");
        jobs.push(job);
    }

    assert_eq!(t.storage.stats().await.expect("stats").cache_size, 3);

    let first = t
        .queue
        .get_job(jobs[0].id())
        .await
        .expect("get")
        .expect("still on disk");
    assert_eq!(first, jobs[0]);
}

#[tokio::test]
async fn test_corrupt_record_does_not_block_the_queue() {
    let t = TestQueue::with_cache(None).await;
    let pending = t.storage.partition_dir(JobStatus::Pending);
    std::fs::write(pending.join("00000000-bad.json"), b"{ truncated").expect("write");

    t.queue
        .add("log", JobPayload::new(), JobOptions::new())
        .await
        .expect("add");

    let done = t.queue.process_next(&echo).await.expect("process");
    assert!(done.is_some());
    assert!(t.queue.process_next(&echo).await.expect("process").is_none());
}

#[tokio::test]
async fn test_get_unknown_job() {
    let t = TestQueue::new().await;
    assert!(t.queue.get_job(&JobId::new()).await.expect("get").is_none());
    let err = t.queue.find_job(&JobId::new()).await.unwrap_err();
    assert_eq!(err.code(), 101);
}

#[tokio::test]
async fn test_delete_removes_record() {
    let t = TestQueue::new().await;
    let job = t
        .queue
        .add("log", JobPayload::new(), JobOptions::new())
        .await
        .expect("add");

    assert!(t.queue.delete(&job).await.expect("delete"));
    assert!(!t.queue.delete(&job).await.expect("delete"));
    assert!(t.queue.get_job(job.id()).await.expect("get").is_none());
    assert_eq!(t.files_in(JobStatus::Pending), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_competing_queues_run_each_job_once() {
    let t = TestQueue::with_cache(None).await;
    let mut expected = Vec::new();
    for _ in 0..20 {
        let job = t
            .queue
            .add("count", JobPayload::new(), JobOptions::new())
            .await
            .expect("add");
        expected.push(*job.id());
    }

    let seen: Arc<Mutex<HashMap<JobId, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    let queues: Vec<Arc<JobQueue>> = vec![Arc::clone(&t.queue), t.sibling().await];

    let mut tasks = Vec::new();
    for queue in queues {
        let seen = Arc::clone(&seen);
        tasks.push(tokio::spawn(async move {
            let handler = move |_payload: JobPayload, job: Job| {
                let seen = Arc::clone(&seen);
                async move {
                    *seen.lock().expect("lock").entry(*job.id()).or_default() += 1;
                    Ok::<Value, JobExecutionError>(json!(null))
                }
            };
            queue.process_jobs(&handler, 0).await.expect("batch")
        }));
    }

    let mut processed = 0;
    for task in tasks {
        let batch = task.await.expect("task");
        assert!(batch.errors.is_empty());
        processed += batch.processed.len();
    }

    assert_eq!(processed, expected.len());
    let seen = seen.lock().expect("lock");
    for id in &expected {
        assert_eq!(seen.get(id), Some(&1), "job {id} ran more than once or never");
    }
    assert_eq!(t.files_in(JobStatus::Completed), expected.len());
    assert_eq!(t.files_in(JobStatus::Processing), 0);
}

#[tokio::test]
async fn test_stale_claim_cannot_rerun_a_requeued_job() {
    let t = TestQueue::with_cache(None).await;
    let job = t
        .queue
        .add("flaky", JobPayload::new(), JobOptions::new().max_attempts(2))
        .await
        .expect("add");

    let other = t.sibling().await;
    let mut stale = other
        .storage()
        .next_pending_job()
        .await
        .expect("next")
        .expect("job");

    let err = t.queue.process_next(&always_fail).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::JobFailed);

    stale.increment_attempts();
    let err = other
        .storage()
        .update_status(&mut stale, JobStatus::Processing)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    let stored = t.queue.find_job(job.id()).await.expect("find");
    assert_eq!(stored.status(), JobStatus::Pending);
    assert_eq!(stored.attempts(), 1);
    assert_eq!(stored.last_error().expect("error detail").code, 7);
    assert_eq!(t.files_in(JobStatus::Pending), 1);
    assert_eq!(t.files_in(JobStatus::Processing), 0);
}
