//! Scheduler scenarios.

use std::sync::Arc;

use chrono::{TimeZone, Utc, Weekday};
use serde_json::json;

use filequeue::{JobOptions, JobStatus, ScheduleType, Scheduler};

use crate::helpers::{TestQueue, echo, payload};

#[tokio::test]
async fn test_due_schedules_enqueue_jobs() {
    let t = TestQueue::new().await;
    let mut scheduler = Scheduler::new(Arc::clone(&t.queue));

    let report = scheduler
        .daily("00:00", "report", payload(json!({"kind": "daily"})), JobOptions::new())
        .expect("daily");
    let digest = scheduler
        .weekly(Weekday::Mon, "08:30", "digest", payload(json!({})), JobOptions::new())
        .expect("weekly");

    let far_future = Utc.with_ymd_and_hms(2099, 6, 1, 23, 0, 0).single().expect("time");
    let runs = scheduler.run_at(&far_future).await;
    assert_eq!(runs.len(), 2);
    assert_eq!(t.files_in(JobStatus::Pending), 2);

    let report_schedule = scheduler
        .schedules()
        .into_iter()
        .find(|s| s.id == report)
        .expect("report schedule");
    assert_eq!(report_schedule.schedule_type(), ScheduleType::Daily);
    assert_eq!(
        report_schedule.next_run,
        Utc.with_ymd_and_hms(2099, 6, 2, 0, 0, 0).single().expect("time").timestamp()
    );
    assert_eq!(report_schedule.last_run, Some(far_future.timestamp()));

    // 2099-06-01 is a Monday and 08:30 has passed, so next week.
    let digest_schedule = scheduler
        .schedules()
        .into_iter()
        .find(|s| s.id == digest)
        .expect("digest schedule");
    assert_eq!(
        digest_schedule.next_run,
        Utc.with_ymd_and_hms(2099, 6, 8, 8, 30, 0).single().expect("time").timestamp()
    );

    let batch = t.queue.process_jobs(&echo, 0).await.expect("batch");
    assert_eq!(batch.processed.len(), 2);
}

#[tokio::test]
async fn test_cancelled_schedule_never_fires() {
    let t = TestQueue::new().await;
    let mut scheduler = Scheduler::new(Arc::clone(&t.queue));
    let id = scheduler
        .every_minutes(1, "tick", payload(json!({})), JobOptions::new())
        .expect("schedule");
    assert!(scheduler.cancel(&id));

    let later = Utc::now() + chrono::Duration::hours(1);
    assert!(scheduler.run_at(&later).await.is_empty());
    assert_eq!(t.files_in(JobStatus::Pending), 0);
}

#[tokio::test]
async fn test_run_now_fires_nothing_fresh() {
    let t = TestQueue::new().await;
    let mut scheduler = Scheduler::new(Arc::clone(&t.queue));
    scheduler
        .hourly("cleanup", payload(json!({})), JobOptions::new())
        .expect("schedule");
    scheduler
        .every_hours(6, "invoice", payload(json!({})), JobOptions::new())
        .expect("schedule");

    let jobs = scheduler.run().await;
    assert!(jobs.is_empty());
}
