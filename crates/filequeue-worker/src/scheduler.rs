//! Recurring scheduler: turns recurrence rules into queued jobs.
//!
//! Schedules live in memory only. Each call to [`Scheduler::run`] enqueues
//! one job per due schedule and recomputes its next run from the time of
//! the call, so late evaluations shift later runs rather than catching up.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Weekday};
use tokio::sync::watch;
use tokio::time;
use tracing;

use filequeue_core::config::scheduler::SchedulerConfig;
use filequeue_core::error::AppError;
use filequeue_core::result::AppResult;
use filequeue_core::types::ScheduleId;
use filequeue_entity::job::{Job, JobOptions, JobPayload};
use filequeue_entity::schedule::{Recurrence, Schedule};

use crate::queue::JobQueue;
use crate::recurrence;

/// A job enqueued by a schedule.
#[derive(Debug, Clone)]
pub struct ScheduledRun {
    /// The schedule that fired.
    pub schedule_id: ScheduleId,
    /// The job it enqueued.
    pub job: Job,
}

/// In-memory registry of recurring schedules.
#[derive(Debug)]
pub struct Scheduler {
    /// Queue receiving the generated jobs.
    queue: Arc<JobQueue>,
    /// Registered schedules.
    schedules: HashMap<ScheduleId, Schedule>,
    /// Interval of the [`Scheduler::start`] loop.
    tick: Duration,
}

impl Scheduler {
    /// Create a scheduler with the default tick.
    pub fn new(queue: Arc<JobQueue>) -> Self {
        Self::with_config(queue, &SchedulerConfig::default())
    }

    /// Create a scheduler with settings from configuration.
    pub fn with_config(queue: Arc<JobQueue>, config: &SchedulerConfig) -> Self {
        Self {
            queue,
            schedules: HashMap::new(),
            tick: Duration::from_secs(config.tick_seconds.max(1)),
        }
    }

    /// Enqueue a one-off job for an absolute epoch second.
    pub async fn at(
        &self,
        timestamp: i64,
        name: impl Into<String>,
        payload: JobPayload,
        options: JobOptions,
    ) -> AppResult<Job> {
        self.queue.later_at(name, payload, timestamp, options).await
    }

    /// Every `minutes` minutes.
    pub fn every_minutes(
        &mut self,
        minutes: u32,
        name: impl Into<String>,
        payload: JobPayload,
        options: JobOptions,
    ) -> AppResult<ScheduleId> {
        self.register(Recurrence::Minutes { interval: minutes }, name, payload, options)
    }

    /// Every `hours` hours.
    pub fn every_hours(
        &mut self,
        hours: u32,
        name: impl Into<String>,
        payload: JobPayload,
        options: JobOptions,
    ) -> AppResult<ScheduleId> {
        let minutes = hours
            .checked_mul(60)
            .ok_or_else(|| AppError::validation(format!("Interval of {hours} hours is too large")))?;
        self.every_minutes(minutes, name, payload, options)
    }

    /// Once an hour.
    pub fn hourly(
        &mut self,
        name: impl Into<String>,
        payload: JobPayload,
        options: JobOptions,
    ) -> AppResult<ScheduleId> {
        self.every_minutes(60, name, payload, options)
    }

    /// Every day at `time` (`HH:MM`, local time).
    pub fn daily(
        &mut self,
        time: &str,
        name: impl Into<String>,
        payload: JobPayload,
        options: JobOptions,
    ) -> AppResult<ScheduleId> {
        let time = recurrence::parse_time(time)?;
        self.register(Recurrence::Daily { time }, name, payload, options)
    }

    /// Every week on `day` at `time` (`HH:MM`, local time).
    pub fn weekly(
        &mut self,
        day: Weekday,
        time: &str,
        name: impl Into<String>,
        payload: JobPayload,
        options: JobOptions,
    ) -> AppResult<ScheduleId> {
        let time = recurrence::parse_time(time)?;
        self.register(Recurrence::Weekly { day, time }, name, payload, options)
    }

    /// Like [`Scheduler::weekly`], with the day numbered `0 = Sunday` to `6 = Saturday`.
    pub fn weekly_on(
        &mut self,
        day: u8,
        time: &str,
        name: impl Into<String>,
        payload: JobPayload,
        options: JobOptions,
    ) -> AppResult<ScheduleId> {
        let day = recurrence::weekday_from_sunday(day)?;
        self.weekly(day, time, name, payload, options)
    }

    /// Every month on `day` (clamped to the month's length) at `time`.
    pub fn monthly(
        &mut self,
        day: u32,
        time: &str,
        name: impl Into<String>,
        payload: JobPayload,
        options: JobOptions,
    ) -> AppResult<ScheduleId> {
        let time = recurrence::parse_time(time)?;
        self.register(Recurrence::Monthly { day, time }, name, payload, options)
    }

    fn register(
        &mut self,
        rule: Recurrence,
        name: impl Into<String>,
        payload: JobPayload,
        options: JobOptions,
    ) -> AppResult<ScheduleId> {
        let job_name = name.into();
        if job_name.trim().is_empty() {
            return Err(AppError::validation("Scheduled job name must not be empty"));
        }

        let now = Local::now();
        let next_run = recurrence::next_run(&rule, &now)?.timestamp();
        let schedule = Schedule {
            id: ScheduleId::new(),
            recurrence: rule,
            job_name,
            payload,
            options,
            created_at: now.timestamp(),
            next_run,
            last_run: None,
        };

        tracing::info!(
            "Registered schedule {}: type={}, job='{}', next_run={}",
            schedule.id,
            schedule.schedule_type(),
            schedule.job_name,
            schedule.next_run
        );

        let id = schedule.id;
        self.schedules.insert(id, schedule);
        Ok(id)
    }

    /// Remove a schedule. Returns `false` if it did not exist.
    pub fn cancel(&mut self, id: &ScheduleId) -> bool {
        let removed = self.schedules.remove(id).is_some();
        if removed {
            tracing::info!("Cancelled schedule {}", id);
        }
        removed
    }

    /// Look up one schedule.
    pub fn get(&self, id: &ScheduleId) -> Option<&Schedule> {
        self.schedules.get(id)
    }

    /// All schedules, soonest first.
    pub fn schedules(&self) -> Vec<Schedule> {
        let mut schedules: Vec<Schedule> = self.schedules.values().cloned().collect();
        schedules.sort_by_key(|s| (s.next_run, s.id));
        schedules
    }

    /// Enqueue a job for every schedule that is due now.
    pub async fn run(&mut self) -> Vec<ScheduledRun> {
        self.run_at(&Local::now()).await
    }

    /// Enqueue a job for every schedule due at `now`.
    ///
    /// A schedule whose job cannot be enqueued stays due and is retried on
    /// the next evaluation; the other schedules are unaffected.
    pub async fn run_at<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Vec<ScheduledRun> {
        let now_ts = now.timestamp();
        let mut due: Vec<(i64, ScheduleId)> = self
            .schedules
            .values()
            .filter(|s| s.is_due(now_ts))
            .map(|s| (s.next_run, s.id))
            .collect();
        due.sort();

        let mut runs = Vec::with_capacity(due.len());
        for (_, id) in due {
            let Some(schedule) = self.schedules.get(&id) else {
                continue;
            };
            let (rule, job_name, payload, options) = (
                schedule.recurrence,
                schedule.job_name.clone(),
                schedule.payload.clone(),
                schedule.options.clone(),
            );

            let job = match self.queue.add(job_name, payload, options).await {
                Ok(job) => job,
                Err(e) => {
                    tracing::error!("Failed to enqueue job for schedule {}: {}", id, e);
                    continue;
                }
            };

            let next_run = match next_run_after(&rule, now) {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!("Failed to compute next run for schedule {}: {}", id, e);
                    continue;
                }
            };

            if let Some(schedule) = self.schedules.get_mut(&id) {
                schedule.next_run = next_run;
                schedule.last_run = Some(now_ts);
            }

            tracing::debug!("Schedule {} enqueued job {}, next_run={}", id, job.id(), next_run);
            runs.push(ScheduledRun {
                schedule_id: id,
                job,
            });
        }

        runs
    }

    /// Evaluate schedules every tick until `shutdown` turns `true`.
    pub async fn start(&mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Scheduler started: tick={:?}, schedules={}",
            self.tick,
            self.schedules.len()
        );

        let mut ticker = time::interval(self.tick);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let runs = self.run().await;
                    if !runs.is_empty() {
                        tracing::info!("Scheduler enqueued {} jobs", runs.len());
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Scheduler shut down");
    }
}

/// Next run strictly after `now`, in epoch seconds.
///
/// A rule whose target time equals `now` would otherwise be due again on
/// the next evaluation.
fn next_run_after<Tz: TimeZone>(rule: &Recurrence, now: &DateTime<Tz>) -> AppResult<i64> {
    let next = recurrence::next_run(rule, now)?;
    if next.timestamp() > now.timestamp() {
        return Ok(next.timestamp());
    }
    let after = now.clone() + chrono::Duration::seconds(1);
    Ok(recurrence::next_run(rule, &after)?.timestamp())
}
