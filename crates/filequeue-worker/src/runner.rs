//! Worker: main loop that polls the queue and executes jobs.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing;

use filequeue_core::config::worker::WorkerConfig;
use filequeue_core::result::AppResult;
use filequeue_entity::job::{Job, JobPayload};

use crate::events::{EventBus, WorkerEvent, WorkerEventPayload};
use crate::executor::{JobExecutionError, JobExecutor, JobHandler};
use crate::queue::JobQueue;

/// Growth of the idle sleep under adaptive polling, as a ratio (x1.5).
const BACKOFF_GROWTH: (u32, u32) = (3, 2);

/// Empty polls tolerated before the idle sleep starts growing.
const BACKOFF_AFTER_EMPTY_POLLS: u32 = 2;

/// Idle sleep between polls that found nothing.
///
/// With adaptive polling the sleep grows by [`BACKOFF_GROWTH`] once more
/// than [`BACKOFF_AFTER_EMPTY_POLLS`] polls in a row came back empty, up to
/// the ceiling. A completed job resets it to the base interval.
#[derive(Debug, Clone, Copy, PartialEq)]
struct IdleBackoff {
    base: Duration,
    current: Duration,
    max: Duration,
    adaptive: bool,
    consecutive_empty: u32,
}

impl IdleBackoff {
    fn new(base: Duration, adaptive: bool, max: Duration) -> Self {
        Self {
            base,
            current: base,
            max,
            adaptive,
            consecutive_empty: 0,
        }
    }

    fn current(&self) -> Duration {
        self.current
    }

    /// Record an empty poll and return how long to sleep.
    fn on_empty_poll(&mut self) -> Duration {
        self.consecutive_empty += 1;
        if self.adaptive && self.consecutive_empty > BACKOFF_AFTER_EMPTY_POLLS {
            let (num, den) = BACKOFF_GROWTH;
            self.current = (self.current * num / den).min(self.max);
        }
        self.current
    }

    fn reset(&mut self) {
        self.current = self.base;
        self.consecutive_empty = 0;
    }
}

/// Counters kept across a worker's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Jobs that reached a handler outcome.
    pub jobs_processed: u64,
    /// Jobs whose handler succeeded.
    pub jobs_successful: u64,
    /// Jobs whose handler (or dispatch) failed.
    pub jobs_failed: u64,
    /// When the latest run started.
    pub start_time: Option<DateTime<Utc>>,
    /// When the latest run ended.
    pub end_time: Option<DateTime<Utc>>,
}

/// Polls a queue and dispatches claimed jobs to registered handlers.
#[derive(Debug)]
pub struct Worker {
    /// Queue to poll.
    queue: Arc<JobQueue>,
    /// Handler registry.
    executor: JobExecutor,
    /// Lifecycle listeners.
    events: EventBus,
    /// Base idle sleep.
    sleep_time: Duration,
    /// Whether the idle sleep grows after repeated empty polls.
    adaptive_polling: bool,
    /// Ceiling for the adaptive idle sleep.
    max_sleep_time: Duration,
    /// Lifetime counters.
    stats: Mutex<WorkerStats>,
}

impl Worker {
    /// Create a worker with default polling settings.
    pub fn new(queue: Arc<JobQueue>) -> Self {
        Self::with_config(queue, &WorkerConfig::default())
    }

    /// Create a worker with polling settings from configuration.
    pub fn with_config(queue: Arc<JobQueue>, config: &WorkerConfig) -> Self {
        Self {
            queue,
            executor: JobExecutor::new(),
            events: EventBus::new(),
            sleep_time: Duration::from_millis(config.poll_interval_ms),
            adaptive_polling: config.adaptive_polling,
            max_sleep_time: Duration::from_millis(config.max_poll_interval_ms),
            stats: Mutex::new(WorkerStats::default()),
        }
    }

    /// The queue this worker polls.
    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Register a handler for a job name.
    pub fn register_handler(
        &mut self,
        name: impl Into<String>,
        handler: impl JobHandler + 'static,
    ) -> &mut Self {
        self.executor.register(name, handler);
        self
    }

    /// Register the handler used when no named handler matches.
    pub fn register_default_handler(&mut self, handler: impl JobHandler + 'static) -> &mut Self {
        self.executor.register_default(handler);
        self
    }

    /// Append a lifecycle listener.
    pub fn on<F>(&mut self, event: WorkerEvent, listener: F) -> &mut Self
    where
        F: Fn(&WorkerEventPayload<'_>) -> AppResult<()> + Send + Sync + 'static,
    {
        self.events.on(event, listener);
        self
    }

    /// Base idle sleep between empty polls.
    pub fn set_sleep_time(&mut self, sleep_time: Duration) -> &mut Self {
        self.sleep_time = sleep_time;
        self
    }

    /// Enable or disable adaptive polling with the given ceiling.
    pub fn set_adaptive_polling(&mut self, enabled: bool, max_sleep_time: Duration) -> &mut Self {
        self.adaptive_polling = enabled;
        self.max_sleep_time = max_sleep_time;
        self
    }

    /// Snapshot of the lifetime counters.
    pub fn stats(&self) -> WorkerStats {
        self.lock_stats().clone()
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, WorkerStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_outcome(&self, success: bool) {
        let mut stats = self.lock_stats();
        stats.jobs_processed += 1;
        if success {
            stats.jobs_successful += 1;
        } else {
            stats.jobs_failed += 1;
        }
    }

    /// Run one job through its handler and fire the lifecycle events.
    ///
    /// Does not touch the job's status; settling it is the queue's job.
    pub async fn process_job(&self, job: &Job) -> Result<Value, JobExecutionError> {
        self.events
            .emit(&WorkerEventPayload::BeforeProcessing { job })
            .map_err(JobExecutionError::Listener)?;

        let outcome = match self.executor.execute(job.payload(), job).await {
            Ok(result) => {
                let emitted = self
                    .events
                    .emit(&WorkerEventPayload::Success { job, result: &result });
                emitted
                    .map(|()| result)
                    .map_err(JobExecutionError::Listener)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                self.record_outcome(true);
                Ok(result)
            }
            Err(error) => {
                self.record_outcome(false);
                self.events
                    .emit(&WorkerEventPayload::Failure { job, error: &error })
                    .map_err(JobExecutionError::Listener)?;
                Err(error)
            }
        }
    }

    /// Poll until `job_limit` jobs completed (`0` = unlimited) or
    /// `timeout` elapsed (`None` = no timeout). Failed jobs do not count
    /// toward the limit.
    pub async fn run(&self, job_limit: usize, timeout: Option<Duration>) -> AppResult<WorkerStats> {
        let (_shutdown, signal) = watch::channel(false);
        self.run_until(job_limit, timeout, signal).await
    }

    /// Like [`Worker::run`], but also stops when `shutdown` turns `true`.
    ///
    /// The signal is checked between jobs and interrupts idle sleeps; a job
    /// already running is finished first.
    pub async fn run_until(
        &self,
        job_limit: usize,
        timeout: Option<Duration>,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<WorkerStats> {
        let deadline = timeout.map(|t| Instant::now() + t);
        self.lock_stats().start_time = Some(Utc::now());

        tracing::info!(
            "Worker started: job_limit={}, timeout={:?}, poll_interval={:?}, adaptive={}",
            job_limit,
            timeout,
            self.sleep_time,
            self.adaptive_polling
        );

        let mut completed = 0usize;
        let mut backoff =
            IdleBackoff::new(self.sleep_time, self.adaptive_polling, self.max_sleep_time);

        loop {
            if job_limit > 0 && completed >= job_limit {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            if *shutdown.borrow() {
                tracing::info!("Worker received shutdown signal");
                break;
            }

            match self.queue.process_next(self).await {
                Ok(Some(job)) => {
                    completed += 1;
                    backoff.reset();
                    tracing::debug!("Worker finished job {}", job.id());
                }
                Ok(None) => {
                    let sleep = backoff.on_empty_poll();
                    self.idle(sleep, deadline, &mut shutdown).await;
                }
                Err(e) if e.kind.is_job_failure() => {
                    tracing::debug!("Worker continuing after job failure: {}", e);
                }
                Err(e) => {
                    tracing::error!("Failed to poll queue: {}", e);
                    self.idle(backoff.current(), deadline, &mut shutdown).await;
                }
            }
        }

        let stats = {
            let mut stats = self.lock_stats();
            stats.end_time = Some(Utc::now());
            stats.clone()
        };

        tracing::info!(
            "Worker stopped: processed={}, successful={}, failed={}",
            stats.jobs_processed,
            stats.jobs_successful,
            stats.jobs_failed
        );

        self.events
            .emit(&WorkerEventPayload::Shutdown { stats: &stats })?;
        Ok(stats)
    }

    /// Sleep for `duration`, cut short by the deadline or a shutdown signal.
    async fn idle(
        &self,
        duration: Duration,
        deadline: Option<Instant>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        let until = match deadline {
            Some(deadline) => deadline.min(Instant::now() + duration),
            None => Instant::now() + duration,
        };

        tokio::select! {
            _ = time::sleep_until(until) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    time::sleep_until(until).await;
                }
            }
        }
    }
}

#[async_trait]
impl JobHandler for Worker {
    async fn execute(&self, _payload: &JobPayload, job: &Job) -> Result<Value, JobExecutionError> {
        self.process_job(job).await
    }
}
