//! Worker lifecycle events and their listeners.
//!
//! Listeners are synchronous and run in registration order on the worker's
//! task. A listener error stops the remaining listeners for that event and
//! is returned to the caller.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use filequeue_core::result::AppResult;
use filequeue_entity::job::Job;

use crate::executor::JobExecutionError;
use crate::runner::WorkerStats;

/// Points in the worker lifecycle that listeners can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerEvent {
    /// A claimed job is about to be dispatched.
    BeforeProcessing,
    /// A handler returned successfully.
    OnSuccess,
    /// A handler (or dispatch) failed.
    OnFailure,
    /// The run loop finished.
    OnShutdown,
}

impl WorkerEvent {
    /// Event name as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeProcessing => "before_processing",
            Self::OnSuccess => "on_success",
            Self::OnFailure => "on_failure",
            Self::OnShutdown => "on_shutdown",
        }
    }
}

impl fmt::Display for WorkerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data handed to listeners.
#[derive(Debug, Clone, Copy)]
pub enum WorkerEventPayload<'a> {
    /// Fired before the handler runs.
    BeforeProcessing {
        /// The claimed job.
        job: &'a Job,
    },
    /// Fired after the handler succeeded.
    Success {
        /// The claimed job.
        job: &'a Job,
        /// Value returned by the handler.
        result: &'a Value,
    },
    /// Fired after the handler failed.
    Failure {
        /// The claimed job.
        job: &'a Job,
        /// The handler error.
        error: &'a JobExecutionError,
    },
    /// Fired when the run loop exits.
    Shutdown {
        /// Final run statistics.
        stats: &'a WorkerStats,
    },
}

impl WorkerEventPayload<'_> {
    /// The event this payload belongs to.
    pub fn event(&self) -> WorkerEvent {
        match self {
            Self::BeforeProcessing { .. } => WorkerEvent::BeforeProcessing,
            Self::Success { .. } => WorkerEvent::OnSuccess,
            Self::Failure { .. } => WorkerEvent::OnFailure,
            Self::Shutdown { .. } => WorkerEvent::OnShutdown,
        }
    }

    /// The job involved, for job-scoped events.
    pub fn job(&self) -> Option<&Job> {
        match self {
            Self::BeforeProcessing { job }
            | Self::Success { job, .. }
            | Self::Failure { job, .. } => Some(job),
            Self::Shutdown { .. } => None,
        }
    }
}

/// A registered listener.
pub type EventListener = Box<dyn Fn(&WorkerEventPayload<'_>) -> AppResult<()> + Send + Sync>;

/// Listener registry keyed by event.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<WorkerEvent, Vec<EventListener>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<WorkerEvent, usize> = self
            .listeners
            .iter()
            .map(|(event, listeners)| (*event, listeners.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for an event.
    pub fn on<F>(&mut self, event: WorkerEvent, listener: F)
    where
        F: Fn(&WorkerEventPayload<'_>) -> AppResult<()> + Send + Sync + 'static,
    {
        self.listeners
            .entry(event)
            .or_default()
            .push(Box::new(listener));
    }

    /// Number of listeners registered for an event.
    pub fn listener_count(&self, event: WorkerEvent) -> usize {
        self.listeners.get(&event).map_or(0, Vec::len)
    }

    /// Invoke every listener for the payload's event, in order.
    pub fn emit(&self, payload: &WorkerEventPayload<'_>) -> AppResult<()> {
        let event = payload.event();
        if let Some(listeners) = self.listeners.get(&event) {
            for listener in listeners {
                listener(payload).inspect_err(|e| {
                    tracing::warn!("Listener for '{}' failed: {}", event, e);
                })?;
            }
        }
        Ok(())
    }
}
