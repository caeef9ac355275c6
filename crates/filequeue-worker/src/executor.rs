//! Job executor: dispatches jobs to registered handlers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing;

use filequeue_core::error::{AppError, ErrorKind};
use filequeue_entity::job::{Job, JobErrorDetail, JobPayload};

/// Trait for job handler implementations.
///
/// Any `Fn(JobPayload, Job) -> impl Future<Output = Result<Value, JobExecutionError>>`
/// closure is a handler, so most callers never implement this directly.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Execute the job with the given payload.
    async fn execute(&self, payload: &JobPayload, job: &Job) -> Result<Value, JobExecutionError>;
}

#[async_trait]
impl<F, Fut> JobHandler for F
where
    F: Fn(JobPayload, Job) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, JobExecutionError>> + Send + 'static,
{
    async fn execute(&self, payload: &JobPayload, job: &Job) -> Result<Value, JobExecutionError> {
        (self)(payload.clone(), job.clone()).await
    }
}

/// Error from job execution.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// The handler reported a failure.
    #[error("{message}")]
    Failed {
        /// Failure message.
        message: String,
        /// Handler-defined failure code.
        code: i64,
    },

    /// No handler matched the job's name and no default is registered.
    #[error("No handler registered for job type '{0}'")]
    HandlerNotFound(String),

    /// An event listener failed while the job was running.
    #[error("Event listener failed: {0}")]
    Listener(#[source] AppError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// Handler failure with code 0.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            code: 0,
        }
    }

    /// Handler failure with an explicit code.
    pub fn with_code(message: impl Into<String>, code: i64) -> Self {
        Self::Failed {
            message: message.into(),
            code,
        }
    }

    /// Numeric code recorded on the job.
    pub fn code(&self) -> i64 {
        match self {
            Self::Failed { code, .. } => *code,
            Self::HandlerNotFound(_) => ErrorKind::HandlerNotFound.code(),
            Self::Listener(err) | Self::Internal(err) => err.code(),
        }
    }

    /// Where the failure was raised.
    pub fn origin(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "handler",
            Self::HandlerNotFound(_) => "dispatch",
            Self::Listener(_) => "listener",
            Self::Internal(_) => "internal",
        }
    }

    /// The error detail stored in the job's metadata.
    pub fn detail(&self) -> JobErrorDetail {
        let message = match self {
            Self::Failed { message, .. } => message.clone(),
            other => other.to_string(),
        };
        JobErrorDetail {
            message,
            code: self.code(),
            origin: self.origin().to_string(),
        }
    }
}

/// Dispatches jobs to the appropriate handler based on the job name.
#[derive(Default)]
pub struct JobExecutor {
    /// Registered job handlers by name.
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    /// Fallback for names without a dedicated handler.
    default_handler: Option<Arc<dyn JobHandler>>,
}

impl std::fmt::Debug for JobExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobExecutor")
            .field("handlers", &self.registered_types())
            .field("default_handler", &self.default_handler.is_some())
            .finish()
    }
}

impl JobExecutor {
    /// Create an executor with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a job name, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, handler: impl JobHandler + 'static) {
        let name = name.into();
        tracing::info!("Registered job handler for type '{}'", name);
        self.handlers.insert(name, Arc::new(handler));
    }

    /// Register the fallback handler.
    pub fn register_default(&mut self, handler: impl JobHandler + 'static) {
        tracing::info!("Registered default job handler");
        self.default_handler = Some(Arc::new(handler));
    }

    /// Find the handler for a job name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn JobHandler>, JobExecutionError> {
        self.handlers
            .get(name)
            .or(self.default_handler.as_ref())
            .cloned()
            .ok_or_else(|| JobExecutionError::HandlerNotFound(name.to_string()))
    }

    /// Check if a dedicated handler is registered for a job name.
    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered job names, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl JobHandler for JobExecutor {
    async fn execute(&self, payload: &JobPayload, job: &Job) -> Result<Value, JobExecutionError> {
        let handler = self.resolve(job.name())?;

        tracing::info!(
            "Executing job: id={}, type='{}', attempt={}/{}",
            job.id(),
            job.name(),
            job.attempts(),
            job.max_attempts()
        );

        handler.execute(payload, job).await
    }
}
