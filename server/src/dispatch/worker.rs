use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::{DispatchError, Retryable, SessionTask, TaskQueue};

/// A task plus how many times it has been tried.
#[derive(Debug, Clone)]
pub struct TaskEnvelope {
    pub task: SessionTask,
    pub attempt: u32,
}

/// Executes one task. Implementations must tolerate re-execution.
pub trait TaskHandler: Send + Sync {
    type Error: Retryable + Display + Send;

    fn handle(&self, task: SessionTask) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Cloneable submission handle for the pool's queue.
#[derive(Clone)]
pub struct TaskSender {
    tx: mpsc::UnboundedSender<TaskEnvelope>,
}

impl TaskSender {
    fn send_envelope(&self, envelope: TaskEnvelope) -> Result<(), DispatchError> {
        self.tx.send(envelope).map_err(|_| DispatchError::Closed)
    }

    fn send_envelope_after(
        &self,
        envelope: TaskEnvelope,
        delay: Duration,
    ) -> Result<(), DispatchError> {
        if self.tx.is_closed() {
            return Err(DispatchError::Closed);
        }
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(envelope).is_err() {
                tracing::warn!("Queue closed before delayed task could be submitted");
            }
        });
        Ok(())
    }
}

impl TaskQueue for TaskSender {
    fn submit(&self, task: SessionTask) -> Result<(), DispatchError> {
        self.send_envelope(TaskEnvelope { task, attempt: 1 })
    }

    fn submit_delayed(&self, task: SessionTask, delay: Duration) -> Result<(), DispatchError> {
        self.send_envelope_after(TaskEnvelope { task, attempt: 1 }, delay)
    }
}

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Total tries per task, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_backoff: Duration,
}

impl WorkerConfig {
    fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(1 << exponent)
    }
}

/// Fixed pool of worker tasks draining one shared queue.
pub struct WorkerPool {
    config: WorkerConfig,
    sender: TaskSender,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<TaskEnvelope>>>,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            sender: TaskSender { tx },
            // Each worker locks the receiver only while waiting, so exactly
            // one worker picks up each task.
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub fn sender(&self) -> TaskSender {
        self.sender.clone()
    }

    pub fn spawn<H>(&self, handler: Arc<H>) -> Vec<JoinHandle<()>>
    where
        H: TaskHandler + 'static,
    {
        let handles = (0..self.config.workers)
            .map(|worker_id| {
                let rx = self.rx.clone();
                let sender = self.sender.clone();
                let handler = handler.clone();
                let config = self.config.clone();
                tokio::spawn(async move {
                    run_worker(worker_id, rx, sender, handler, config).await;
                })
            })
            .collect();

        tracing::info!(
            workers = self.config.workers,
            max_attempts = self.config.max_attempts,
            "Worker pool started"
        );
        handles
    }
}

async fn run_worker<H: TaskHandler>(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<TaskEnvelope>>>,
    sender: TaskSender,
    handler: Arc<H>,
    config: WorkerConfig,
) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        let envelope = {
            let mut rx = rx.lock().await;
            match rx.recv().await {
                Some(envelope) => envelope,
                None => {
                    tracing::info!(worker_id, "Task queue closed, worker exiting");
                    break;
                }
            }
        };

        let kind = envelope.task.kind();
        let attempt = envelope.attempt;
        let span = tracing::info_span!("task", worker_id, kind, attempt);

        let result = handler
            .handle(envelope.task.clone())
            .instrument(span.clone())
            .await;

        let _entered = span.enter();
        match result {
            Ok(()) => tracing::debug!("Task complete"),
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                let delay = config.retry_delay(attempt);
                tracing::warn!(delay_ms = delay.as_millis() as u64, "Task failed, retrying: {}", e);
                let retry = TaskEnvelope {
                    task: envelope.task,
                    attempt: attempt + 1,
                };
                if sender.send_envelope_after(retry, delay).is_err() {
                    tracing::error!("Task queue closed, retry dropped");
                }
            }
            Err(e) if e.is_retryable() => {
                tracing::error!("Task failed after {} attempts, giving up: {}", attempt, e);
            }
            Err(e) => tracing::warn!("Task rejected: {}", e),
        }
    }
}
