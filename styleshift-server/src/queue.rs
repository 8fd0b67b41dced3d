//! Bounded transfer queue drained by a fixed pool of workers.
//!
//! Requests enqueue without waiting; when the queue is full they are refused
//! instead of piling up. Each worker hands the CPU-heavy transfer to the
//! blocking thread pool. Dropping every [`JobQueue`] handle closes the queue,
//! and [`WorkerPool::drain`] then waits for the remaining jobs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use styleshift_core::{StylePipeline, TransferJob};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("transfer queue is full, try again later")]
    Full,
    #[error("transfer queue is shut down")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    pub workers: usize,
    pub capacity: usize,
    pub job_timeout: Option<Duration>,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            capacity: 32,
            job_timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<TransferJob>,
}

impl JobQueue {
    /// Spawns the workers on the current runtime.
    pub fn start(pipeline: Arc<StylePipeline>, options: QueueOptions) -> (Self, WorkerPool) {
        let (queue, receiver) = Self::bounded(options.capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let handles = (0..options.workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    receiver.clone(),
                    pipeline.clone(),
                    options.job_timeout,
                ))
            })
            .collect();
        tracing::info!(
            workers = options.workers.max(1),
            capacity = options.capacity.max(1),
            "transfer queue started"
        );
        (queue, WorkerPool { handles })
    }

    fn bounded(capacity: usize) -> (Self, mpsc::Receiver<TransferJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn submit(&self, job: TransferJob) -> Result<(), QueueError> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Jobs waiting for a worker.
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Resolves once the queue is closed and every queued job has run.
    pub async fn drain(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "transfer worker panicked");
            }
        }
        tracing::info!("transfer queue drained");
    }
}

async fn run_worker(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<TransferJob>>>,
    pipeline: Arc<StylePipeline>,
    timeout: Option<Duration>,
) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };
        process(worker, &pipeline, job, timeout).await;
    }
    tracing::debug!(worker, "transfer worker stopped");
}

/// Failures are logged and otherwise dropped: the caller only learns about
/// them by the output file never appearing.
async fn process(
    worker: usize,
    pipeline: &Arc<StylePipeline>,
    job: TransferJob,
    timeout: Option<Duration>,
) {
    let span = tracing::info_span!(
        "transfer",
        transfer_id = %job.transfer_id,
        product_id = %job.product_id,
        style_id = %job.style_id,
        worker,
    );
    let start = Instant::now();
    let deadline = timeout.map(|timeout| start + timeout);

    let result = tokio::task::spawn_blocking({
        let pipeline = pipeline.clone();
        let span = span.clone();
        move || span.in_scope(|| pipeline.run(&job, deadline))
    })
    .await;

    span.in_scope(|| {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(Ok(path)) => {
                tracing::info!(output = %path.display(), elapsed_ms, "transfer completed")
            }
            Ok(Err(e)) => tracing::error!(error = %e, elapsed_ms, "transfer failed"),
            Err(e) => tracing::error!(error = %e, elapsed_ms, "transfer task panicked"),
        }
    });
}
