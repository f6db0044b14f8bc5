// src/pool.rs - Bounded worker pool decoupling ingestion from evaluation

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{MonitorError, Result};
use crate::shutdown::{Shutdown, ShutdownSignal};

/// A unit of work executed by the pool. Errors are logged by the worker and
/// never reach the submitter.
pub type Task = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

const DEFAULT_WORKER_COUNT: usize = 1;
const DEFAULT_QUEUE_SIZE: usize = 100;

/// Fixed set of workers draining a bounded FIFO task queue. Submission is
/// non-blocking; a full queue is the submitter's problem.
pub struct WorkerPool {
    worker_count: usize,
    queue_size: usize,
    task_tx: mpsc::Sender<Task>,
    task_rx: Arc<Mutex<mpsc::Receiver<Task>>>,
    shutdown: Shutdown,
    stopped: StdMutex<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Non-positive inputs fall back to 1 worker / queue of 100.
    pub fn new(worker_count: usize, queue_size: usize) -> Self {
        let worker_count = if worker_count == 0 {
            DEFAULT_WORKER_COUNT
        } else {
            worker_count
        };
        let queue_size = if queue_size == 0 {
            DEFAULT_QUEUE_SIZE
        } else {
            queue_size
        };

        let (task_tx, task_rx) = mpsc::channel(queue_size);

        Self {
            worker_count,
            queue_size,
            task_tx,
            task_rx: Arc::new(Mutex::new(task_rx)),
            shutdown: Shutdown::new(),
            stopped: StdMutex::new(false),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the workers. Called once during wiring.
    pub async fn start(&self) {
        info!("Starting worker pool with {} workers", self.worker_count);

        let mut workers = self.workers.lock().await;
        for id in 0..self.worker_count {
            let queue = self.task_rx.clone();
            let signal = self.shutdown.signal();
            workers.push(tokio::spawn(worker_loop(id, queue, signal)));
        }
    }

    /// Enqueue a task without blocking. Fails fast when the pool is stopped
    /// or the queue is full.
    pub fn submit(&self, task: Task) -> Result<()> {
        {
            let stopped = self.stopped.lock().unwrap();
            if *stopped {
                return Err(MonitorError::Stopped);
            }
        }

        self.task_tx.try_send(task).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => MonitorError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => MonitorError::Stopped,
        })
    }

    /// Like [`submit`], but refuses immediately when the caller's shutdown
    /// signal has already fired.
    pub fn submit_with_signal(&self, signal: &ShutdownSignal, task: Task) -> Result<()> {
        if signal.is_triggered() {
            return Err(MonitorError::Cancelled);
        }
        self.submit(task)
    }

    /// Stop the pool: no new submissions, in-flight tasks run to completion,
    /// queued tasks are never started. Safe to call more than once.
    pub async fn stop(&self) {
        {
            let mut stopped = self.stopped.lock().unwrap();
            if *stopped {
                return;
            }
            *stopped = true;
        }

        self.shutdown.trigger();

        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }
        info!("Worker pool stopped");
    }

    /// Stop with a deadline. On expiry the call returns `Timeout`; workers
    /// keep running until their current task ends.
    pub async fn stop_with_timeout(&self, deadline: Duration) -> Result<()> {
        match tokio::time::timeout(deadline, self.stop()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(MonitorError::Timeout {
                timeout_seconds: deadline.as_secs(),
            }),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of tasks currently queued (not yet picked up by a worker).
    pub fn queue_len(&self) -> usize {
        self.queue_size - self.task_tx.capacity()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap()
    }
}

async fn worker_loop(id: usize, queue: Arc<Mutex<mpsc::Receiver<Task>>>, signal: ShutdownSignal) {
    debug!(worker = id, "Worker started");

    loop {
        // Hold the queue lock only while waiting for the next task. The stop
        // branch is biased so queued tasks are not started after shutdown.
        let task = {
            let mut signal = signal.clone();
            let mut queue = queue.lock().await;
            tokio::select! {
                biased;
                _ = signal.triggered() => None,
                task = queue.recv() => task,
            }
        };

        let Some(task) = task else {
            break;
        };

        if let Err(err) = task.await {
            warn!(worker = id, error = %err, "Task failed");
        }
    }

    debug!(worker = id, "Worker exited");
}
