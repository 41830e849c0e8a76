use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};

use crate::effects::error::{panic_message, EffectsError, Result};

type Job = Box<dyn FnOnce() + Send>;

/// Single-worker queue that runs control operations one at a time, in
/// submission order, on a dedicated thread.
///
/// Jobs may block (authorization round-trips, engine calls). A panicking job
/// is reported as `PipelineOperationFailed` and the worker keeps running.
pub struct ControlQueue {
    tx: Option<mpsc::UnboundedSender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl ControlQueue {
    pub fn new(name: &str) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let worker = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    job();
                }
                tracing::debug!("control queue drained");
            })
            .map_err(|e| {
                EffectsError::PipelineOperationFailed(format!(
                    "failed to spawn control worker: {e}"
                ))
            })?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Enqueue `job` now and return a future for its result.
    ///
    /// The job is queued when `submit` is called, not when the future is
    /// first polled, so call order is execution order.
    pub fn submit<T, F>(&self, job: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let wrapped: Job = Box::new(move || {
            let outcome = match catch_unwind(AssertUnwindSafe(job)) {
                Ok(result) => result,
                Err(payload) => {
                    let msg = panic_message(payload.as_ref());
                    tracing::error!("control operation panicked: {msg}");
                    Err(EffectsError::PipelineOperationFailed(format!(
                        "effects engine panicked: {msg}"
                    )))
                }
            };
            // The caller may have stopped waiting.
            let _ = done_tx.send(outcome);
        });

        let queued = self
            .tx
            .as_ref()
            .is_some_and(|tx| tx.send(wrapped).is_ok());

        async move {
            if !queued {
                return Err(EffectsError::ControlQueueClosed);
            }
            match done_rx.await {
                Ok(result) => result,
                Err(_) => Err(EffectsError::ControlQueueClosed),
            }
        }
    }
}

impl Drop for ControlQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish queued jobs and exit.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == std::thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                tracing::warn!("control worker exited with a panic");
            }
        }
    }
}
