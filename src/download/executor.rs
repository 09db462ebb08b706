//! Single-worker background executor for blocking-style download work.
//!
//! Jobs run one at a time in submission order; a second download queues
//! behind the first. Callers get a [`JobHandle`] to await the result, and
//! jobs report to the user by posting [`UiEvent`](crate::ui::UiEvent)s.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

type Job = BoxFuture<'static, ()>;

/// Handle to the background worker. Cloning shares the same worker.
#[derive(Debug, Clone)]
pub struct BackgroundExecutor {
    jobs: mpsc::UnboundedSender<Job>,
}

impl BackgroundExecutor {
    /// Starts the worker task. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (jobs, mut queue) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = queue.recv().await {
                if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    error!("background job panicked");
                }
            }
            debug!("background executor stopped");
        });
        Self { jobs }
    }

    /// Queues `future` behind previously submitted jobs.
    pub fn submit<F, T>(&self, future: F) -> JobHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done, result) = oneshot::channel();
        let job = async move {
            let _ = done.send(future.await);
        }
        .boxed();
        if self.jobs.send(job).is_err() {
            warn!("background executor is gone, job dropped");
        }
        JobHandle { result }
    }
}

/// Result of a submitted job.
#[derive(Debug)]
pub struct JobHandle<T> {
    result: oneshot::Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Waits for the job. `None` if it panicked or was never run.
    pub async fn wait(self) -> Option<T> {
        self.result.await.ok()
    }
}
