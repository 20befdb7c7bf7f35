//! Bounded-concurrency batch executor
//!
//! Every job is spawned up front; the [`BoundedGate`] admits at most
//! `concurrency` of them into their unit of work at a time. Jobs finish in any
//! order, but `run` returns exactly one output per job, index-aligned with the
//! submitted list.
//!
//! Cancellation is cooperative: the token is checked before waiting on the gate,
//! while waiting, and again once a permit is held. Units already running are
//! never interrupted.

use crate::gate::BoundedGate;
use futures::FutureExt;
use relink_common::Result;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A unit of batch work
pub trait BatchJob: Clone + Send + Sync + 'static {
    type Output: Send + 'static;

    /// Stable key for correlating progress with results (e.g. the input path)
    fn key(&self) -> String;

    /// Output for a job that never started because the batch was cancelled
    fn cancelled_output(&self) -> Self::Output;

    /// Output for a job whose unit of work panicked or was aborted
    fn failed_output(&self, reason: String) -> Self::Output;
}

/// Progress notification for one finished job
#[derive(Debug)]
pub struct BatchProgress<'a, O> {
    /// Submission index of the finished job
    pub index: usize,
    pub key: &'a str,
    /// Jobs finished so far, this one included
    pub completed: usize,
    pub total: usize,
    pub output: &'a O,
}

/// Shared state of one `run`
struct BatchState {
    total: usize,
    completed: Mutex<usize>,
    cancel: CancellationToken,
    gate: Arc<BoundedGate>,
}

impl BatchState {
    /// Count a finished job and report it; calls are serialized so `completed`
    /// is strictly increasing across callbacks
    fn finish<O, P>(&self, index: usize, key: &str, output: &O, on_progress: &P)
    where
        P: Fn(BatchProgress<'_, O>),
    {
        let mut completed = self
            .completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *completed += 1;

        on_progress(BatchProgress {
            index,
            key,
            completed: *completed,
            total: self.total,
            output,
        });
    }
}

/// Runs batches of [`BatchJob`]s under a concurrency cap
#[derive(Debug, Clone, Default)]
pub struct BatchProcessor {
    cancel: CancellationToken,
}

impl BatchProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the running (and any later) batch
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!("Batch cancellation requested");
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token shared with this processor, e.g. for a Ctrl-C handler
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `jobs` with at most `concurrency` units of work in flight
    ///
    /// `on_progress` is called exactly once per job, whatever its outcome. The
    /// returned outputs are in submission order. A zero `concurrency` is
    /// rejected before any job is scheduled.
    pub async fn run<J, F, Fut, P>(
        &self,
        jobs: Vec<J>,
        concurrency: usize,
        unit_of_work: F,
        on_progress: P,
    ) -> Result<Vec<J::Output>>
    where
        J: BatchJob,
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = J::Output> + Send + 'static,
        P: Fn(BatchProgress<'_, J::Output>) + Send + Sync + 'static,
    {
        let gate = Arc::new(BoundedGate::new(concurrency)?);
        let total = jobs.len();

        if total == 0 {
            return Ok(Vec::new());
        }

        info!(jobs = total, concurrency, "Starting batch");

        let state = Arc::new(BatchState {
            total,
            completed: Mutex::new(0),
            cancel: self.cancel.clone(),
            gate,
        });
        let unit_of_work = Arc::new(unit_of_work);
        let on_progress = Arc::new(on_progress);

        let mut tasks = JoinSet::new();
        for (index, job) in jobs.iter().cloned().enumerate() {
            let state = Arc::clone(&state);
            let unit_of_work = Arc::clone(&unit_of_work);
            let on_progress = Arc::clone(&on_progress);

            tasks.spawn(async move {
                let key = job.key();
                let output = execute(&state, job, unit_of_work.as_ref()).await;
                state.finish(index, &key, &output, on_progress.as_ref());
                (index, output)
            });
        }

        let mut slots: Vec<Option<J::Output>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, output)) => slots[index] = Some(output),
                Err(e) => error!("Batch task aborted: {}", e),
            }
        }

        let outputs: Vec<J::Output> = slots
            .into_iter()
            .zip(jobs)
            .map(|(slot, job)| {
                slot.unwrap_or_else(|| job.failed_output("batch task aborted".to_string()))
            })
            .collect();

        info!(
            jobs = total,
            cancelled = self.cancel.is_cancelled(),
            "Batch finished"
        );

        Ok(outputs)
    }
}

async fn execute<J, F, Fut>(state: &BatchState, job: J, unit_of_work: &F) -> J::Output
where
    J: BatchJob,
    F: Fn(J) -> Fut,
    Fut: Future<Output = J::Output>,
{
    if state.cancel.is_cancelled() {
        return job.cancelled_output();
    }

    let permit = tokio::select! {
        biased;
        _ = state.cancel.cancelled() => return job.cancelled_output(),
        permit = state.gate.acquire() => permit,
    };

    if state.cancel.is_cancelled() {
        return job.cancelled_output();
    }

    debug!(key = %job.key(), "Job started");

    let fallback = job.clone();
    let outcome = AssertUnwindSafe(async move { unit_of_work(job).await })
        .catch_unwind()
        .await;
    drop(permit);

    match outcome {
        Ok(output) => output,
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            warn!(key = %fallback.key(), "Job panicked: {}", reason);
            fallback.failed_output(format!("panicked: {}", reason))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
