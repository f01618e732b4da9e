//! Bounded concurrent task runner shared by the listing and detail phases
//!
//! Every task runs in its own tokio task, so a panic is contained at the
//! `JoinHandle` boundary, and every task is bounded by a deadline.

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{debug, error, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// How a dispatched task ended
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed(T),
    /// The deadline passed; the task future was dropped
    TimedOut,
    /// The task panicked or was aborted
    Panicked(String),
}

impl<T> TaskOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::TimedOut | Self::Panicked(_) => None,
        }
    }
}

/// Run `task(key)` for every key with at most `concurrency` in flight.
///
/// Results come back in completion order, each paired with its key. A task
/// that times out is cancelled by dropping its future, which releases any
/// RAII guards it holds.
pub async fn run_bounded<K, T, F, Fut>(
    keys: Vec<K>,
    concurrency: usize,
    task_timeout: Duration,
    task: F,
) -> Vec<(K, TaskOutcome<T>)>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut active_tasks = FuturesUnordered::new();
    let mut results = Vec::with_capacity(keys.len());

    for key in keys {
        // Drain finished tasks while waiting for a free slot
        let permit = loop {
            if let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() {
                break permit;
            }
            match active_tasks.next().await {
                Some(done) => results.push(done),
                None => match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => break permit,
                    Err(_) => {
                        error!("Dispatch semaphore closed unexpectedly");
                        return results;
                    }
                },
            }
        };

        let fut = task(key.clone());
        let handle = tokio::spawn(async move {
            let _permit = permit;
            tokio::time::timeout(task_timeout, fut).await
        });

        active_tasks.push(async move {
            let outcome = match handle.await {
                Ok(Ok(value)) => TaskOutcome::Completed(value),
                Ok(Err(_)) => {
                    warn!("Task timed out after {task_timeout:?}");
                    TaskOutcome::TimedOut
                }
                Err(e) => {
                    error!("Task panicked: {e}");
                    TaskOutcome::Panicked(e.to_string())
                }
            };
            (key, outcome)
        });
    }

    while let Some(done) = active_tasks.next().await {
        results.push(done);
    }

    debug!("Dispatched {} tasks", results.len());
    results
}
