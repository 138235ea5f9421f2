//! Helpers shared by every fan-out level: the outbound call gate and the
//! join-everything-keep-first-error collector.

use crate::error::{Result, SlackdutyError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Caps the number of in-flight API calls.
///
/// Permits are taken around a single call only, never across a nested
/// fan-out, so tasks waiting on children never hold a permit.
#[derive(Debug, Clone, Default)]
pub struct CallGate {
    limit: Option<usize>,
    semaphore: Option<Arc<Semaphore>>,
}

impl CallGate {
    /// `None` (or `Some(0)`) leaves calls unbounded.
    pub fn new(limit: Option<usize>) -> Self {
        let limit = limit.filter(|n| *n > 0);
        Self {
            limit,
            semaphore: limit.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub async fn call<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = match &self.semaphore {
            Some(sem) => Some(
                sem.acquire()
                    .await
                    .map_err(|_| SlackdutyError::TaskFailed("call gate closed".into()))?,
            ),
            None => None,
        };
        call.await
    }
}

/// Wait for every task in `tasks`. Returns all values in completion order, or
/// the first error the loop observes once every task has finished.
pub async fn join_all<T: 'static>(mut tasks: JoinSet<Result<T>>) -> Result<Vec<T>> {
    let mut values = Vec::with_capacity(tasks.len());
    let mut first_err = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(|e| SlackdutyError::TaskFailed(e.to_string()));
        match outcome.and_then(|r| r) {
            Ok(v) => values.push(v),
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(values),
    }
}
