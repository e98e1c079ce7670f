use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Result of one task attempt. The error side is the line that ends up in
/// the progress snapshot.
pub type ItemOutcome = Result<(), String>;

/// How a task list is pushed through the mutation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPolicy {
    /// One request in flight, `delay` between consecutive attempts.
    /// Completion order equals input order.
    SerialDelayed { delay: Duration },
    /// Every attempt started together (or at most `limit` at a time).
    /// Completion order is unspecified; the provider paces its own requests.
    Concurrent { limit: Option<usize> },
}

/// Runs task lists under a fixed [`DispatchPolicy`].
///
/// All attempts are polled from the calling task, so `on_done` is never
/// invoked concurrently with itself and can mutate state without locking.
#[derive(Debug, Clone)]
pub struct Executor {
    policy: DispatchPolicy,
}

impl Executor {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    pub async fn run<T, F, Fut, C>(&self, items: Vec<T>, attempt: F, mut on_done: C)
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = ItemOutcome>,
        C: FnMut(ItemOutcome),
    {
        match self.policy {
            DispatchPolicy::SerialDelayed { delay } => {
                let mut queue: VecDeque<T> = items.into();
                while let Some(item) = queue.pop_front() {
                    let outcome = attempt(item).await;
                    on_done(outcome);
                    if !queue.is_empty() && !delay.is_zero() {
                        debug!("Waiting {:?} before next request ({} queued)", delay, queue.len());
                        tokio::time::sleep(delay).await;
                    }
                }
            }
            DispatchPolicy::Concurrent { limit } => {
                let width = limit.unwrap_or(items.len()).max(1);
                debug!("Dispatching {} tasks with up to {} in flight", items.len(), width);
                let mut in_flight = stream::iter(items).map(attempt).buffer_unordered(width);
                while let Some(outcome) = in_flight.next().await {
                    on_done(outcome);
                }
            }
        }
    }
}
