//! `AsyncResult<T>` — a single-resolution handle a command caller awaits for
//! its response.
//!
//! Each command the `CacheManager` accepts carries its own
//! `tokio::sync::oneshot` reply channel, so there is never more than one
//! possible response per call and nothing to stash out of order: the
//! manager sends on the sender half it was handed, the caller awaits the
//! receiver half it kept.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::CacheError;

/// The manager-side half: completes the call with a result.
pub struct AsyncResultSender<T> {
    sender: oneshot::Sender<Result<T, CacheError>>,
}

impl<T> AsyncResultSender<T> {
    pub fn complete(self, result: Result<T, CacheError>) {
        // The caller may have given up waiting (dropped its receiver); a
        // failed send here just means nobody was listening.
        let _ = self.sender.send(result);
    }
}

/// The caller-side half: resolves to the manager's response, or to
/// [`CacheError::Timeout`] if it doesn't arrive within the given budget.
pub struct AsyncResult<T> {
    receiver: oneshot::Receiver<Result<T, CacheError>>,
}

impl<T> AsyncResult<T> {
    pub fn pair() -> (AsyncResultSender<T>, AsyncResult<T>) {
        let (sender, receiver) = oneshot::channel();
        (AsyncResultSender { sender }, AsyncResult { receiver })
    }

    /// An already-resolved success — useful for synchronous fast paths
    /// (e.g. a cache hit answered without touching the manager thread).
    pub fn ready(value: T) -> Self {
        let (sender, result) = Self::pair();
        sender.complete(Ok(value));
        result
    }

    pub fn failed(err: CacheError) -> Self {
        let (sender, result) = Self::pair();
        sender.complete(Err(err));
        result
    }

    pub async fn resolve(self, timeout: Duration) -> Result<T, CacheError> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CacheError::InvariantViolation(
                "responder dropped without completing the command".to_string(),
            )),
            Err(_) => Err(CacheError::Timeout {
                operation: "command".to_string(),
                elapsed_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_resolves_immediately() {
        let result = AsyncResult::ready(42);
        assert_eq!(result.resolve(Duration::from_secs(1)).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn failed_resolves_to_the_given_error() {
        let result: AsyncResult<i32> =
            AsyncResult::failed(CacheError::InvariantViolation("boom".into()));
        let err = result.resolve(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, CacheError::InvariantViolation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_call_times_out() {
        let (sender, result) = AsyncResult::<i32>::pair();
        let handle = tokio::spawn(async move { result.resolve(Duration::from_millis(100)).await });
        tokio::time::advance(Duration::from_millis(200)).await;
        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, Err(CacheError::Timeout { .. })));
        drop(sender);
    }

    #[tokio::test]
    async fn dropped_sender_surfaces_as_invariant_violation() {
        let (sender, result) = AsyncResult::<i32>::pair();
        drop(sender);
        let outcome = result.resolve(Duration::from_secs(1)).await;
        assert!(matches!(outcome, Err(CacheError::InvariantViolation(_))));
    }
}
