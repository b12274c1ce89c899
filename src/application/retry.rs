use crate::domain::errors::{DomainError, DomainResult};
use std::future::Future;
use tracing::warn;

/// Run `attempt` until it succeeds, fails with a non-transient error, or
/// `max_attempts` transient failures have been seen.
///
/// Only `DomainError::Transient` (deadlock victim, lock-wait timeout) is
/// retried. The closure receives the 1-based attempt number.
pub async fn retry_transient<T, F, Fut>(max_attempts: u32, mut attempt: F) -> DomainResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut current = 1;

    loop {
        match attempt(current).await {
            Err(DomainError::Transient { fault, message }) if current < max_attempts => {
                warn!(
                    attempt = current,
                    max_attempts,
                    %fault,
                    "Transient store fault, retrying: {}",
                    message
                );
                current += 1;
            }
            outcome => return outcome,
        }
    }
}
