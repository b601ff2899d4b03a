//! Retry-once with per-attempt timeout.

use backon::{ConstantBuilder, Retryable};
use std::future::Future;
use std::time::Duration;

use super::Collaborator;
use crate::providers::ProviderError;

/// Run `op` under `timeout`, retrying once after `delay` when the failure is
/// retriable. Timeouts count as retriable failures.
pub async fn retry_once<T, F, Fut>(
    collaborator: Collaborator,
    timeout: Duration,
    delay: Duration,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let attempt = || {
        let fut = op();
        async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            }
        }
    };

    attempt
        .retry(
            ConstantBuilder::default()
                .with_delay(delay)
                .with_max_times(1),
        )
        .when(ProviderError::is_retriable)
        .notify(|err: &ProviderError, after: Duration| {
            tracing::debug!(%collaborator, error = %err, ?after, "Retrying collaborator call");
        })
        .await
}
