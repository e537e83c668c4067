use eyre::Report;
use primitives::retries::retry_with_backoff_if;
use reqwest::Error as ReqwestError;

/// Determine if an error returned by reqwest/eyre is retryable.
///
/// Only transport failures qualify. Responses, whatever their status, are
/// handed back to the caller for interpretation. A timed-out request may
/// already have reached the server, so timeouts are retried for idempotent
/// requests only.
fn is_retryable(err: &Report, idempotent: bool) -> bool {
    err.downcast_ref::<ReqwestError>()
        .is_some_and(|e| e.is_connect() || (idempotent && e.is_timeout()))
}

/// Retry the provided async operation with exponential backoff if the returned
/// error is considered retryable.
pub(crate) async fn retry_op<F, Fut, T>(idempotent: bool, op: F) -> eyre::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = eyre::Result<T>>,
{
    retry_with_backoff_if(op, |err: &Report| is_retryable(err, idempotent)).await
}
