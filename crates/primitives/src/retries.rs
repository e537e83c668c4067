use std::{future::Future, time::Duration};

use tokio_retry::{RetryIf, strategy::ExponentialBackoff};

/// The default maximum number of retries for a transient failure.
///
/// With a `DEFAULT_BACKOFF_FACTOR_MS` of 5ms the delays run 10ms, 20ms, ... ~2.5s.
pub const DEFAULT_MAX_RETRIES: u32 = 9;

/// Multiplier applied to the `2^n` backoff sequence, in milliseconds.
pub const DEFAULT_BACKOFF_FACTOR_MS: u64 = 5;

/// Upper bound for a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Retry the provided async operation using [`ExponentialBackoff`].
///
/// Retries are attempted as long as the provided `condition` returns `true` for
/// the error produced by the operation, up to [`DEFAULT_MAX_RETRIES`] times.
pub async fn retry_with_backoff_if<F, Fut, T, E, C>(op: F, condition: C) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&E) -> bool,
{
    retry_with_strategy_if(
        ExponentialBackoff::from_millis(2)
            .factor(DEFAULT_BACKOFF_FACTOR_MS)
            .max_delay(MAX_BACKOFF)
            .take(DEFAULT_MAX_RETRIES as usize),
        op,
        condition,
    )
    .await
}

/// Same as [`retry_with_backoff_if`] with a caller-provided delay sequence.
pub async fn retry_with_strategy_if<S, F, Fut, T, E, C>(
    strategy: S,
    op: F,
    condition: C,
) -> Result<T, E>
where
    S: IntoIterator<Item = Duration>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&E) -> bool,
{
    RetryIf::spawn(strategy, op, condition).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant() -> impl Iterator<Item = Duration> {
        std::iter::repeat(Duration::ZERO).take(3)
    }

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_strategy_if(
            instant(),
            || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 { Err("transient") } else { Ok(7) }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_when_condition_rejects_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_strategy_if(
            instant(),
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("fatal")
            },
            |e| *e != "fatal",
        )
        .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_strategy_is_exhausted() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_strategy_if(
            instant(),
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("transient")
            },
            |_| true,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
