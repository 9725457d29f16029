//! Small helpers shared by the Telegram handlers.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Truncates a string to at most `max_chars` characters
///
/// # Examples
///
/// ```
/// use deinemudda::utils::truncate_str;
/// assert_eq!(truncate_str("schön gesagt", 5), "schön");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Retry a Telegram API operation with exponential backoff.
///
/// Delays start at [`TELEGRAM_API_INITIAL_BACKOFF_MS`] and are capped at
/// [`TELEGRAM_API_MAX_BACKOFF_MS`], with jitter. At most
/// [`TELEGRAM_API_MAX_RETRIES`] retries are made.
///
/// [`TELEGRAM_API_INITIAL_BACKOFF_MS`]: crate::config::TELEGRAM_API_INITIAL_BACKOFF_MS
/// [`TELEGRAM_API_MAX_BACKOFF_MS`]: crate::config::TELEGRAM_API_MAX_BACKOFF_MS
/// [`TELEGRAM_API_MAX_RETRIES`]: crate::config::TELEGRAM_API_MAX_RETRIES
///
/// # Errors
///
/// Returns the last error if every attempt fails.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} retries: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_truncate_str_unicode() {
        assert_eq!(truncate_str("äöü", 2), "äö");
        assert_eq!(truncate_str("kurz", 10), "kurz");
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let attempts = AtomicUsize::new(0);
        let result = retry_telegram_operation(|| async {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("connection reset");
            }
            Ok(42)
        })
        .await;

        assert_eq!(result.ok(), Some(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let attempts = AtomicUsize::new(0);
        let result: Result<()> = retry_telegram_operation(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("still down")
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1 + crate::config::TELEGRAM_API_MAX_RETRIES);
    }
}
