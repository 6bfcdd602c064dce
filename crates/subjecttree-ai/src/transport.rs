use reqwest::{Client, Response};
use std::future::Future;
use std::time::Duration;
use subjecttree_core::{Result, SubjectTreeError};
use tracing::warn;

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| SubjectTreeError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> SubjectTreeError {
    if err.is_timeout() {
        SubjectTreeError::Transport(format!("{} request timed out: {}", provider, err))
    } else {
        SubjectTreeError::Transport(format!("Failed to reach {}: {}", provider, err))
    }
}

/// Pass through a successful response; turn anything else into a provider error.
pub(crate) async fn check_status(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(SubjectTreeError::Provider {
        provider: provider.to_string(),
        status: status.as_u16(),
        message: error_text,
    })
}

/// Run `attempt`, retrying transport failures up to `max_retries` times.
///
/// Provider, parse and configuration errors are returned immediately.
pub(crate) async fn with_retries<T, F, Fut>(
    provider: &str,
    max_retries: u32,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tries = 0u32;
    loop {
        match attempt().await {
            Err(SubjectTreeError::Transport(msg)) if tries < max_retries => {
                tries += 1;
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_secs(2u64.pow(tries - 1));
                warn!(
                    "{} request failed (attempt {}/{}): {}, retrying...",
                    provider,
                    tries,
                    max_retries + 1,
                    msg
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_only_transport_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries("test", 2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SubjectTreeError::Transport("refused".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries("test", 2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(SubjectTreeError::Provider {
                    provider: "test".into(),
                    status: 401,
                    message: "no".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retries_by_default() {
        let calls = AtomicU32::new(0);
        let _ = with_retries::<(), _, _>("test", 0, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SubjectTreeError::Transport("refused".into())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
