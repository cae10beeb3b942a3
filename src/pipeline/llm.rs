//! Shared LLM call plumbing: completion options, timeout and retry.
//!
//! Both the grading call and the vision-model OCR strategy go through
//! [`chat_with_retry`], so backoff behaviour is identical for each.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) with 500 ms base and 3 retries waits
//! 500 ms → 1 s → 2 s before giving up.

use crate::config::GraderConfig;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Retry and timeout knobs, copied out of [`GraderConfig`].
#[derive(Debug, Clone, Copy)]
pub struct CallPolicy {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl From<&GraderConfig> for CallPolicy {
    fn from(config: &GraderConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }
}

impl CallPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

/// Build `CompletionOptions` from the grader config.
pub fn build_options(config: &GraderConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Send `messages` to the provider, retrying failures and timeouts.
///
/// Returns the reply text, or the last error message once all attempts
/// are spent.
pub async fn chat_with_retry(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    options: &CompletionOptions,
    policy: CallPolicy,
    label: &str,
) -> Result<String, String> {
    let mut last_err: Option<String> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.backoff(attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label,
                attempt,
                policy.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        let call = provider.chat(messages, Some(options));
        match timeout(Duration::from_secs(policy.timeout_secs), call).await {
            Ok(Ok(response)) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    label, response.prompt_tokens, response.completion_tokens
                );
                return Ok(response.content);
            }
            Ok(Err(e)) => {
                let err_msg = format!("{}", e);
                warn!("{}: attempt {} failed: {}", label, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
            Err(_) => {
                let err_msg = format!("timed out after {}s", policy.timeout_secs);
                warn!("{}: attempt {} {}", label, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| "Unknown error".to_string()))
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingProvider;
    use super::*;
    use edgequake_llm::MockProvider;

    fn policy(max_retries: u32, timeout_secs: u64) -> CallPolicy {
        CallPolicy {
            max_retries,
            retry_backoff_ms: 5,
            timeout_secs,
        }
    }

    fn ask() -> Vec<ChatMessage> {
        vec![ChatMessage::user("grade this")]
    }

    #[test]
    fn build_options_defaults() {
        let config = GraderConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn backoff_doubles() {
        let policy = CallPolicy {
            max_retries: 3,
            retry_backoff_ms: 500,
            timeout_secs: 60,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn returns_queued_reply() {
        let mock = MockProvider::new();
        mock.add_response("{\"overallScore\": 90}").await;
        let provider: Arc<dyn LLMProvider> = Arc::new(mock);

        let reply = chat_with_retry(&provider, &ask(), &CompletionOptions::default(), policy(0, 5), "test")
            .await
            .unwrap();
        assert_eq!(reply, "{\"overallScore\": 90}");
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let recording = Arc::new(RecordingProvider::failing_first(2, "ok"));
        let provider: Arc<dyn LLMProvider> = recording.clone();

        let reply = chat_with_retry(&provider, &ask(), &CompletionOptions::default(), policy(3, 5), "test")
            .await
            .unwrap();
        assert_eq!(reply, "ok");
        assert_eq!(recording.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries_with_last_error() {
        let recording = Arc::new(RecordingProvider::failing_first(10, "never"));
        let provider: Arc<dyn LLMProvider> = recording.clone();

        let err = chat_with_retry(&provider, &ask(), &CompletionOptions::default(), policy(2, 5), "test")
            .await
            .unwrap_err();
        assert!(err.contains("503"), "unexpected error: {err}");
        assert_eq!(recording.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_call_times_out_each_attempt() {
        let recording = Arc::new(RecordingProvider::stalled());
        let provider: Arc<dyn LLMProvider> = recording.clone();

        let err = chat_with_retry(&provider, &ask(), &CompletionOptions::default(), policy(1, 30), "test")
            .await
            .unwrap_err();
        assert_eq!(err, "timed out after 30s");
        assert_eq!(recording.calls(), 2);
    }
}
