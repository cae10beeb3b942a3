//! The grading call: extracted text in, raw model reply out.

use crate::config::GraderConfig;
use crate::error::GraderError;
use crate::pipeline::llm::{self, CallPolicy};
use crate::prompts::grading_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use tracing::{debug, info};

/// Sends assignment text to a model and returns its unparsed reply.
#[async_trait]
pub trait AssignmentGrader: Send + Sync {
    async fn grade(&self, assignment_text: &str) -> Result<String, GraderError>;
}

/// [`AssignmentGrader`] backed by an edgequake-llm provider.
pub struct LlmGrader {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    policy: CallPolicy,
    model_label: String,
}

impl LlmGrader {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &GraderConfig) -> Self {
        Self {
            provider,
            options: llm::build_options(config),
            policy: CallPolicy::from(config),
            model_label: config.model.clone().unwrap_or_else(|| "auto".to_string()),
        }
    }
}

#[async_trait]
impl AssignmentGrader for LlmGrader {
    async fn grade(&self, assignment_text: &str) -> Result<String, GraderError> {
        info!(
            "Grading {} chars with model {}",
            assignment_text.chars().count(),
            self.model_label
        );
        let messages = vec![ChatMessage::user(grading_prompt(assignment_text))];
        let reply = llm::chat_with_retry(&self.provider, &messages, &self.options, self.policy, "Grading")
            .await
            .map_err(|message| GraderError::GradingFailed {
                retries: self.policy.max_retries,
                message,
            })?;
        debug!("Grading reply: {} chars", reply.chars().count());
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::testing::RecordingProvider;
    use edgequake_llm::{ChatRole, MockProvider};

    fn config(max_retries: u32) -> GraderConfig {
        GraderConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn sends_grading_prompt_with_the_extracted_text() {
        let recording = Arc::new(RecordingProvider::replying("{}"));
        let grader = LlmGrader::new(recording.clone(), &config(0));

        let reply = grader.grade("Q1: 7 x 8 = 56").await.unwrap();

        assert_eq!(reply, "{}");
        let request = recording.last_request();
        assert_eq!(request.len(), 1);
        assert_eq!(request[0].role, ChatRole::User);
        assert_eq!(request[0].content, grading_prompt("Q1: 7 x 8 = 56"));
        assert!(request[0].content.contains("Q1: 7 x 8 = 56"));
        assert!(request[0].images.is_none());
    }

    #[tokio::test]
    async fn returns_the_provider_reply_verbatim() {
        let mock = MockProvider::new();
        mock.add_response("Here you go: {\"overallScore\": 75}").await;
        let grader = LlmGrader::new(Arc::new(mock), &config(0));

        let reply = grader.grade("some answers").await.unwrap();
        assert_eq!(reply, "Here you go: {\"overallScore\": 75}");
    }

    #[tokio::test]
    async fn exhausted_retries_are_grading_failed() {
        let recording = Arc::new(RecordingProvider::failing_first(10, "never"));
        let grader = LlmGrader::new(recording.clone(), &config(2));

        let err = grader.grade("some answers").await.unwrap_err();

        match &err {
            GraderError::GradingFailed { retries, message } => {
                assert_eq!(*retries, 2);
                assert!(message.contains("503"));
            }
            other => panic!("expected GradingFailed, got {other:?}"),
        }
        assert_eq!(err.status_code(), 500);
        assert_eq!(recording.calls(), 3);
    }

    #[tokio::test]
    async fn recovers_from_one_failed_attempt() {
        let recording = Arc::new(RecordingProvider::failing_first(1, "{\"ok\": true}"));
        let grader = LlmGrader::new(recording.clone(), &config(3));

        assert_eq!(grader.grade("answers").await.unwrap(), "{\"ok\": true}");
        assert_eq!(recording.calls(), 2);
    }
}
