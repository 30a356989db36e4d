mod parser;
mod prompts;

pub use parser::{
    AdviceResponse, AdviceSection, ERROR_CONTENT, ERROR_KEY, ERROR_TITLE, parse_advice,
};
pub use prompts::{ADVICE_TOPICS, AdviceTopic, CHAT_SYSTEM_PROMPT, advice_prompt, expected_keys};

use crate::{
    Error, Result,
    llm::{ChatCompletionRequest, ChatMessage, LlmClient},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info};

pub const CHAT_FALLBACK_REPLY: &str = "Sorry, I ran into a problem. Please try again later.";

/// Talks to the hosted text generator. Every call is bounded by `timeout`;
/// failures never escape to the caller.
#[derive(Clone)]
pub struct AdviceGenerator {
    llm_client: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl AdviceGenerator {
    pub fn new(llm_client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self {
            llm_client,
            timeout,
        }
    }

    /// Raw structured-advice text for a condition, or `None` when the service
    /// failed, timed out or answered with nothing.
    pub async fn generate_advice(&self, condition: &str) -> Option<String> {
        let request = ChatCompletionRequest::new(vec![ChatMessage::user(advice_prompt(condition))]);

        match self.complete(request).await {
            Ok(text) => {
                debug!("Advice raw response for '{}': {:?}", condition, text);
                Some(text)
            }
            Err(e) => {
                error!("Advice generation failed for '{}': {}", condition, e);
                None
            }
        }
    }

    /// Free-text skincare chat. Falls back to [`CHAT_FALLBACK_REPLY`].
    pub async fn chat(&self, message: &str) -> String {
        let request = ChatCompletionRequest::new(vec![
            ChatMessage::system(CHAT_SYSTEM_PROMPT),
            ChatMessage::user(message),
        ]);

        match self.complete(request).await {
            Ok(reply) => {
                info!("Chat reply generated ({} chars)", reply.len());
                reply
            }
            Err(e) => {
                error!("Chat generation failed: {}", e);
                CHAT_FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn complete(&self, request: ChatCompletionRequest) -> Result<String> {
        let response = tokio::time::timeout(
            self.timeout,
            self.llm_client.create_chat_completion(request),
        )
        .await
        .map_err(|_| {
            Error::llm(format!(
                "no response within {} ms",
                self.timeout.as_millis()
            ))
        })??;

        let text = response.first_text();
        if text.is_empty() {
            return Err(Error::llm("empty response"));
        }
        Ok(text)
    }
}
