use super::types::*;
use crate::{Result, config::LlmConfig};
use async_openai::{Client, config::OpenAIConfig, types as openai_types};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse>;
}

/// Client for any OpenAI-compatible chat completion endpoint. Gemini is
/// reached through its `/v1beta/openai` compatibility layer.
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let mut openai_config = OpenAIConfig::new().with_api_key(config.api_key);

        if !config.base_url.is_empty() {
            openai_config = openai_config.with_api_base(config.base_url);
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let client = Client::with_config(openai_config).with_http_client(http_client);

        Ok(Self {
            client,
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        debug!(
            "Creating chat completion with {} messages",
            request.messages.len()
        );

        let mut messages = Vec::new();
        for msg in request.messages {
            messages.push(msg.to_openai_message()?);
        }

        let mut request_builder = openai_types::CreateChatCompletionRequestArgs::default();
        request_builder.model(&self.model).messages(messages);

        if let Some(temperature) = request.temperature.or(self.temperature) {
            request_builder.temperature(temperature);
        }

        if let Some(max_tokens) = request.max_tokens.or(self.max_tokens) {
            request_builder.max_tokens(max_tokens);
        }

        let openai_request = request_builder.build()?;

        let response = self.client.chat().create(openai_request).await?;

        debug!(
            "Received chat completion response with {} choices",
            response.choices.len()
        );

        let choices: Vec<Choice> = response
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: ChatMessage::assistant(choice.message.content.unwrap_or_default()),
                finish_reason: choice.finish_reason.map(|fr| format!("{fr:?}")),
            })
            .collect();

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ChatCompletionResponse {
            id: response.id,
            model: response.model,
            choices,
            usage,
        })
    }
}
