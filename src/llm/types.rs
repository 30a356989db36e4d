use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn to_openai_message(&self) -> Result<ChatCompletionRequestMessage, crate::Error> {
        match self.role.as_str() {
            "system" => {
                let msg = ChatCompletionRequestSystemMessageArgs::default()
                    .content(ChatCompletionRequestSystemMessageContent::Text(
                        self.content.clone(),
                    ))
                    .build()
                    .map_err(|e| {
                        crate::Error::llm(format!("Failed to build system message: {}", e))
                    })?;
                Ok(msg.into())
            }
            "user" => {
                let msg = ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Text(
                        self.content.clone(),
                    ))
                    .build()
                    .map_err(|e| {
                        crate::Error::llm(format!("Failed to build user message: {}", e))
                    })?;
                Ok(msg.into())
            }
            "assistant" => {
                let msg = ChatCompletionRequestAssistantMessageArgs::default()
                    .content(ChatCompletionRequestAssistantMessageContent::Text(
                        self.content.clone(),
                    ))
                    .build()
                    .map_err(|e| {
                        crate::Error::llm(format!("Failed to build assistant message: {}", e))
                    })?;
                Ok(msg.into())
            }
            _ => Err(crate::Error::llm(format!(
                "Unknown message role: {}",
                self.role
            ))),
        }
    }
}

impl ChatCompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: None,
            temperature: None,
        }
    }
}

impl ChatCompletionResponse {
    /// Text of the first choice, trimmed. Empty when the service returned no choices.
    pub fn first_text(&self) -> String {
        self.choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .unwrap_or_default()
    }
}
