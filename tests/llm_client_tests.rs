use serde_json::json;
use skinx_server::{
    config::LlmConfig,
    llm::{ChatCompletionRequest, ChatMessage, LlmClient, OpenAiClient},
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> LlmConfig {
    LlmConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        model: "gemini-1.5-pro".to_string(),
        timeout_secs: 5,
        ..LlmConfig::default()
    }
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gemini-1.5-pro",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
    })
}

#[tokio::test]
async fn test_chat_completion_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "gemini-1.5-pro"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("  Hydrate daily.  ")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(config_for(&server)).unwrap();
    let response = client
        .create_chat_completion(ChatCompletionRequest::new(vec![
            ChatMessage::system("You are helpful."),
            ChatMessage::user("Tips for dry skin?"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.id, "chatcmpl-123");
    assert_eq!(response.choices.len(), 1);
    assert_eq!(response.choices[0].message.role, "assistant");
    assert_eq!(response.first_text(), "Hydrate daily.");
    assert_eq!(response.usage.unwrap().total_tokens, 20);
}

#[tokio::test]
async fn test_chat_completion_sends_messages_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("hello")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(config_for(&server)).unwrap();
    let response = client
        .create_chat_completion(ChatCompletionRequest::new(vec![
            ChatMessage::system("sys"),
            ChatMessage::user("hi"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.first_text(), "hello");
}

#[tokio::test]
async fn test_chat_completion_unauthorized_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "message": "API key not valid",
                "type": "invalid_request_error",
                "param": null,
                "code": "invalid_api_key"
            }
        })))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(config_for(&server)).unwrap();
    let result = client
        .create_chat_completion(ChatCompletionRequest::new(vec![ChatMessage::user("hi")]))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_unknown_role_is_rejected_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(config_for(&server)).unwrap();
    let result = client
        .create_chat_completion(ChatCompletionRequest::new(vec![ChatMessage {
            role: "narrator".to_string(),
            content: "hi".to_string(),
        }]))
        .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("Unknown message role"));
}
