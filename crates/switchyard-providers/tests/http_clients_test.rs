//! Provider clients exercised against a local mockito server.

use mockito::Matcher;
use serde_json::json;
use std::time::Duration;
use switchyard_abstraction::{GenerationOptions, Message, ProviderClient, ProviderError, ProviderKind};
use switchyard_providers::{
    AnthropicClient, GeminiClient, OllamaClient, OpenAiCompatibleClient, ProviderConfig,
    ProviderFactory,
};

fn conversation() -> Vec<Message> {
    vec![Message::system("You are terse."), Message::user("Say hello")]
}

#[tokio::test]
async fn test_openai_chat_completion_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "You are terse."},
                {"role": "user", "content": "Say hello"}
            ],
            "max_tokens": 1024
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "choices": [{"message": {"role": "assistant", "content": "Hello, world!"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
            }"#,
        )
        .create_async()
        .await;

    let client = OpenAiCompatibleClient::with_base_url(
        ProviderKind::OpenAi,
        "test-key".to_string(),
        format!("{}/v1", server.url()),
    );
    let reply = client
        .send("gpt-4o-mini", &conversation(), &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(reply.content, "Hello, world!");
    assert_eq!(reply.usage.prompt_tokens, 10);
    assert_eq!(reply.usage.total_tokens, 30);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_openai_401_is_authentication_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error": {"message": "Invalid API key"}}"#)
        .create_async()
        .await;

    let client =
        OpenAiCompatibleClient::with_base_url(ProviderKind::Groq, "bad".to_string(), server.url());
    let err = client
        .send("llama-3.1-8b-instant", &conversation(), &GenerationOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Authentication(ref body) if body.contains("Invalid API key")));
}

#[tokio::test]
async fn test_openai_429_carries_retry_after() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_header("retry-after", "30")
        .with_body("quota exceeded")
        .create_async()
        .await;

    let client =
        OpenAiCompatibleClient::with_base_url(ProviderKind::OpenAi, "k".to_string(), server.url());
    let err = client
        .send("gpt-4o", &conversation(), &GenerationOptions::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
            message: "quota exceeded".to_string(),
        }
    );
}

#[tokio::test]
async fn test_openai_500_is_server_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body("overloaded")
        .create_async()
        .await;

    let client =
        OpenAiCompatibleClient::with_base_url(ProviderKind::OpenAi, "k".to_string(), server.url());
    let err = client
        .send("gpt-4o", &conversation(), &GenerationOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_server_error());
}

#[tokio::test]
async fn test_openai_malformed_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("not json at all")
        .create_async()
        .await;

    let client =
        OpenAiCompatibleClient::with_base_url(ProviderKind::OpenAi, "k".to_string(), server.url());
    let err = client
        .send("gpt-4o", &conversation(), &GenerationOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_anthropic_lifts_system_prompt() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "ant-key")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(json!({
            "model": "claude-3-5-haiku-latest",
            "system": "You are terse.",
            "messages": [{"role": "user", "content": "Say hello"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "content": [{"type": "text", "text": "Hi."}],
                "usage": {"input_tokens": 8, "output_tokens": 2}
            }"#,
        )
        .create_async()
        .await;

    let client = AnthropicClient::with_base_url("ant-key".to_string(), server.url());
    let reply = client
        .send("claude-3-5-haiku-latest", &conversation(), &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(reply.content, "Hi.");
    assert_eq!(reply.usage.total_tokens, 10);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_generate_content() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-1.5-flash:generateContent")
        .match_header("x-goog-api-key", "g-key")
        .match_body(Matcher::PartialJson(json!({
            "systemInstruction": {"parts": [{"text": "You are terse."}]},
            "contents": [{"role": "user", "parts": [{"text": "Say hello"}]}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Hello"}]}}],
                "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 1}
            }"#,
        )
        .create_async()
        .await;

    let client = GeminiClient::with_base_url("g-key".to_string(), server.url());
    let reply = client
        .send("gemini-1.5-flash", &conversation(), &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(reply.content, "Hello");
    assert_eq!(reply.usage.prompt_tokens, 5);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_without_candidates_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/models/gemini-1.5-flash:generateContent")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates": []}"#)
        .create_async()
        .await;

    let client = GeminiClient::with_base_url("g-key".to_string(), server.url());
    let err = client
        .send("gemini-1.5-flash", &conversation(), &GenerationOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_ollama_chat_disables_streaming() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "llama3:8b",
            "stream": false,
            "options": {"num_predict": 1024}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "message": {"role": "assistant", "content": "hey"},
                "done": true,
                "prompt_eval_count": 12,
                "eval_count": 3
            }"#,
        )
        .create_async()
        .await;

    let client = OllamaClient::with_base_url(server.url());
    let reply = client
        .send("llama3:8b", &conversation(), &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(reply.content, "hey");
    assert_eq!(reply.usage.total_tokens, 15);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let client = OllamaClient::with_base_url("http://127.0.0.1:1".to_string())
        .with_timeout(Duration::from_secs(5));
    let err = client
        .send("llama3", &conversation(), &GenerationOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Network(_) | ProviderError::Timeout(_)));
}

#[tokio::test]
async fn test_factory_honours_base_url_override() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer from-config")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"content": "routed"}}]}"#)
        .create_async()
        .await;

    let config = ProviderConfig::new(ProviderKind::OpenAi)
        .with_api_key("from-config".to_string())
        .with_base_url(server.url());
    let client = ProviderFactory::create(&config).unwrap();
    let reply = client
        .send("gpt-4o-mini", &[Message::user("ping")], &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(reply.content, "routed");
    assert_eq!(reply.usage.total_tokens, 0);
    mock.assert_async().await;
}
