//! Generator gateway tests against a mocked chat-completions API

use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sage::generator::{GenerateError, GeneratorConfig, QuoteGenerator};
use sage::models::Origin;

fn config_for(server: &MockServer) -> GeneratorConfig {
    GeneratorConfig {
        api_key: Some("test-key".to_string()),
        api_url: server.uri(),
        model: "deepseek-chat".to_string(),
        timeout_secs: 5,
        temperature: 1.0,
        max_tokens: 300,
    }
}

fn chat_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [
            { "message": { "role": "assistant", "content": content } }
        ]
    })
}

#[tokio::test]
async fn generates_quote_from_json_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(bearer_token("test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
            r#"{"quote": "Rust is forged in the compiler's fire.", "author": "The Borrow Sage", "hashtags": ["rust", "craft"]}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let generator = QuoteGenerator::new(config_for(&server)).unwrap();
    let quote = generator.generate(Some("craft"), None).await.unwrap();

    assert_eq!(quote.text, "Rust is forged in the compiler's fire.");
    assert_eq!(quote.attribution.as_deref(), Some("The Borrow Sage"));
    assert_eq!(quote.tags, vec!["rust", "craft"]);
    assert_eq!(quote.origin, Origin::Generated);
    assert_eq!(quote.category.as_deref(), Some("craft"));
    assert_eq!(quote.generator_model.as_deref(), Some("deepseek-chat"));
}

#[tokio::test]
async fn tolerates_fenced_markdown_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
            "Sure! Here is your quote:\n```json\n{\"quote\": \"Slow is smooth.\", \"author\": \"Range Master\", \"hashtags\": [\"calm\"]}\n```",
        )))
        .mount(&server)
        .await;

    let generator = QuoteGenerator::new(config_for(&server)).unwrap();
    let quote = generator.generate(None, None).await.unwrap();
    assert_eq!(quote.text, "Slow is smooth.");
}

#[tokio::test]
async fn server_error_is_typed_and_recoverable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let generator = QuoteGenerator::new(config_for(&server)).unwrap();
    let err = generator.generate(None, None).await.unwrap_err();

    match err {
        GenerateError::Status { status, ref body } => {
            assert_eq!(status, 503);
            assert!(body.contains("overloaded"));
        }
        other => panic!("expected Status error, got {other:?}"),
    }
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn empty_model_output_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("   ")))
        .mount(&server)
        .await;

    let generator = QuoteGenerator::new(config_for(&server)).unwrap();
    let err = generator.generate(None, None).await.unwrap_err();
    assert!(matches!(err, GenerateError::EmptyResponse));
}

#[tokio::test]
async fn disabled_gateway_makes_no_requests() {
    let server = MockServer::start().await;
    // Any request against this server would fail the expectation
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = GeneratorConfig {
        api_key: None,
        ..config_for(&server)
    };
    let generator = QuoteGenerator::new(config).unwrap();

    let err = generator.generate(None, None).await.unwrap_err();
    assert!(matches!(err, GenerateError::Disabled));
    server.verify().await;
}
