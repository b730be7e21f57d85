//! HTTP behaviour of the generation backends against a mock server

use vaultcards_core::backend::{
    create_backend, BackendConfig, GenerationBackend, GenerationRequest, GenerationResponse,
    LmStudioBackend, OllamaBackend,
};
use vaultcards_core::config::{GenerationConfig, Provider};
use vaultcards_core::error::{BackendError, BackendErrorKind};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn config_for(provider: Provider, server: &MockServer) -> GenerationConfig {
    let mut config = GenerationConfig {
        provider,
        base_url: Some(server.uri()),
        max_retries: 3,
        retry_backoff_ms: 5,
        timeout_seconds: 5,
        ..GenerationConfig::default()
    };
    config.resolve();
    config
}

fn request() -> GenerationRequest {
    GenerationRequest {
        prompt: "Make flashcards".to_string(),
        source: "note.md".to_string(),
    }
}

/// Run a blocking generation off the async runtime
async fn generate(config: GenerationConfig) -> Result<GenerationResponse, BackendError> {
    tokio::task::spawn_blocking(move || create_backend(&config).generate(&request()))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ollama_envelope() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/generate"))
        .and(matchers::body_partial_json(serde_json::json!({
            "model": "gemma3",
            "stream": false,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "gemma3",
            "response": "What is ATP? | Energy currency",
            "done": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = generate(config_for(Provider::Ollama, &server)).await.unwrap();
    assert_eq!(response.text, "What is ATP? | Energy currency");
    assert_eq!(response.attempts, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lmstudio_envelope() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Q? | A" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = generate(config_for(Provider::LmStudio, &server))
        .await
        .unwrap();
    assert_eq!(response.text, "Q? | A");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": "Q? | A"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = generate(config_for(Provider::Ollama, &server)).await.unwrap();
    assert_eq!(response.text, "Q? | A");
    assert_eq!(response.attempts, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": "model \"gemma3\" not found"
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = generate(config_for(Provider::Ollama, &server))
        .await
        .unwrap_err();
    assert!(err.is_configuration_error());
    match err.kind {
        BackendErrorKind::Status { code, body } => {
            assert_eq!(code, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("unexpected error kind: {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_server_times_out_and_is_retried() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_secs(3))
                .set_body_json(serde_json::json!({ "response": "Q? | A" })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let config = GenerationConfig {
        timeout_seconds: 1,
        max_retries: 1,
        ..config_for(Provider::Ollama, &server)
    };
    let err = generate(config).await.unwrap_err();

    assert_eq!(err.kind, BackendErrorKind::Timeout);
    assert!(err.is_transient());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_envelope_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"choices\": [oops"))
        .expect(1)
        .mount(&server)
        .await;

    let err = generate(config_for(Provider::LmStudio, &server))
        .await
        .unwrap_err();
    assert_eq!(err.provider, Provider::LmStudio);
    assert!(matches!(err.kind, BackendErrorKind::MalformedEnvelope(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health_check_paths() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "models": [] })))
        .mount(&server)
        .await;

    let ollama = config_for(Provider::Ollama, &server);
    let lmstudio = config_for(Provider::LmStudio, &server);
    let (ollama, lmstudio) = tokio::task::spawn_blocking(move || {
        (
            OllamaBackend::new(BackendConfig::from_config(&ollama)).health_check(),
            LmStudioBackend::new(BackendConfig::from_config(&lmstudio)).health_check(),
        )
    })
    .await
    .unwrap();

    assert!(ollama.is_ok());
    // Nothing mounted at /v1/models
    assert!(lmstudio.unwrap_err().is_configuration_error());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_refused_is_transient() {
    // Reserve a free port, then release it so nothing is listening
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let mut config = GenerationConfig {
        base_url: Some(format!("http://127.0.0.1:{}", port)),
        max_retries: 0,
        ..GenerationConfig::default()
    };
    config.resolve();

    let err = generate(config).await.unwrap_err();
    assert!(err.is_transient(), "unexpected error: {}", err);
}
