//! Chat completions client against a mock provider.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use ai_http_server::generator::{ContentGenerator, GenerationError, Prompt};
use ai_http_server::ChatCompletionsClient;

mod common;
use common::{chat_completion, send_text, spawn_server, start_programmable_backend, test_config};

fn prompt() -> Prompt {
    Prompt {
        system: "You are a web server.".into(),
        user: "GET / HTTP/1.1\r\n\r\n".into(),
    }
}

fn client_for(addr: std::net::SocketAddr) -> ChatCompletionsClient {
    let mut config = test_config();
    config.generator.endpoint = format!("http://{}/v1/chat/completions", addr);
    ChatCompletionsClient::new(&config.generator, &config.retries).unwrap()
}

#[tokio::test]
async fn sends_chat_request_and_returns_content() {
    let seen = Arc::new(Mutex::new(None));
    let captured = Arc::clone(&seen);
    let addr = start_programmable_backend(move |body| {
        *captured.lock().unwrap() = Some(body);
        async { (200, chat_completion("HTTP/1.1 200 OK\r\n\r\nhi")) }
    })
    .await;

    let text = client_for(addr).generate(&prompt()).await.unwrap();
    assert_eq!(text, "HTTP/1.1 200 OK\r\n\r\nhi");

    let body = seen.lock().unwrap().take().unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["model"], "deepseek-chat");
    assert_eq!(json["stream"], false);
    assert_eq!(json["messages"][0]["role"], "system");
    assert_eq!(json["messages"][0]["content"], "You are a web server.");
    assert_eq!(json["messages"][1]["role"], "user");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let addr = start_programmable_backend(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { (401, "{}".to_string()) }
    })
    .await;

    let err = client_for(addr).generate(&prompt()).await.unwrap_err();
    assert_eq!(err, GenerationError::Status(401));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unavailable_provider_is_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let addr = start_programmable_backend(move |_| {
        let count = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if count == 0 {
                (503, "{}".to_string())
            } else {
                (200, chat_completion("recovered"))
            }
        }
    })
    .await;

    let text = client_for(addr).generate(&prompt()).await.unwrap();
    assert_eq!(text, "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retries_stop_at_max_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let addr = start_programmable_backend(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { (500, "{}".to_string()) }
    })
    .await;

    let err = client_for(addr).generate(&prompt()).await.unwrap_err();
    assert_eq!(err, GenerationError::Status(500));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_choices_are_invalid_output() {
    let addr =
        start_programmable_backend(|_| async { (200, r#"{"choices":[]}"#.to_string()) }).await;

    let err = client_for(addr).generate(&prompt()).await.unwrap_err();
    assert!(matches!(err, GenerationError::InvalidOutput(_)));
}

#[tokio::test]
async fn server_serves_provider_content() {
    let addr = start_programmable_backend(|body| async move {
        let page = if body.contains("GET /about") {
            "HTTP/1.1 200 OK\nContent-Type: text/html\n\n<p>About us</p>"
        } else {
            "HTTP/1.1 404 Not Found\n\nmissing"
        };
        (200, chat_completion(page))
    })
    .await;

    let mut config = test_config();
    config.generator.endpoint = format!("http://{}/v1/chat/completions", addr);
    let client = ChatCompletionsClient::new(&config.generator, &config.retries).unwrap();
    let (server, _shutdown, _) = spawn_server(&config, client).await;

    let about = send_text(server, "GET /about HTTP/1.1\r\nHost: site\r\n\r\n").await;
    assert!(about.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(about.ends_with("<p>About us</p>"));

    let missing = send_text(server, "GET /nowhere HTTP/1.1\r\n\r\n").await;
    assert!(missing.starts_with("HTTP/1.1 404 Not Found\r\n"));
}

#[tokio::test]
async fn unreachable_provider_becomes_bad_gateway() {
    let closed = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let (server, _shutdown, _) = spawn_server(&test_config(), client_for(closed)).await;

    let response = send_text(server, "GET / HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 502 Bad Gateway\r\n"));
}
