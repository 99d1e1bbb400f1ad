//! `OpenRouterClient` against a local mock of the completion API.

use std::time::Duration;

use mockito::Matcher;
use serde_json::json;
use sqlrelay_core::{
    CompletionBackend, CompletionConfig, Conversation, OpenRouterClient, PromptComposer, RelayError,
};

const API_KEY: &str = "sk-or-test-0123456789";
const PATH: &str = "/api/v1/chat/completions";

fn client_for(base_url: String, timeout: Duration) -> OpenRouterClient {
    let mut cfg = CompletionConfig::new(API_KEY);
    cfg.base_url = base_url;
    cfg.timeout = timeout;
    cfg.referer = Some("http://localhost:3000".into());
    cfg.title = Some("SQL Financial Assistant".into());
    OpenRouterClient::new(cfg).expect("client builds")
}

fn conversation() -> Conversation {
    PromptComposer::new()
        .compose("total active loans per branch", &[], None)
        .expect("valid message")
}

async fn complete_with_body(status: usize, body: &str) -> Result<String, RelayError> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;
    let client = client_for(format!("{}/api/v1", server.url()), Duration::from_secs(5));
    client.complete(&conversation()).await
}

#[tokio::test]
async fn sends_expected_request_and_returns_first_choice() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("authorization", format!("Bearer {API_KEY}").as_str())
        .match_header("http-referer", "http://localhost:3000")
        .match_header("x-title", "SQL Financial Assistant")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({
                "model": "deepseek/deepseek-r1:free",
                "temperature": 0.3,
                "max_tokens": 800
            })),
            Matcher::Regex(r#""role":"user","content":"total active loans per branch""#.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"SELECT branch_id, COUNT(*) FROM loans WHERE status = 'active' GROUP BY branch_id;"}}]}"#)
        .create_async()
        .await;

    let client = client_for(format!("{}/api/v1", server.url()), Duration::from_secs(5));
    let reply = client.complete(&conversation()).await.expect("completion succeeds");

    assert!(reply.starts_with("SELECT branch_id"));
    mock.assert_async().await;
}

#[tokio::test]
async fn empty_body_is_reported() {
    let err = complete_with_body(200, "").await.unwrap_err();
    assert!(matches!(err, RelayError::UpstreamEmpty));
}

#[tokio::test]
async fn non_json_body_reports_upstream_status() {
    let err = complete_with_body(503, "upstream overloaded").await.unwrap_err();
    assert!(matches!(err, RelayError::UpstreamMalformed { status: 503 }));
}

#[tokio::test]
async fn embedded_error_is_reported() {
    let err = complete_with_body(401, r#"{"error":{"message":"No auth credentials found","code":401}}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::UpstreamError { ref message } if message == "No auth credentials found"));
}

#[tokio::test]
async fn no_choices_is_reported() {
    let err = complete_with_body(200, r#"{"id":"gen-1","choices":[]}"#).await.unwrap_err();
    assert!(matches!(err, RelayError::UpstreamNoChoices));
}

#[tokio::test]
async fn silent_upstream_times_out() {
    // Accept connections but never answer.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hold = tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });

    let client = client_for(format!("http://{addr}/api/v1"), Duration::from_millis(300));
    let err = client.complete(&conversation()).await.unwrap_err();
    assert!(matches!(err, RelayError::UpstreamTimeout), "got {err:?}");

    hold.abort();
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    // Grab a free port, then release it so nothing is listening there.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let client = client_for(format!("http://{addr}/api/v1"), Duration::from_secs(5));
    let err = client.complete(&conversation()).await.unwrap_err();
    assert!(matches!(err, RelayError::UpstreamUnreachable), "got {err:?}");
}
