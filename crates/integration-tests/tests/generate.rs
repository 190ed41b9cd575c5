//! End-to-end tests for `POST /generate`

mod harness;

use harness::config::ConfigBuilder;
use harness::mock_provider::{ChatReply, MockProvider, TaskOutcome};
use harness::server::TestServer;
use serde_json::{Value, json};

const TASK_MODEL: &str = "MusePublic/489_ckpt_FLUX_1";

async fn serve(mock: &MockProvider) -> TestServer {
    let config = ConfigBuilder::new()
        .with_chat_provider(&mock.base_url(), "test-key")
        .with_task_provider(&mock.base_url(), "test-key")
        .build();

    TestServer::start(config).await.unwrap()
}

async fn error_body(resp: reqwest::Response) -> Value {
    let body: Value = resp.json().await.unwrap();
    body["error"].clone()
}

// -- Chat provider --

#[tokio::test]
async fn reserved_model_returns_attached_image() {
    let mock = MockProvider::builder()
        .chat_reply(ChatReply::AttachedImage("data:image/png;base64,QUJD".to_owned()))
        .start()
        .await
        .unwrap();
    let server = serve(&mock).await;

    let resp = server.generate(json!({ "prompt": "a banana", "model": "nanobanana" })).await;

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "kind": "image", "url": "data:image/png;base64,QUJD" }));
    assert_eq!((mock.chat_count(), mock.submit_count()), (1, 0));
}

#[tokio::test]
async fn omitted_model_uses_chat_provider() {
    let mock = MockProvider::builder()
        .chat_reply(ChatReply::Content("I can only describe it".to_owned()))
        .start()
        .await
        .unwrap();
    let server = serve(&mock).await;

    let resp = server.generate(json!({ "prompt": "a banana" })).await;

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "kind": "text", "content": "I can only describe it" }));
    assert_eq!(mock.chat_count(), 1);
}

#[tokio::test]
async fn empty_chat_content_returns_sentinel_text() {
    let mock = MockProvider::builder()
        .chat_reply(ChatReply::Content(String::new()))
        .start()
        .await
        .unwrap();
    let server = serve(&mock).await;

    let resp = server.generate(json!({ "prompt": "a banana" })).await;

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["content"], "<no valid content returned>");
}

#[tokio::test]
async fn chat_upstream_failure_is_bad_gateway_without_retry() {
    let mock = MockProvider::builder()
        .chat_reply(ChatReply::Error(503))
        .start()
        .await
        .unwrap();
    let server = serve(&mock).await;

    let resp = server.generate(json!({ "prompt": "a banana" })).await;

    assert_eq!(resp.status(), 502);
    let error = error_body(resp).await;
    assert_eq!(error["type"], "upstream_error");
    assert!(error["message"].as_str().unwrap().contains("mock chat failure"));
    assert_eq!(mock.chat_count(), 1);
}

// -- Task provider --

#[tokio::test]
async fn task_model_polls_until_image() {
    let mock = MockProvider::builder()
        .pending_polls(2)
        .task_outcome(TaskOutcome::NestedImage("http://x/img.png".to_owned()))
        .start()
        .await
        .unwrap();
    let server = serve(&mock).await;

    let resp = server
        .generate(json!({ "prompt": "a lighthouse", "model": TASK_MODEL, "size": "1024x1024" }))
        .await;

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "kind": "image", "url": "http://x/img.png" }));
    assert_eq!((mock.submit_count(), mock.poll_count()), (1, 3));
    assert_eq!(mock.chat_count(), 0);
}

#[tokio::test]
async fn flat_output_images_are_accepted() {
    let mock = MockProvider::builder()
        .task_outcome(TaskOutcome::FlatImage("http://y/img.png".to_owned()))
        .start()
        .await
        .unwrap();
    let server = serve(&mock).await;

    let resp = server.generate(json!({ "prompt": "a lighthouse", "model": TASK_MODEL })).await;

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["url"], "http://y/img.png");
}

#[tokio::test]
async fn failed_task_stops_polling_and_reports() {
    let mock = MockProvider::builder()
        .pending_polls(1)
        .task_outcome(TaskOutcome::Failed("content policy violation".to_owned()))
        .start()
        .await
        .unwrap();
    let server = serve(&mock).await;

    let resp = server.generate(json!({ "prompt": "a lighthouse", "model": TASK_MODEL })).await;

    assert_eq!(resp.status(), 502);
    let error = error_body(resp).await;
    assert_eq!(error["type"], "task_failed");
    assert_eq!(error["message"], "content policy violation");
    assert_eq!(mock.poll_count(), 2);
}

#[tokio::test]
async fn stuck_task_times_out_after_budget() {
    let mock = MockProvider::builder()
        .task_outcome(TaskOutcome::Stuck)
        .start()
        .await
        .unwrap();
    let server = serve(&mock).await;

    let resp = server.generate(json!({ "prompt": "a lighthouse", "model": TASK_MODEL })).await;

    assert_eq!(resp.status(), 504);
    let error = error_body(resp).await;
    assert_eq!(error["type"], "timeout");
    assert_eq!(mock.poll_count(), 10);
}

#[tokio::test]
async fn per_request_polling_budget() {
    let mock = MockProvider::builder()
        .task_outcome(TaskOutcome::Stuck)
        .start()
        .await
        .unwrap();
    let server = serve(&mock).await;

    let resp = server
        .generate(json!({
            "prompt": "a lighthouse",
            "model": TASK_MODEL,
            "timeout": 0.03,
            "poll_interval": 0.01
        }))
        .await;

    assert_eq!(resp.status(), 504);
    assert_eq!(mock.poll_count(), 3);
}

// -- Input and credentials --

#[tokio::test]
async fn empty_prompt_makes_no_upstream_calls() {
    let mock = MockProvider::builder().start().await.unwrap();
    let server = serve(&mock).await;

    for body in [
        json!({ "prompt": "" }),
        json!({ "prompt": "   ", "model": TASK_MODEL }),
        json!({ "model": TASK_MODEL }),
    ] {
        let resp = server.generate(body).await;
        assert_eq!(resp.status(), 400);
        assert_eq!(error_body(resp).await["type"], "invalid_input");
    }

    assert_eq!(mock.total_calls(), 0);
}

#[tokio::test]
async fn missing_key_is_server_error_without_upstream_calls() {
    let mock = MockProvider::builder().start().await.unwrap();
    let config = ConfigBuilder::new().with_keyless_providers(&mock.base_url()).build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server.generate(json!({ "prompt": "a lighthouse", "model": TASK_MODEL })).await;

    assert_eq!(resp.status(), 500);
    assert_eq!(error_body(resp).await["type"], "missing_credential");
    assert_eq!(mock.total_calls(), 0);
}

#[tokio::test]
async fn provider_key_header_overrides_configured_key() {
    let mock = MockProvider::builder().api_key("byok-key").start().await.unwrap();
    let server = serve(&mock).await;

    let resp = server
        .client()
        .post(server.url("/generate"))
        .header("X-Provider-API-Key", "byok-key")
        .json(&json!({ "prompt": "a lighthouse", "model": TASK_MODEL }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);

    let resp = server.generate(json!({ "prompt": "a lighthouse", "model": TASK_MODEL })).await;
    assert_eq!(resp.status(), 502);
}

#[tokio::test]
async fn malformed_json_is_invalid_input() {
    let mock = MockProvider::builder().start().await.unwrap();
    let server = serve(&mock).await;

    let resp = server
        .client()
        .post(server.url("/generate"))
        .header("Content-Type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    assert_eq!(error_body(resp).await["type"], "invalid_input");
}

#[tokio::test]
async fn concurrent_requests_are_isolated() {
    let mock = MockProvider::builder()
        .chat_reply(ChatReply::AttachedImage("data:image/png;base64,QUJD".to_owned()))
        .task_outcome(TaskOutcome::FlatImage("http://y/img.png".to_owned()))
        .start()
        .await
        .unwrap();
    let server = std::sync::Arc::new(serve(&mock).await);

    let mut tasks = tokio::task::JoinSet::new();

    for i in 0..12 {
        let server = server.clone();
        tasks.spawn(async move {
            let model = if i % 2 == 0 { "nanobanana" } else { TASK_MODEL };
            let resp = server.generate(json!({ "prompt": format!("prompt {i}"), "model": model })).await;
            (i, resp.status().as_u16(), resp.json::<Value>().await.unwrap())
        });
    }

    while let Some(result) = tasks.join_next().await {
        let (i, status, body) = result.unwrap();
        assert_eq!(status, 200);
        let expected = if i % 2 == 0 { "data:image/png;base64,QUJD" } else { "http://y/img.png" };
        assert_eq!(body["url"], expected);
    }

    assert_eq!((mock.chat_count(), mock.submit_count()), (6, 6));
}
