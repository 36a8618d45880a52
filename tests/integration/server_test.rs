// HTTP surface tests, driven through the router without a socket

use crate::common::create_fixture;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use flowexchange::{
    platform,
    server::{router, EXCHANGE_PATH},
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn post(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(EXCHANGE_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_exchange_answers_with_encrypted_text() {
    let fixture = create_fixture();
    let (sealed, body) = fixture.seal(&json!({"version": "3.0", "action": "ping"}));

    let (status, content_type, text) =
        body_text(router(fixture.orchestrator.clone()), post(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/plain"));
    let opened: Value = platform::open_response(&text, &sealed.session_key, &sealed.iv).unwrap();
    assert_eq!(opened["data"]["status"], "active");
}

#[tokio::test]
async fn test_undecryptable_request_is_misdirected() {
    let fixture = create_fixture();
    let (mut sealed, _) = fixture.seal(&json!({"version": "3.0", "action": "ping"}));
    let last = sealed.envelope.ciphertext.len() - 1;
    sealed.envelope.ciphertext[last] ^= 0x80;
    let body = serde_json::to_vec(&sealed.envelope.to_wire()).unwrap();

    let (status, _, text) = body_text(router(fixture.orchestrator.clone()), post(body)).await;

    assert_eq!(status, StatusCode::MISDIRECTED_REQUEST);
    assert_eq!(text, "Unable to decrypt request");
}

#[tokio::test]
async fn test_malformed_body_is_misdirected() {
    let fixture = create_fixture();

    let (status, _, _) = body_text(
        router(fixture.orchestrator.clone()),
        post(b"{\"hello\": \"world\"}".to_vec()),
    )
    .await;

    assert_eq!(status, StatusCode::MISDIRECTED_REQUEST);
}

#[tokio::test]
async fn test_health() {
    let fixture = create_fixture();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, _, text) = body_text(router(fixture.orchestrator.clone()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "ok");
}
