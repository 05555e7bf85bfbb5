//! Functional tests for the resolve → probe → forward proxy path

use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use serde_json::Value;
use service_gateway::{api::routes::create_router, config::Settings, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{any, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_app(settings: Settings) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(settings).unwrap());
    (create_router(state.clone()), state)
}

async fn healthy_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn error_code(response: Response) -> Value {
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    body["error"]["code"].clone()
}

#[tokio::test]
async fn test_unregistered_service_returns_503_without_network_call() {
    let backend = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let (app, state) = create_test_app(Settings::default());
    state.registry.register("other", &backend.uri()).unwrap();

    let response = app.oneshot(get("/api/files/abc123")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_code(response).await, "service_not_registered");
}

#[tokio::test]
async fn test_failed_probe_deregisters_and_returns_503() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(path("/abc123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let (app, state) = create_test_app(Settings::default());
    state.registry.register("files", &backend.uri()).unwrap();

    let response = app.clone().oneshot(get("/api/files/abc123")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_code(response).await, "health_check_failed");
    assert!(state.registry.is_empty());

    // Second call short-circuits on the registry miss, no second probe
    let response = app.oneshot(get("/api/files/abc123")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_code(response).await, "service_not_registered");
}

#[tokio::test]
async fn test_unreachable_backend_returns_503() {
    let (app, state) = create_test_app(Settings::default());
    state.registry.register("files", "http://127.0.0.1:1").unwrap();

    let response = app.oneshot(get("/api/files/abc123")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(state.registry.resolve("files").is_err());
}

#[tokio::test]
async fn test_backend_status_and_body_relayed_verbatim() {
    let cases = [
        (201, r#"{"id": 7,  "created":true}"#),
        (404, r#"{"error":"no such item"}"#),
        (500, r#"{ "error" : "boom", "trace": [1, 2.50, 3] }"#),
    ];

    for (status, body) in cases {
        let backend = healthy_backend().await;
        Mock::given(method("POST"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(status).set_body_raw(body, "application/json"))
            .expect(1)
            .mount(&backend)
            .await;

        let (app, state) = create_test_app(Settings::default());
        state.registry.register("store", &backend.uri()).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/store/items")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"widget"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), status);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_bytes(response).await, body.as_bytes());
    }
}

#[tokio::test]
async fn test_path_and_query_rewritten() {
    let backend = healthy_backend().await;
    Mock::given(method("GET"))
        .and(path("/abc123"))
        .and(query_param("x", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("file contents"))
        .expect(1)
        .mount(&backend)
        .await;

    let (app, state) = create_test_app(Settings::default());
    state.registry.register("files", &backend.uri()).unwrap();

    let response = app.oneshot(get("/api/files/abc123?x=1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"file contents");
}

#[tokio::test]
async fn test_method_body_and_marker_header_forwarded() {
    let payload = "{\n  \"keep\":   \"this   spacing\"\n}";

    let backend = healthy_backend().await;
    Mock::given(method("PUT"))
        .and(path("/users/42"))
        .and(header("x-forwarded-by", "service-gateway"))
        .and(header("authorization", "Bearer token-1"))
        .and(body_string(payload))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&backend)
        .await;

    let (app, state) = create_test_app(Settings::default());
    state.registry.register("users", &backend.uri()).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/users/users/42")
                .header(CONTENT_TYPE, "application/json")
                .header("authorization", "Bearer token-1")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_forward_timeout_returns_502() {
    let backend = healthy_backend().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&backend)
        .await;

    let mut settings = Settings::default();
    settings.forward.timeout_ms = 200;
    let (app, state) = create_test_app(settings);
    state.registry.register("reports", &backend.uri()).unwrap();

    let response = app.oneshot(get("/api/reports/slow")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(response).await, "bad_gateway");
    // A forward failure is not a probe failure: the entry stays
    assert!(state.registry.resolve("reports").is_ok());
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let backend = healthy_backend().await;
    Mock::given(path("/upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let mut settings = Settings::default();
    settings.forward.max_body_bytes = 16;
    let (app, state) = create_test_app(settings);
    state.registry.register("files", &backend.uri()).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/files/upload")
                .body(Body::from(vec![b'a'; 64]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_trailing_slash_forwarded_to_backend_root() {
    let backend = healthy_backend().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("index"))
        .expect(1)
        .mount(&backend)
        .await;

    let (app, state) = create_test_app(Settings::default());
    state.registry.register("files", &backend.uri()).unwrap();

    let response = app.oneshot(get("/api/files/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"index");
}

#[tokio::test]
async fn test_head_keeps_backend_content_length() {
    let backend = healthy_backend().await;
    Mock::given(method("HEAD"))
        .and(path("/doc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(1234)))
        .expect(1)
        .mount(&backend)
        .await;

    let (app, state) = create_test_app(Settings::default());
    state.registry.register("docs", &backend.uri()).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("HEAD")
                .uri("/api/docs/doc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_LENGTH], "1234");
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_preflight_and_cors_headers_left_to_backend() {
    let backend = healthy_backend().await;
    Mock::given(method("OPTIONS"))
        .and(path("/items"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("access-control-allow-origin", "https://app.example")
                .insert_header("access-control-allow-methods", "GET"),
        )
        .expect(1)
        .mount(&backend)
        .await;

    let (app, state) = create_test_app(Settings::default());
    state.registry.register("store", &backend.uri()).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/store/items")
                .header("origin", "https://other.example")
                .header("access-control-request-method", "DELETE")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "https://app.example");
    assert_eq!(headers["access-control-allow-methods"], "GET");
    assert!(headers.get("vary").is_none());
}
