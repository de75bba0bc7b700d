use axum::{
    body::Body,
    extract::Path,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use request_snapshot::{
    emitter::render_text, LogEmitter, MultiHandler, OutputFormat, RequestId, RequestLoggerConfig,
    RequestLoggerLayer, RequestSnapshot, SnapshotHandler, REDACTED,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    io::{self, Write},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::sleep;
use tower::{Layer, Service, ServiceExt};

/// Test handler that collects all snapshots for verification
#[derive(Debug, Clone, Default)]
struct TestHandler {
    snapshots: Arc<Mutex<Vec<RequestSnapshot>>>,
}

impl TestHandler {
    fn get_snapshots(&self) -> Vec<RequestSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl SnapshotHandler for TestHandler {
    fn handle_snapshot(&self, snapshot: &RequestSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}

/// In-memory sink standing in for stdout
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DownstreamError {
    code: u32,
}

impl std::fmt::Display for DownstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "downstream failed with code {}", self.code)
    }
}

impl std::error::Error for DownstreamError {}

// Test server handlers
async fn health_handler(request_id: RequestId) -> impl IntoResponse {
    Json(json!({ "message": "API is running", "request_id": request_id }))
}

async fn user_handler(Path(id): Path<String>, request_id: RequestId) -> impl IntoResponse {
    Json(json!({ "user_id": id, "request_id": request_id }))
}

async fn delayed_handler() -> impl IntoResponse {
    sleep(Duration::from_millis(100)).await;
    "Delayed response"
}

fn create_test_app<H: SnapshotHandler>(config: RequestLoggerConfig, handler: H) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/user/{id}", get(user_handler))
        .route("/delayed", get(delayed_handler))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(RequestLoggerLayer::new(config, handler))
}

fn authorization() -> HeaderName {
    HeaderName::from_static("authorization")
}

#[tokio::test]
async fn test_health_check_snapshot() {
    let handler = TestHandler::default();
    let app = create_test_app(RequestLoggerConfig::default(), handler.clone());
    let server = axum_test::TestServer::new(app).unwrap();

    let response = server.get("/api/v1/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();

    let snapshots = handler.get_snapshots();
    assert_eq!(snapshots.len(), 1);

    let snapshot = &snapshots[0];
    assert!(!snapshot.request_id.is_empty());
    assert_eq!(body["request_id"], snapshot.request_id.as_str());
    assert_eq!(snapshot.http_method, "GET");
    assert_eq!(snapshot.url, "/api/v1/health");
    assert_eq!(snapshot.scheme, "http");
    assert!(snapshot.query_params.is_empty());
    assert!(!render_text(snapshot).contains("Query Parameters:"));
}

#[tokio::test]
async fn test_sensitive_headers_redacted_in_output() {
    let buffer = SharedBuffer::default();
    let handler = TestHandler::default();
    let multi = MultiHandler::new()
        .with(LogEmitter::new(buffer.clone()))
        .with(handler.clone());
    let app = create_test_app(RequestLoggerConfig::default(), multi);
    let server = axum_test::TestServer::new(app).unwrap();

    let response = server
        .get("/api/v1/health")
        .add_header(authorization(), HeaderValue::from_static("Bearer xyz"))
        .add_header(
            HeaderName::from_static("accept"),
            HeaderValue::from_static("application/json"),
        )
        .add_header(
            HeaderName::from_static("x-authorization-extra"),
            HeaderValue::from_static("also-secret"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let snapshots = handler.get_snapshots();
    assert_eq!(snapshots.len(), 1);
    let headers = &snapshots[0].headers;
    assert_eq!(headers["authorization"], REDACTED);
    assert_eq!(headers["x-authorization-extra"], REDACTED);
    assert_eq!(headers["accept"], "application/json");

    let output = buffer.contents();
    assert!(output.contains("  authorization: REDACTED\n"));
    assert!(output.contains("  accept: application/json\n"));
    assert!(!output.contains("Bearer xyz"));
    assert!(!output.contains("also-secret"));
    assert_eq!(output.matches("Request ID: ").count(), 1);
}

#[tokio::test]
async fn test_redaction_disabled() {
    let handler = TestHandler::default();
    let config = RequestLoggerConfig {
        redact_sensitive: false,
        ..Default::default()
    };
    let app = create_test_app(config, handler.clone());
    let server = axum_test::TestServer::new(app).unwrap();

    server
        .get("/api/v1/health")
        .add_header(authorization(), HeaderValue::from_static("Bearer xyz"))
        .await;

    let snapshots = handler.get_snapshots();
    assert_eq!(snapshots[0].headers["authorization"], "Bearer xyz");
}

#[tokio::test]
async fn test_query_params_captured() {
    let handler = TestHandler::default();
    let app = create_test_app(RequestLoggerConfig::default(), handler.clone());
    let server = axum_test::TestServer::new(app).unwrap();

    let response = server
        .get("/api/v1/user/42")
        .add_query_param("fields", "name")
        .add_query_param("verbose", "true")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["user_id"], "42");

    let snapshots = handler.get_snapshots();
    assert_eq!(snapshots.len(), 1);
    let snapshot = &snapshots[0];
    assert_eq!(snapshot.query_params["fields"], "name");
    assert_eq!(snapshot.query_params["verbose"], "true");
    assert!(snapshot.url.starts_with("/api/v1/user/42?"));
    assert!(render_text(snapshot).contains("Query Parameters:\n  fields: name\n  verbose: true\n"));
}

#[tokio::test]
async fn test_timing_accuracy() {
    let handler = TestHandler::default();
    let app = create_test_app(RequestLoggerConfig::default(), handler.clone());
    let server = axum_test::TestServer::new(app).unwrap();

    let response = server.get("/delayed").await;
    assert_eq!(response.text(), "Delayed response");

    let snapshots = handler.get_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].latency >= Duration::from_millis(90));
    assert!(snapshots[0].latency < Duration::from_secs(5));
}

#[tokio::test]
async fn test_unmatched_route_passthrough() {
    let handler = TestHandler::default();
    let app = create_test_app(RequestLoggerConfig::default(), handler.clone());
    let server = axum_test::TestServer::new(app).unwrap();

    let response = server.get("/missing").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let snapshots = handler.get_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].url, "/missing");
}

#[tokio::test]
async fn test_multiple_concurrent_requests() {
    let handler = TestHandler::default();
    let app = create_test_app(RequestLoggerConfig::default(), handler.clone());
    let server = Arc::new(axum_test::TestServer::new(app).unwrap());

    use futures::future::join_all;

    let futures: Vec<_> = (0..20)
        .map(|i| {
            let server = server.clone();
            async move { server.get(&format!("/api/v1/user/{i}")).await }
        })
        .collect();
    let responses = join_all(futures).await;

    let mut response_ids = std::collections::HashSet::new();
    for response in &responses {
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert!(response_ids.insert(body["request_id"].as_str().unwrap().to_string()));
    }

    let snapshots = handler.get_snapshots();
    assert_eq!(snapshots.len(), 20);
    let snapshot_ids: std::collections::HashSet<_> =
        snapshots.iter().map(|s| s.request_id.clone()).collect();
    assert_eq!(snapshot_ids, response_ids);
}

#[tokio::test]
async fn test_json_output_format() {
    let buffer = SharedBuffer::default();
    let emitter = LogEmitter::new(buffer.clone()).with_format(OutputFormat::Json);
    let app = create_test_app(RequestLoggerConfig::default(), emitter);
    let server = axum_test::TestServer::new(app).unwrap();

    server
        .get("/api/v1/health")
        .add_header(authorization(), HeaderValue::from_static("Bearer xyz"))
        .await;

    let output = buffer.contents();
    let json_body = output
        .strip_prefix("Request Data (JSON):\n")
        .expect("JSON prefix line");
    let value: Value = serde_json::from_str(json_body.trim_end()).unwrap();
    assert_eq!(value["http_method"], "GET");
    assert_eq!(value["url"], "/api/v1/health");
    assert_eq!(value["headers"]["authorization"], REDACTED);
    assert!(value["latency"].is_string());
}

#[tokio::test]
async fn test_downstream_error_passthrough() {
    let handler = TestHandler::default();
    let layer = RequestLoggerLayer::new(RequestLoggerConfig::default(), handler.clone());
    let service = layer.layer(tower::service_fn(|_request: Request<Body>| async {
        Err::<Response, _>(DownstreamError { code: 7 })
    }));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/user")
        .header("content-type", "application/json")
        .header("content-length", "2")
        .body(Body::from("{}"))
        .unwrap();

    let error = service.oneshot(request).await.unwrap_err();
    assert_eq!(error, DownstreamError { code: 7 });

    let snapshots = handler.get_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].http_method, "POST");
    assert_eq!(snapshots[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(snapshots[0].content_length.as_deref(), Some("2"));
}

#[tokio::test]
async fn test_request_id_visible_to_downstream() {
    let handler = TestHandler::default();

    let layer = RequestLoggerLayer::new(RequestLoggerConfig::default(), handler.clone());
    let service = layer.layer(tower::service_fn(|request: Request<Body>| async move {
        let id = request
            .extensions()
            .get::<RequestId>()
            .map(RequestId::to_string)
            .unwrap_or_default();
        Ok::<_, Infallible>(Response::new(Body::from(id)))
    }));

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = service.oneshot(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let seen = String::from_utf8(body.to_vec()).unwrap();

    let snapshots = handler.get_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert!(!seen.is_empty());
    assert_eq!(snapshots[0].request_id, seen);
}

#[tokio::test]
async fn test_abandoned_request_still_emitted() {
    let handler = TestHandler::default();
    let layer = RequestLoggerLayer::new(RequestLoggerConfig::default(), handler.clone());
    let mut service = layer.layer(tower::service_fn(|_request: Request<Body>| {
        futures::future::pending::<Result<Response, Infallible>>()
    }));

    let request = Request::builder()
        .uri("/slow?attempt=1")
        .body(Body::empty())
        .unwrap();
    let future = service.ready().await.unwrap().call(request);

    let outcome = tokio::time::timeout(Duration::from_millis(50), future).await;
    assert!(outcome.is_err());

    let snapshots = handler.get_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].url, "/slow?attempt=1");
    assert_eq!(snapshots[0].query_params["attempt"], "1");
}

#[tokio::test]
async fn test_client_ip_from_trusted_header() {
    let handler = TestHandler::default();
    let config = RequestLoggerConfig {
        client_ip_header: Some("x-forwarded-for".to_string()),
        ..Default::default()
    };
    let app = create_test_app(config, handler.clone());
    let server = axum_test::TestServer::new(app).unwrap();

    server
        .get("/api/v1/health")
        .add_header(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("198.51.100.7, 10.0.0.2"),
        )
        .await;

    let snapshots = handler.get_snapshots();
    assert_eq!(snapshots[0].ip_address, "198.51.100.7");
}
