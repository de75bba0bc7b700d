//! # request-snapshot
//!
//! An Axum middleware that captures a diagnostic snapshot of every request (method, URL,
//! headers, query parameters, client metadata and latency) and emits it once the request has
//! been handled, with credential-bearing header values redacted.
//!
//! ## Features
//!
//! - **Redaction by default**: headers whose names contain a sensitive pattern are logged as
//!   `REDACTED`
//! - **Typed request IDs**: every request gets a [`RequestId`] that handlers can extract
//! - **Pluggable output**: text or JSON on stdout via [`LogEmitter`], `tracing` events via
//!   [`TracingHandler`], or any custom [`SnapshotHandler`]
//! - **Transparent**: the inner service's response or error is returned untouched
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::get, Json, Router};
//! use request_snapshot::{RequestId, RequestLoggerConfig, RequestLoggerLayer};
//! use serde_json::{json, Value};
//!
//! async fn health(request_id: RequestId) -> Json<Value> {
//!     Json(json!({ "message": "API is running", "request_id": request_id }))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .route("/api/v1/health", get(health))
//!         .layer(RequestLoggerLayer::stdout(RequestLoggerConfig::default()));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! ## Custom Handlers
//!
//! Implement the [`SnapshotHandler`] trait to send snapshots somewhere else:
//!
//! ```rust
//! use request_snapshot::{RequestSnapshot, SnapshotHandler};
//!
//! #[derive(Debug)]
//! struct SlowRequestHandler;
//!
//! impl SnapshotHandler for SlowRequestHandler {
//!     fn handle_snapshot(&self, snapshot: &RequestSnapshot) {
//!         if snapshot.latency.as_millis() > 1000 {
//!             eprintln!("SLOW REQUEST: {} {} took {}", snapshot.http_method, snapshot.url,
//!                       snapshot.latency_display());
//!         }
//!     }
//! }
//! ```

use axum::http::{HeaderName, Request};
use serde::Deserialize;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::{debug, instrument, warn};

pub mod types;
pub use types::RequestSnapshot;

pub mod policy;
pub use policy::{sanitize_headers, SensitivityPolicy, DEFAULT_SENSITIVE_PATTERNS, REDACTED};

pub mod request_id;
pub use request_id::{MissingRequestId, RequestId};

pub mod snapshot;
pub use snapshot::{build_snapshot, RequestExchange, SecureConnection};

pub mod emitter;
pub use emitter::{EmitError, LogEmitter, OutputFormat};

pub mod logging_handler;
pub use logging_handler::TracingHandler;

pub mod multi_handler;
pub use multi_handler::MultiHandler;

/// Configuration for the request logging middleware.
///
/// Deserializable with every field optional, so it can be embedded in a host application's
/// own configuration file.
///
/// # Examples
///
/// ```rust
/// use request_snapshot::RequestLoggerConfig;
///
/// // Default configuration: redact the built-in patterns
/// let config = RequestLoggerConfig::default();
///
/// // Behind a trusted proxy, with an extra pattern
/// let config = RequestLoggerConfig {
///     client_ip_header: Some("x-forwarded-for".to_string()),
///     sensitive_patterns: vec!["authorization".to_string(), "x-session".to_string()],
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RequestLoggerConfig {
    /// Whether sensitive header values are replaced with [`REDACTED`]
    pub redact_sensitive: bool,
    /// Case-insensitive substrings that mark a header name as sensitive
    pub sensitive_patterns: Vec<String>,
    /// Header carrying the real client address, e.g. `x-forwarded-for`. Only set this when a
    /// trusted proxy overwrites the header; otherwise the peer address is used.
    pub client_ip_header: Option<String>,
}

impl Default for RequestLoggerConfig {
    fn default() -> Self {
        Self {
            redact_sensitive: true,
            sensitive_patterns: DEFAULT_SENSITIVE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            client_ip_header: None,
        }
    }
}

impl RequestLoggerConfig {
    /// Build the sensitivity policy described by this configuration.
    pub fn policy(&self) -> SensitivityPolicy {
        SensitivityPolicy::new(&self.sensitive_patterns, self.redact_sensitive)
    }
}

/// Trait for consuming request snapshots.
///
/// Called exactly once per request, on the request's own task, after the inner service has
/// finished. Implementations must not panic and should not block for long; any failure should
/// be reported through their own diagnostics rather than surfaced to the request.
///
/// # Examples
///
/// ```rust
/// use request_snapshot::{RequestSnapshot, SnapshotHandler};
/// use tracing::info;
///
/// #[derive(Debug)]
/// struct MyHandler;
///
/// impl SnapshotHandler for MyHandler {
///     fn handle_snapshot(&self, snapshot: &RequestSnapshot) {
///         info!("{} {} in {}", snapshot.http_method, snapshot.url, snapshot.latency_display());
///     }
/// }
/// ```
pub trait SnapshotHandler: Send + Sync + 'static {
    /// Handle the snapshot of a completed (or abandoned) request.
    fn handle_snapshot(&self, snapshot: &RequestSnapshot);
}

impl<H: SnapshotHandler + ?Sized> SnapshotHandler for Arc<H> {
    fn handle_snapshot(&self, snapshot: &RequestSnapshot) {
        (**self).handle_snapshot(snapshot)
    }
}

/// Tower layer for the request logging middleware.
///
/// This is the main entry point for using the middleware. It implements the Tower [`Layer`]
/// trait and can be used with Axum's layering system.
///
/// # Examples
///
/// ```rust,no_run
/// use request_snapshot::{LogEmitter, OutputFormat, RequestLoggerConfig, RequestLoggerLayer};
/// use axum::{routing::get, Router};
///
/// # async fn hello() -> &'static str { "Hello" }
/// # #[tokio::main]
/// # async fn main() {
/// let emitter = LogEmitter::stdout().with_format(OutputFormat::Json);
/// let layer = RequestLoggerLayer::new(RequestLoggerConfig::default(), emitter);
///
/// let app = Router::new()
///     .route("/hello", get(hello))
///     .layer(layer);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
/// axum::serve(listener, app).await.unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct RequestLoggerLayer {
    policy: Arc<SensitivityPolicy>,
    client_ip_header: Option<HeaderName>,
    handler: Arc<dyn SnapshotHandler>,
}

impl RequestLoggerLayer {
    /// Create a new request logger layer with the given configuration and handler.
    ///
    /// The sensitivity policy is built here, once, and shared by every request.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration controlling redaction and client address resolution
    /// * `handler` - Implementation of [`SnapshotHandler`] that receives every snapshot
    pub fn new<H: SnapshotHandler>(config: RequestLoggerConfig, handler: H) -> Self {
        let client_ip_header = config.client_ip_header.as_deref().and_then(|name| {
            match HeaderName::from_bytes(name.as_bytes()) {
                Ok(header) => Some(header),
                Err(e) => {
                    warn!(header = %name, error = %e, "Ignoring invalid client IP header name");
                    None
                }
            }
        });

        Self {
            policy: Arc::new(config.policy()),
            client_ip_header,
            handler: Arc::new(handler),
        }
    }

    /// Create a layer that writes text snapshots to standard output.
    pub fn stdout(config: RequestLoggerConfig) -> Self {
        Self::new(config, LogEmitter::stdout())
    }

    /// The policy applied to every request.
    pub fn policy(&self) -> &SensitivityPolicy {
        &self.policy
    }
}

impl<S> Layer<S> for RequestLoggerLayer {
    type Service = RequestLoggerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLoggerService {
            inner,
            policy: self.policy.clone(),
            client_ip_header: self.client_ip_header.clone(),
            handler: self.handler.clone(),
        }
    }
}

/// Tower service implementation for the request logging middleware.
///
/// This service wraps an inner service, stamps each request with a [`RequestId`] and emits
/// the request's snapshot once the inner service has produced its result.
///
/// Users typically don't interact with this type directly - it's created by
/// [`RequestLoggerLayer`].
#[derive(Clone)]
pub struct RequestLoggerService<S> {
    inner: S,
    policy: Arc<SensitivityPolicy>,
    client_ip_header: Option<HeaderName>,
    handler: Arc<dyn SnapshotHandler>,
}

impl<S, B> Service<Request<B>> for RequestLoggerService<S>
where
    S: Service<Request<B>> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    #[instrument(skip_all)]
    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let request_id = RequestId::new();
        let start = Instant::now();

        request.extensions_mut().insert(request_id.clone());
        let exchange = RequestExchange::capture(&request, self.client_ip_header.as_ref());

        debug!(
            request_id = %request_id,
            method = %exchange.method,
            uri = %exchange.uri,
            "Starting request processing"
        );

        let pending = PendingSnapshot {
            exchange,
            request_id,
            start,
            policy: self.policy.clone(),
            handler: self.handler.clone(),
            emitted: false,
        };

        let future = self.inner.call(request);

        Box::pin(async move {
            debug!(request_id = %pending.request_id, "Awaiting inner service response");
            let result = future.await;
            debug!(
                request_id = %pending.request_id,
                ok = result.is_ok(),
                "Inner service response received"
            );

            pending.emit();
            result
        })
    }
}

/// Snapshot inputs for a request whose inner service has not finished yet.
///
/// Emits on [`PendingSnapshot::emit`], or on drop if the response future is abandoned first
/// (client disconnect, timeout layers), so every request is emitted exactly once.
struct PendingSnapshot {
    exchange: RequestExchange,
    request_id: RequestId,
    start: Instant,
    policy: Arc<SensitivityPolicy>,
    handler: Arc<dyn SnapshotHandler>,
    emitted: bool,
}

impl PendingSnapshot {
    fn emit(mut self) {
        self.emit_once();
    }

    fn emit_once(&mut self) {
        if self.emitted {
            return;
        }
        self.emitted = true;

        let snapshot = build_snapshot(&self.exchange, &self.request_id, &self.policy, self.start);
        self.handler.handle_snapshot(&snapshot);
    }
}

impl Drop for PendingSnapshot {
    fn drop(&mut self) {
        if !self.emitted {
            debug!(request_id = %self.request_id, "Request abandoned before completion");
            self.emit_once();
        }
    }
}
