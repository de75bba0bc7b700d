//! Per-request identifiers.
//!
//! The middleware stamps every request with a [`RequestId`] stored in the request extensions.
//! Handlers read it back with the [`RequestId`] extractor, or with `Extension<RequestId>`.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Unique identifier assigned to a request when it enters the middleware.
///
/// The value is a random (v4) UUID in its canonical hyphenated form and is never reassigned
/// for the lifetime of the request.
///
/// # Examples
///
/// ```rust
/// use request_snapshot::RequestId;
///
/// async fn handler(request_id: RequestId) -> String {
///     format!("handled {request_id}")
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh identifier. Never fails.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Rejection returned by the [`RequestId`] extractor when the request never passed through
/// [`RequestLoggerLayer`](crate::RequestLoggerLayer).
#[derive(Debug, thiserror::Error)]
#[error("request id missing from request extensions; is RequestLoggerLayer installed?")]
pub struct MissingRequestId;

impl IntoResponse for MissingRequestId {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = MissingRequestId;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .ok_or(MissingRequestId)
    }
}
