//! Data types for captured request snapshots.
//!
//! This module contains the immutable record the middleware produces for every request,
//! along with the small helpers used to render its timing fields.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;

/// Diagnostic record of a single request.
///
/// Built once per request by [`build_snapshot`](crate::snapshot::build_snapshot) and never
/// modified afterwards. Header values have already been through the
/// [`SensitivityPolicy`](crate::SensitivityPolicy), so a snapshot is safe to emit as is.
///
/// Serializes to JSON with snake_case keys. Every key is always present; `content_type` and
/// `content_length` serialize as `""` when the client did not send those headers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSnapshot {
    /// Identifier assigned when the request entered the middleware
    pub request_id: String,
    /// Capture time in UTC
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// HTTP method (GET, POST, etc.)
    pub http_method: String,
    /// Path and query as received
    pub url: String,
    /// Sanitized request headers, last value wins for repeated names. Names are lower-case
    /// because the `http` crate normalizes them on parse.
    pub headers: BTreeMap<String, String>,
    /// Decoded query parameters, last value wins for repeated names
    pub query_params: BTreeMap<String, String>,
    /// Client address, empty if unknown
    pub ip_address: String,
    /// `User-Agent` header, empty if absent
    pub user_agent: String,
    /// Time from entering the middleware to building this snapshot
    #[serde(serialize_with = "serialize_latency")]
    pub latency: Duration,
    /// `Content-Type` header, if sent
    #[serde(serialize_with = "serialize_optional")]
    pub content_type: Option<String>,
    /// `Content-Length` header, if sent
    #[serde(serialize_with = "serialize_optional")]
    pub content_length: Option<String>,
    /// `Host` header or URI authority, empty if neither is known
    pub host: String,
    /// `Referer` header, empty if absent
    pub referer: String,
    /// HTTP version, e.g. `HTTP/1.1`
    pub protocol: String,
    /// `http` or `https`
    pub scheme: String,
}

impl RequestSnapshot {
    /// The timestamp in RFC 3339 form with second precision, e.g. `2024-05-01T12:00:00Z`.
    pub fn timestamp_rfc3339(&self) -> String {
        format_timestamp(&self.timestamp)
    }

    /// The latency as a human-readable string, e.g. `150.2ms`.
    pub fn latency_display(&self) -> String {
        format_latency(self.latency)
    }
}

pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Render a duration with the unit that suits its magnitude (`870ns`, `12.5µs`, `150.2ms`,
/// `2.000131s`).
pub fn format_latency(latency: Duration) -> String {
    format!("{latency:?}")
}

fn serialize_timestamp<S: Serializer>(
    timestamp: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(timestamp))
}

fn serialize_latency<S: Serializer>(latency: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_latency(*latency))
}

fn serialize_optional<S: Serializer>(
    value: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or_default())
}
