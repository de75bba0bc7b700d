//! Snapshot handler that forwards to `tracing`.
//!
//! [`TracingHandler`] turns each snapshot into a single structured `tracing` event, for hosts
//! that already ship their logs through a subscriber instead of reading stdout.

use tracing::info;

use crate::{RequestSnapshot, SnapshotHandler};

/// Implementation of [`SnapshotHandler`] that records snapshots as `tracing` events.
///
/// Each snapshot becomes one `INFO` event with target `request_snapshot`. The logged fields
/// are:
/// - Request ID, method, URL, scheme and protocol
/// - Client address, user agent and referer
/// - Latency, both human-readable and in microseconds
/// - Sanitized headers and query parameters (in debug format)
///
/// # Examples
///
/// ```rust,no_run
/// use request_snapshot::{RequestLoggerLayer, RequestLoggerConfig, TracingHandler};
///
/// let layer = RequestLoggerLayer::new(RequestLoggerConfig::default(), TracingHandler);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TracingHandler;

impl SnapshotHandler for TracingHandler {
    fn handle_snapshot(&self, snapshot: &RequestSnapshot) {
        info!(
            target: "request_snapshot",
            request_id = %snapshot.request_id,
            timestamp = %snapshot.timestamp_rfc3339(),
            method = %snapshot.http_method,
            url = %snapshot.url,
            host = %snapshot.host,
            scheme = %snapshot.scheme,
            protocol = %snapshot.protocol,
            ip_address = %snapshot.ip_address,
            user_agent = %snapshot.user_agent,
            referer = %snapshot.referer,
            content_type = snapshot.content_type.as_deref(),
            content_length = snapshot.content_length.as_deref(),
            latency = %snapshot.latency_display(),
            latency_us = snapshot.latency.as_micros() as u64,
            query_params = ?snapshot.query_params,
            headers = ?snapshot.headers,
            "Request captured"
        );
    }
}
