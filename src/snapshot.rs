//! Request capture and snapshot construction.
//!
//! Capturing and building are separate steps. [`RequestExchange::capture`] takes an owned copy
//! of the request-side data when the request enters the middleware, before the body and
//! extensions are handed to the inner service. [`build_snapshot`] turns that copy into a
//! [`RequestSnapshot`] once the inner service is done, so the latency covers the whole request.

use axum::{
    extract::{ConnectInfo, Query},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, REFERER, USER_AGENT},
        uri::Scheme,
        HeaderMap, HeaderName, Method, Request, Uri, Version,
    },
};
use chrono::Utc;
use std::{collections::BTreeMap, net::SocketAddr, time::Instant};
use tracing::debug;

use crate::{
    policy::{sanitize_headers, SensitivityPolicy},
    RequestId, RequestSnapshot,
};

/// Marker extension for requests that arrived over TLS.
///
/// Servers that terminate TLS themselves should insert this into the request extensions so
/// the snapshot reports `https`. Requests with an absolute `https` URI are treated the same.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureConnection;

/// Request-side data captured when a request enters the middleware.
#[derive(Debug, Clone)]
pub struct RequestExchange {
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request URI including path and query parameters
    pub uri: Uri,
    /// HTTP version the request arrived with
    pub version: Version,
    /// Raw request headers, before sanitization
    pub headers: HeaderMap,
    /// Client address, already resolved from the trusted header or the peer address
    pub client_ip: Option<String>,
    /// Whether the request arrived over TLS
    pub secure: bool,
}

impl RequestExchange {
    /// Capture the loggable parts of a request.
    ///
    /// When `client_ip_header` is set and present on the request, its first comma-separated
    /// entry is used as the client address. Otherwise the peer address from
    /// [`ConnectInfo<SocketAddr>`] is used, if the server provides it.
    pub fn capture<B>(request: &Request<B>, client_ip_header: Option<&HeaderName>) -> Self {
        let forwarded_ip = client_ip_header
            .and_then(|name| request.headers().get(name))
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string);

        let client_ip = forwarded_ip.or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        let secure = request.uri().scheme() == Some(&Scheme::HTTPS)
            || request.extensions().get::<SecureConnection>().is_some();

        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
            client_ip,
            secure,
        }
    }

    fn header(&self, name: &HeaderName) -> Option<String> {
        self.headers
            .get(name)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
    }
}

/// Build the snapshot for a captured request.
///
/// Headers go through [`sanitize_headers`] before they are stored; the raw map never reaches
/// the snapshot. Latency is measured from `start` to the moment of the call.
pub fn build_snapshot(
    exchange: &RequestExchange,
    request_id: &RequestId,
    policy: &SensitivityPolicy,
    start: Instant,
) -> RequestSnapshot {
    let latency = start.elapsed();

    let raw_headers: BTreeMap<String, String> = exchange
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let host = exchange
        .header(&HOST)
        .or_else(|| exchange.uri.authority().map(|a| a.to_string()))
        .unwrap_or_default();

    let url = exchange
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| exchange.uri.path().to_string());

    RequestSnapshot {
        request_id: request_id.to_string(),
        timestamp: Utc::now(),
        http_method: exchange.method.to_string(),
        url,
        headers: sanitize_headers(&raw_headers, policy),
        query_params: query_params(&exchange.uri),
        ip_address: exchange.client_ip.clone().unwrap_or_default(),
        user_agent: exchange.header(&USER_AGENT).unwrap_or_default(),
        latency,
        content_type: exchange.header(&CONTENT_TYPE),
        content_length: exchange.header(&CONTENT_LENGTH),
        host,
        referer: exchange.header(&REFERER).unwrap_or_default(),
        protocol: format!("{:?}", exchange.version),
        scheme: if exchange.secure { "https" } else { "http" }.to_string(),
    }
}

/// Decode the query string. A repeated parameter keeps its last value; an undecodable query
/// yields an empty map rather than failing the snapshot.
fn query_params(uri: &Uri) -> BTreeMap<String, String> {
    match Query::<BTreeMap<String, String>>::try_from_uri(uri) {
        Ok(Query(params)) => params,
        Err(e) => {
            debug!(error = %e, "Could not decode query string");
            BTreeMap::new()
        }
    }
}
