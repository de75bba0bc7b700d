//! Text and JSON rendering of snapshots.
//!
//! This module provides [`LogEmitter`], the built-in [`SnapshotHandler`] that writes each
//! snapshot to a sink (stdout by default). Rendering and writing failures never reach the
//! request pipeline; they are reported through `tracing` and the record is dropped.

use serde::Deserialize;
use std::{
    io::{self, Write},
    sync::{Mutex, PoisonError},
};
use tracing::error;

use crate::{RequestSnapshot, SnapshotHandler};

const BANNER_WIDTH: usize = 80;
const JSON_PREFIX: &str = "Request Data (JSON):";

/// Error type for snapshot emission
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write snapshot: {0}")]
    Write(#[from] io::Error),
}

/// Representation [`LogEmitter`] uses when it is driven as a [`SnapshotHandler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Banner-delimited, one field per line
    #[default]
    Text,
    /// Pretty-printed JSON behind a descriptive prefix line
    Json,
}

/// Render a snapshot as a human-readable block.
///
/// Scalar fields come first in a fixed order. `Content Type` and `Content Length` are only
/// written when present, and the `Query Parameters:` block only when there are any.
pub fn render_text(snapshot: &RequestSnapshot) -> String {
    let banner = "=".repeat(BANNER_WIDTH);
    let mut out = format!(
        "{banner}\n\
         Request ID: {}\n\
         Timestamp: {}\n\
         HTTP Method: {}\n\
         URL: {}\n\
         IP Address: {}\n\
         User Agent: {}\n\
         Host: {}\n\
         Referer: {}\n\
         Protocol: {}\n\
         Scheme: {}\n\
         Latency: {}\n",
        snapshot.request_id,
        snapshot.timestamp_rfc3339(),
        snapshot.http_method,
        snapshot.url,
        snapshot.ip_address,
        snapshot.user_agent,
        snapshot.host,
        snapshot.referer,
        snapshot.protocol,
        snapshot.scheme,
        snapshot.latency_display(),
    );

    if let Some(content_type) = &snapshot.content_type {
        out.push_str(&format!("Content Type: {content_type}\n"));
    }
    if let Some(content_length) = &snapshot.content_length {
        out.push_str(&format!("Content Length: {content_length}\n"));
    }

    if !snapshot.query_params.is_empty() {
        out.push_str("Query Parameters:\n");
        for (key, value) in &snapshot.query_params {
            out.push_str(&format!("  {key}: {value}\n"));
        }
    }

    out.push_str("Headers:\n");
    for (key, value) in &snapshot.headers {
        out.push_str(&format!("  {key}: {value}\n"));
    }

    out.push_str(&format!("{banner}\n\n"));
    out
}

/// Render a snapshot as a prefix line followed by indented JSON.
pub fn render_json(snapshot: &RequestSnapshot) -> Result<String, EmitError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    Ok(format!("{JSON_PREFIX}\n{json}\n"))
}

/// Writes rendered snapshots to a shared sink.
///
/// Each emission renders the whole record first, then takes the sink lock once and writes it
/// in a single call, so records from concurrent requests never interleave.
///
/// # Examples
///
/// ```rust
/// use request_snapshot::{LogEmitter, OutputFormat};
///
/// // Text records on stdout
/// let emitter = LogEmitter::stdout();
///
/// // JSON records into any writer
/// let emitter = LogEmitter::new(std::io::sink()).with_format(OutputFormat::Json);
/// ```
pub struct LogEmitter {
    sink: Mutex<Box<dyn Write + Send>>,
    format: OutputFormat,
}

impl LogEmitter {
    /// Create an emitter that writes text records to `sink`.
    pub fn new<W: Write + Send + 'static>(sink: W) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
            format: OutputFormat::default(),
        }
    }

    /// Create an emitter that writes text records to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Select the representation used by [`SnapshotHandler::handle_snapshot`].
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// The representation used by [`SnapshotHandler::handle_snapshot`].
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write the text rendering of a snapshot. Failures are logged, never returned.
    pub fn emit_text(&self, snapshot: &RequestSnapshot) {
        if let Err(e) = self.write_record(&render_text(snapshot)) {
            error!(request_id = %snapshot.request_id, error = %e, "Failed to emit text snapshot");
        }
    }

    /// Write the JSON rendering of a snapshot. Failures are logged, never returned.
    pub fn emit_json(&self, snapshot: &RequestSnapshot) {
        let result = render_json(snapshot).and_then(|record| self.write_record(&record));
        if let Err(e) = result {
            error!(request_id = %snapshot.request_id, error = %e, "Failed to emit JSON snapshot");
        }
    }

    fn write_record(&self, record: &str) -> Result<(), EmitError> {
        // A panic in another emission must not silence logging for the rest of the process.
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        sink.write_all(record.as_bytes())?;
        sink.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for LogEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEmitter")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl SnapshotHandler for LogEmitter {
    fn handle_snapshot(&self, snapshot: &RequestSnapshot) {
        match self.format {
            OutputFormat::Text => self.emit_text(snapshot),
            OutputFormat::Json => self.emit_json(snapshot),
        }
    }
}
