//! Composite handler for fanning snapshots out to several sinks.
//!
//! This module provides [`MultiHandler`], which composes an arbitrary number of
//! [`SnapshotHandler`] implementations. Handlers run in the order they were added.
//!
//! # Example
//!
//! ```rust
//! use request_snapshot::{LogEmitter, MultiHandler, OutputFormat, TracingHandler};
//!
//! // Text on stdout, JSON to a second sink, and a tracing event
//! let multi_handler = MultiHandler::new()
//!     .with(LogEmitter::stdout())
//!     .with(LogEmitter::new(std::io::sink()).with_format(OutputFormat::Json))
//!     .with(TracingHandler);
//!
//! // Use with RequestLoggerLayer
//! // let layer = RequestLoggerLayer::new(config, multi_handler);
//! ```

use crate::{RequestSnapshot, SnapshotHandler};
use std::sync::Arc;

/// A handler that delegates to multiple inner handlers.
///
/// Every inner handler sees every snapshot, in insertion order.
///
/// # Thread Safety
///
/// `MultiHandler` is `Send + Sync` and can be safely shared across threads.
/// Each inner handler is wrapped in an `Arc` for cheap cloning.
#[derive(Clone, Default)]
pub struct MultiHandler {
    handlers: Vec<Arc<dyn SnapshotHandler>>,
}

impl MultiHandler {
    /// Create a new empty MultiHandler.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain. Returns self for builder pattern.
    ///
    /// # Example
    ///
    /// ```rust
    /// use request_snapshot::{LogEmitter, MultiHandler};
    ///
    /// let handler = MultiHandler::new()
    ///     .with(LogEmitter::stdout());
    /// ```
    pub fn with<H: SnapshotHandler>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Returns true if no handlers have been added.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Returns the number of handlers in the chain.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}

impl std::fmt::Debug for MultiHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiHandler")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl SnapshotHandler for MultiHandler {
    fn handle_snapshot(&self, snapshot: &RequestSnapshot) {
        for handler in &self.handlers {
            handler.handle_snapshot(snapshot);
        }
    }
}
