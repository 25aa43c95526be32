//! Structured, request-aware logging
//!
//! Components receive a [`Logger`] at construction instead of reaching for a
//! global. A logger wraps a [`LogSink`]: [`TracingSink`] forwards events to
//! `tracing` (and from there to the subscriber installed by
//! [`init_tracing`](crate::observability::init_tracing)); [`MemorySink`]
//! keeps them in memory for assertions.
//!
//! # Example
//!
//! ```rust
//! use docglue::context::RequestContext;
//! use docglue::logging::{LogFields, Logger, MemorySink};
//!
//! let sink = MemorySink::new();
//! let logger = Logger::new(sink.clone());
//! let ctx = RequestContext::new().with_api_name("listUsers");
//!
//! logger.info("listing users", LogFields::new().with("page", &1), Some(&ctx));
//!
//! let events = sink.events();
//! assert_eq!(events[0].api_name.as_deref(), Some("listUsers"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;

use crate::context::RequestContext;

/// Field name under which the route name is attached
pub const API_NAME_FIELD: &str = "apiName";

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// Informational
    Info,
    /// Failure
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Open-ended structured context attached to an event
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LogFields(BTreeMap<String, Value>);

impl LogFields {
    /// Empty field set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field; values that cannot be represented as JSON are recorded as a
    /// string describing the failure.
    #[must_use]
    pub fn with<V>(mut self, key: impl Into<String>, value: &V) -> Self
    where
        V: Serialize + ?Sized,
    {
        self.insert(key, value);
        self
    }

    /// Add a field in place
    pub fn insert<V>(&mut self, key: impl Into<String>, value: &V)
    where
        V: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)
            .unwrap_or_else(|e| Value::String(format!("<unserializable: {e}>")));
        self.0.insert(key.into(), value);
    }

    /// Look a field up
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no field was attached
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Render the fields as one JSON object keyed by field name
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

/// One emitted log event
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// Severity
    pub level: LogLevel,
    /// Human-readable message
    pub message: String,
    /// Rendered error, for error events that carry one
    pub error: Option<String>,
    /// Structured context
    pub fields: LogFields,
    /// Route name taken from the request context
    pub api_name: Option<String>,
}

/// Destination for log events
pub trait LogSink: Send + Sync {
    /// Emit one event
    fn emit(&self, event: LogEvent);
}

/// Cheaply cloneable handle to a [`LogSink`]
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl Logger {
    /// Logger over an arbitrary sink
    pub fn new(sink: impl LogSink + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Logger that forwards to `tracing`
    pub fn tracing() -> Self {
        Self::new(TracingSink)
    }

    /// Emit an informational event
    pub fn info(&self, message: impl Into<String>, fields: LogFields, ctx: Option<&RequestContext>) {
        self.emit(LogLevel::Info, None, message.into(), fields, ctx);
    }

    /// Emit an error event, optionally carrying the error that caused it
    pub fn error(
        &self,
        error: Option<&dyn std::error::Error>,
        message: impl Into<String>,
        fields: LogFields,
        ctx: Option<&RequestContext>,
    ) {
        self.emit(
            LogLevel::Error,
            error.map(ToString::to_string),
            message.into(),
            fields,
            ctx,
        );
    }

    fn emit(
        &self,
        level: LogLevel,
        error: Option<String>,
        message: String,
        fields: LogFields,
        ctx: Option<&RequestContext>,
    ) {
        let api_name = ctx.and_then(RequestContext::api_name).map(str::to_string);
        self.sink.emit(LogEvent {
            level,
            message,
            error,
            fields,
            api_name,
        });
    }
}

/// Sink that forwards events to `tracing`.
///
/// `tracing` fields are declared at the callsite, so the dynamic context cannot
/// become one field per key. Each event carries:
///
/// - `apiName`: the route name, when the context has one
/// - `error`: the rendered cause, on error events
/// - `fields`: the whole [`LogFields`] rendered by [`LogFields::to_json`], a
///   JSON object keyed by field name
///
/// Log pipelines that want the individual keys parse `fields` as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, event: LogEvent) {
        let fields = event.fields.to_json();
        let api_name = event.api_name.as_deref();

        match event.level {
            LogLevel::Info => {
                tracing::info!("apiName" = api_name, fields = %fields, "{}", event.message);
            }
            LogLevel::Error => {
                tracing::error!(
                    "apiName" = api_name,
                    error = event.error.as_deref(),
                    fields = %fields,
                    "{}", event.message
                );
            }
        }
    }
}

/// Sink that records events in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event emitted so far
    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events at `level`
    pub fn events_at(&self, level: LogLevel) -> Vec<LogEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level == level)
            .collect()
    }

    /// Drop recorded events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn emit(&self, event: LogEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
