//! Structured event hook for operations that matter outside the process
//! (errors, warnings, upload/download traffic), grounded on
//! `vrs/EventLogger.{h,cpp}`. The default implementation forwards to
//! `tracing`; callers embedding this library in something that ships events
//! to a server can install their own via [`set_logger`].

use std::sync::{Mutex, OnceLock};

/// Where an event was raised: the operation name and a source location
/// (typically `file!():line!()`).
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: String,
    pub source_location: String,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>, source_location: impl Into<String>) -> Self {
        OperationContext { operation: operation.into(), source_location: source_location.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: EventLevel,
    pub context: OperationContext,
    pub message: String,
}

/// One attempt to move bytes across a boundary this process doesn't
/// control (e.g. fetching a remote chunk), for aggregate reporting.
#[derive(Debug, Clone, Default)]
pub struct TrafficEvent {
    pub is_success: bool,
    pub upload_not_download: bool,
    pub transfer_duration_ms: i64,
    pub total_duration_ms: i64,
    pub transfer_size: u64,
    pub retry_count: u32,
    pub error_count: u32,
}

/// Receives structured events. The default (tracing-backed) implementation
/// is installed process-wide; embedders swap it via [`set_logger`].
pub trait EventLogger: Send + Sync {
    fn log_event(&self, event: LogEvent);
    fn log_traffic(&self, context: OperationContext, event: TrafficEvent);
}

struct TracingEventLogger;

impl EventLogger for TracingEventLogger {
    fn log_event(&self, event: LogEvent) {
        match event.level {
            EventLevel::Error => {
                tracing::error!(operation = %event.context.operation, at = %event.context.source_location, "{}", event.message)
            }
            EventLevel::Warning => {
                tracing::warn!(operation = %event.context.operation, at = %event.context.source_location, "{}", event.message)
            }
        }
    }

    fn log_traffic(&self, context: OperationContext, event: TrafficEvent) {
        tracing::info!(
            operation = %context.operation,
            direction = if event.upload_not_download { "upload" } else { "download" },
            success = event.is_success,
            bytes = event.transfer_size,
            retries = event.retry_count,
            errors = event.error_count,
            "traffic event"
        );
    }
}

fn instance() -> &'static Mutex<Box<dyn EventLogger>> {
    static INSTANCE: OnceLock<Mutex<Box<dyn EventLogger>>> = OnceLock::new();
    INSTANCE.get_or_init(|| Mutex::new(Box::new(TracingEventLogger)))
}

/// Installs a new process-wide event logger, replacing the default.
pub fn set_logger(logger: Box<dyn EventLogger>) {
    *instance().lock().expect("event logger poisoned") = logger;
}

pub fn error(context: OperationContext, message: impl Into<String>) {
    instance()
        .lock()
        .expect("event logger poisoned")
        .log_event(LogEvent { level: EventLevel::Error, context, message: message.into() });
}

pub fn warning(context: OperationContext, message: impl Into<String>) {
    instance()
        .lock()
        .expect("event logger poisoned")
        .log_event(LogEvent { level: EventLevel::Warning, context, message: message.into() });
}

pub fn traffic(context: OperationContext, event: TrafficEvent) {
    instance().lock().expect("event logger poisoned").log_traffic(context, event);
}
