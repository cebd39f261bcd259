use crate::context::AttributeMap;
use crate::level::Level;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One structured log event as delivered by the host logging framework.
///
/// The forwarder treats this as read-only input; every derived mapping is
/// built fresh per event.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    /// Name of the originating logger (the `tracing` target).
    pub name: String,
    pub level: Level,
    pub message: String,
    pub thread_name: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: Option<f64>,
    pub metric: Option<String>,
    pub metric_amount: Option<f64>,
    pub exception: Option<Exception>,
    /// Standalone frames, used only when no exception is attached.
    pub backtrace: Option<Vec<String>>,
    pub tags: Vec<String>,
    pub named_tags: AttributeMap,
    /// Free-form structured payload supplied at the original log call.
    pub payload: AttributeMap,
}

impl LogEvent {
    pub fn new(name: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        LogEvent {
            name: name.into(),
            level,
            message: message.into(),
            thread_name: current_thread_name(),
            timestamp: Utc::now(),
            duration_ms: None,
            metric: None,
            metric_amount: None,
            exception: None,
            backtrace: None,
            tags: Vec::new(),
            named_tags: AttributeMap::new(),
            payload: AttributeMap::new(),
        }
    }
}

/// Exception attached to a log event: type name, message and ordered
/// backtrace frames.
#[derive(Debug, Clone, Serialize)]
pub struct Exception {
    pub class_name: String,
    pub message: String,
    pub backtrace: Vec<String>,
}

impl Exception {
    pub fn new(
        class_name: impl Into<String>,
        message: impl Into<String>,
        backtrace: Vec<String>,
    ) -> Self {
        Exception {
            class_name: class_name.into(),
            message: message.into(),
            backtrace,
        }
    }
}

pub(crate) fn current_thread_name() -> String {
    let current = std::thread::current();
    match current.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", current.id()),
    }
}
