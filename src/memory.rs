use crate::backend::Backend;
use crate::context::AttributeMap;
use crate::level::Level;
use crate::sink::StructuredSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One captured structured-log call.
#[derive(Debug, Clone)]
pub struct SinkCall {
    pub level: Level,
    pub message: String,
    pub attributes: AttributeMap,
}

/// A sink that records every call instead of shipping it anywhere.
///
/// Useful for asserting on forwarded attributes in tests, and for
/// measuring the overhead of the forwarding pipeline without external I/O.
/// The supported-level set is configurable so tests can exercise the
/// level-fallback path.
pub struct MemorySink {
    supported: Vec<Level>,
    calls: Mutex<Vec<SinkCall>>,
}

impl MemorySink {
    /// A sink that supports every level.
    pub fn new() -> Self {
        MemorySink::with_levels(&Level::ALL)
    }

    /// A sink that only supports the given levels; calls at other levels
    /// are still recorded, at whatever level the forwarder resolved.
    pub fn with_levels(levels: &[Level]) -> Self {
        MemorySink {
            supported: levels.to_vec(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every call recorded so far.
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().expect("memory sink lock poisoned").clone()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        MemorySink::new()
    }
}

impl StructuredSink for MemorySink {
    fn supports(&self, level: Level) -> bool {
        self.supported.contains(&level)
    }

    fn log(&self, level: Level, message: &str, attributes: &AttributeMap) {
        let call = SinkCall {
            level,
            message: message.to_string(),
            attributes: attributes.clone(),
        };
        self.calls.lock().expect("memory sink lock poisoned").push(call);
    }
}

/// In-memory [`Backend`] with a settable readiness flag and an optional
/// sink, covering each suppression condition the forwarder checks.
pub struct MemoryBackend {
    initialized: AtomicBool,
    sink: Option<Arc<MemorySink>>,
}

impl MemoryBackend {
    /// An initialized backend exposing `sink`.
    pub fn new(sink: Arc<MemorySink>) -> Self {
        MemoryBackend {
            initialized: AtomicBool::new(true),
            sink: Some(sink),
        }
    }

    /// An initialized backend with no sink at all.
    pub fn without_logger() -> Self {
        MemoryBackend {
            initialized: AtomicBool::new(true),
            sink: None,
        }
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::SeqCst);
    }
}

impl Backend for MemoryBackend {
    fn initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn logger(&self) -> Option<Arc<dyn StructuredSink>> {
        self.sink
            .as_ref()
            .map(|sink| Arc::clone(sink) as Arc<dyn StructuredSink>)
    }
}
