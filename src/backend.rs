use std::sync::{Arc, RwLock};

use crate::sink::StructuredSink;

/// Handle to the monitoring backend integration.
///
/// Mirrors the readiness surface the forwarder needs before it will emit
/// anything: an initialization flag and access to the structured-log sink.
/// A backend that is installed but not yet initialized, or initialized but
/// without a sink, suppresses forwarding without raising.
pub trait Backend: Send + Sync {
    /// Whether the backend client has finished initializing.
    fn initialized(&self) -> bool;

    /// The structured-log sink, if the backend exposes one.
    fn logger(&self) -> Option<Arc<dyn StructuredSink>>;
}

static INSTALLED: RwLock<Option<Arc<dyn Backend>>> = RwLock::new(None);

/// Install `backend` as the process-global backend integration.
///
/// Forwarders without an explicit backend override resolve through this
/// registry on every `handle` call, so installing late or swapping the
/// backend takes effect immediately.
pub fn install(backend: Arc<dyn Backend>) {
    let mut slot = INSTALLED.write().expect("backend registry poisoned");
    *slot = Some(backend);
}

/// The process-globally installed backend, if any.
pub fn installed() -> Option<Arc<dyn Backend>> {
    INSTALLED.read().expect("backend registry poisoned").clone()
}

/// Remove the process-global backend. Subsequent `handle` calls on
/// forwarders without an override suppress with `false`.
pub fn uninstall() {
    let mut slot = INSTALLED.write().expect("backend registry poisoned");
    *slot = None;
}
