use crate::context::AttributeMap;
use crate::level::Level;

/// Leveled structured-log destination exposed by a monitoring backend.
///
/// Implementations transport one structured call per log event to a
/// concrete backend (Sentry's log envelope endpoint, an in-memory capture,
/// etc.). The forwarder calls `log` synchronously on the application
/// thread; implementations that need I/O should hand the call off
/// internally rather than block.
pub trait StructuredSink: Send + Sync {
    /// Capability probe: whether the backend implements `level` natively.
    ///
    /// **Parameters**
    /// - `level`: the severity the forwarder resolved for the event.
    ///
    /// **Returns**
    /// - `true` if a call at `level` is accepted as-is. The forwarder
    ///   falls back to `info` for unsupported levels, so backends that
    ///   implement only a subset still receive every event.
    fn supports(&self, level: Level) -> bool;

    /// Emit one structured log call.
    ///
    /// **Parameters**
    /// - `level`: already resolved against [`supports`](Self::supports).
    /// - `message`: the log message, positional.
    /// - `attributes`: the full flat attribute set for this event.
    fn log(&self, level: Level, message: &str, attributes: &AttributeMap);

    fn info(&self, message: &str, attributes: &AttributeMap) {
        self.log(Level::Info, message, attributes);
    }

    fn warn(&self, message: &str, attributes: &AttributeMap) {
        self.log(Level::Warn, message, attributes);
    }

    fn error(&self, message: &str, attributes: &AttributeMap) {
        self.log(Level::Error, message, attributes);
    }
}

/// Resolve the level to dispatch at, guarding against backends that do not
/// implement every severity.
///
/// The `warning` spelling collapses into [`Level::Warn`] at parse time, so
/// a sink that supports `warn` receives `warn` for either spelling; any
/// level the sink does not support falls back to `info`.
pub fn resolve_level(sink: &dyn StructuredSink, level: Level) -> Level {
    if sink.supports(level) {
        level
    } else {
        Level::Info
    }
}
