use crate::context::AttributeMap;
use crate::event::{current_thread_name, LogEvent};
use crate::forwarder::Forwarder;
use crate::level::Level;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into [`LogEvent`]s and
/// hands them to a [`Forwarder`].
///
/// Minimum-level and filter gating happen here, before the forwarder's own
/// suppression checks; the forwarding call itself runs inline on the
/// emitting thread.
pub struct ForwarderLayer {
    forwarder: Arc<Forwarder>,
    /// Total events seen by the layer (before gating).
    pub total_events: Arc<AtomicU64>,
    /// Events the forwarder actually shipped to the sink.
    pub forwarded_events: Arc<AtomicU64>,
}

impl ForwarderLayer {
    pub fn new(forwarder: Forwarder) -> Self {
        ForwarderLayer {
            forwarder: Arc::new(forwarder),
            total_events: Arc::new(AtomicU64::new(0)),
            forwarded_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn forwarder(&self) -> Arc<Forwarder> {
        Arc::clone(&self.forwarder)
    }

    /// Build the [`LogEvent`] for one `tracing` event.
    ///
    /// The `message` field becomes the message; `duration_ms`, `metric`
    /// and `metric_amount` fields are lifted into their typed slots; every
    /// other field lands in the named tags.
    fn to_log_event(event: &Event<'_>) -> LogEvent {
        let mut fields = AttributeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let duration_ms = fields.remove("duration_ms").and_then(|v| v.as_f64());
        let metric = fields
            .remove("metric")
            .and_then(|v| v.as_str().map(str::to_string));
        let metric_amount = fields.remove("metric_amount").and_then(|v| v.as_f64());

        let meta = event.metadata();
        LogEvent {
            name: meta.target().to_string(),
            level: Level::from(meta.level()),
            message: message.unwrap_or_default(),
            thread_name: current_thread_name(),
            timestamp: Utc::now(),
            duration_ms,
            metric,
            metric_amount,
            exception: None,
            backtrace: None,
            tags: Vec::new(),
            named_tags: fields,
            payload: AttributeMap::new(),
        }
    }
}

impl<S> Layer<S> for ForwarderLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let log_event = Self::to_log_event(event);
        if !self.forwarder.should_log(&log_event) {
            return;
        }
        if self.forwarder.handle(&log_event) {
            self.forwarded_events.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut AttributeMap,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(format!("{:?}", value)),
            );
        }
    }
}
