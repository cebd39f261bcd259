use crate::context::Context;
use crate::event::LogEvent;

/// Pluggable transform from a [`LogEvent`] to a [`Context`].
///
/// Any `Fn(&LogEvent) -> Context` closure implements this, so callers can
/// pass either a formatter object or a plain function when configuring the
/// forwarder.
pub trait Formatter: Send + Sync {
    fn format(&self, event: &LogEvent) -> Context;
}

impl<F> Formatter for F
where
    F: Fn(&LogEvent) -> Context + Send + Sync,
{
    fn format(&self, event: &LogEvent) -> Context {
        self(event)
    }
}

/// Default formatter: passes the event's own fields through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawFormatter;

impl Formatter for RawFormatter {
    fn format(&self, event: &LogEvent) -> Context {
        Context {
            message: Some(event.message.clone()),
            level: Some(event.level),
            payload: event.payload.clone(),
            named_tags: event.named_tags.clone(),
            tags: event.tags.clone(),
            extra: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use serde_json::json;

    #[test]
    fn raw_formatter_passes_event_fields_through() {
        let mut event = LogEvent::new("app::db", Level::Warn, "slow query");
        event.tags.push("db".to_string());
        event.named_tags.insert("shard".to_string(), json!(3));

        let context = RawFormatter.format(&event);
        assert_eq!(context.message.as_deref(), Some("slow query"));
        assert_eq!(context.level, Some(Level::Warn));
        assert_eq!(context.tags, vec!["db".to_string()]);
        assert_eq!(context.named_tags.get("shard"), Some(&json!(3)));
        assert!(context.extra.is_empty());
    }

    #[test]
    fn closures_are_formatters() {
        let formatter = |event: &LogEvent| Context {
            message: Some(format!("[{}] {}", event.name, event.message)),
            ..Context::new()
        };
        let event = LogEvent::new("worker", Level::Info, "done");
        let context = formatter.format(&event);
        assert_eq!(context.message.as_deref(), Some("[worker] done"));
    }
}
