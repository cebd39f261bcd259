use crate::level::Level;
use serde_json::Value;
use std::collections::BTreeMap;

/// Flat attribute mapping used for named tags, payloads and the final
/// attribute set handed to the backend sink.
pub type AttributeMap = BTreeMap<String, Value>;

/// Mutable mapping produced by a [`Formatter`](crate::formatter::Formatter)
/// from one [`LogEvent`](crate::event::LogEvent).
///
/// The forwarder consumes it destructively: each known slot is taken into a
/// local, and whatever is left in `extra` is merged wholesale into the final
/// attribute set.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Message override; falls back to the event's own message.
    pub message: Option<String>,
    /// Level override; falls back to the event's own level.
    pub level: Option<Level>,
    /// Free-form payload, merged last into the attribute set.
    pub payload: AttributeMap,
    pub named_tags: AttributeMap,
    pub tags: Vec<String>,
    /// Anything else the formatter wants merged at the top level.
    pub extra: AttributeMap,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }
}

/// Coerce an attribute value to the string form used for tag keys and
/// values. Strings keep their content (no surrounding quotes), null becomes
/// empty, everything else renders as compact JSON.
pub(crate) fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Truncate to at most `max` characters. Character-wise, so multi-byte
/// content is never split inside a code point.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_values_without_json_quoting() {
        assert_eq!(coerce_string(&json!("plain")), "plain");
        assert_eq!(coerce_string(&json!(42)), "42");
        assert_eq!(coerce_string(&json!(true)), "true");
        assert_eq!(coerce_string(&Value::Null), "");
        assert_eq!(coerce_string(&json!(["a", "b"])), "[\"a\",\"b\"]");
    }

    #[test]
    fn truncates_by_characters() {
        assert_eq!(truncate_chars("short", 32), "short");
        assert_eq!(truncate_chars(&"x".repeat(40), 32).len(), 32);
        // 3 multi-byte chars kept intact, not split into bytes
        assert_eq!(truncate_chars("ééééé", 3), "ééé");
    }
}
