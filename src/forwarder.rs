use crate::backend::{self, Backend};
use crate::context::{coerce_string, truncate_chars, AttributeMap, Context};
use crate::env;
use crate::event::LogEvent;
use crate::formatter::{Formatter, RawFormatter};
use crate::level::Level;
use crate::sink::resolve_level;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

/// Logger name reserved for the backend's own internal logging. Events
/// carrying it are never forwarded, so the backend cannot feed itself.
pub const RESERVED_LOGGER_NAME: &str = "sentry";

/// Origin marker attached to every forwarded attribute set.
pub const ORIGIN: &str = "tracing_sentry_forwarder";

const TAG_KEY_MAX_CHARS: usize = 32;
const TAG_VALUE_MAX_CHARS: usize = 256;

/// Source key → user attribute key pairs recognized during user extraction.
const USER_KEYS: [(&str, &str); 4] = [
    ("user_id", "id"),
    ("username", "username"),
    ("user_email", "email"),
    ("ip_address", "ip_address"),
];

/// Pre-filter applied by the layer before an event reaches [`Forwarder::handle`].
pub enum Filter {
    /// Forward only events whose logger name matches the pattern.
    Pattern(Regex),
    /// Arbitrary predicate over the whole event.
    Predicate(Arc<dyn Fn(&LogEvent) -> bool + Send + Sync>),
}

impl Filter {
    pub fn pattern(regex: Regex) -> Self {
        Filter::Pattern(regex)
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&LogEvent) -> bool + Send + Sync + 'static,
    {
        Filter::Predicate(Arc::new(predicate))
    }

    fn matches(&self, event: &LogEvent) -> bool {
        match self {
            Filter::Pattern(regex) => regex.is_match(&event.name),
            Filter::Predicate(predicate) => predicate(event),
        }
    }
}

/// Options accepted when registering the forwarder, in the same style as
/// other subscriber-like components:
///
///   level:       minimum severity to receive
///   formatter:   pluggable event → context transform, defaults to raw
///   filter:      pattern or predicate to pre-filter events
///   host:        host label to attach
///   application: application label to attach
///
/// The `environment` label is read from `SENTRY_ENVIRONMENT`, not from
/// this struct.
pub struct ForwarderConfig {
    pub level: Level,
    pub formatter: Option<Arc<dyn Formatter>>,
    pub filter: Option<Filter>,
    pub host: Option<String>,
    pub application: Option<String>,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        ForwarderConfig {
            level: Level::Info,
            formatter: None,
            filter: None,
            host: None,
            application: None,
        }
    }
}

/// Translates one log event at a time into a structured call on the
/// backend's leveled sink.
///
/// Holds no per-event state: every mapping built during [`handle`](Self::handle)
/// is local to that call, so concurrent invocations need no locking.
pub struct Forwarder {
    level: Level,
    formatter: Arc<dyn Formatter>,
    filter: Option<Filter>,
    host: Option<String>,
    application: Option<String>,
    environment: Option<String>,
    backend: Option<Arc<dyn Backend>>,
}

impl Forwarder {
    pub fn new(config: ForwarderConfig) -> Self {
        Forwarder {
            level: config.level,
            formatter: config
                .formatter
                .unwrap_or_else(|| Arc::new(RawFormatter) as Arc<dyn Formatter>),
            filter: config.filter,
            host: config.host,
            application: config.application,
            environment: std::env::var(env::SENTRY_ENVIRONMENT_ENV).ok(),
            backend: None,
        }
    }

    /// Use `backend` instead of resolving the process-global one. Mainly
    /// for tests and embedders that manage backend lifetime themselves.
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Minimum-level and filter gate applied by the layer before `handle`.
    pub fn should_log(&self, event: &LogEvent) -> bool {
        event.level >= self.level
            && self.filter.as_ref().map_or(true, |filter| filter.matches(event))
    }

    /// Forward one event to the backend sink.
    ///
    /// Returns `false` without calling the sink when the event is the
    /// backend's own logging, when no backend is available, when the
    /// backend is not initialized, or when it exposes no sink. Any failure
    /// past those checks (formatter, extraction, the sink call itself)
    /// propagates to the caller — nothing is swallowed.
    pub fn handle(&self, event: &LogEvent) -> bool {
        if event.name == RESERVED_LOGGER_NAME {
            return false;
        }
        let backend = match self.backend() {
            Some(backend) => backend,
            None => return false,
        };
        if !backend.initialized() {
            return false;
        }
        let sink = match backend.logger() {
            Some(sink) => sink,
            None => return false,
        };

        let context = self.formatter.format(event);
        let (message, level, attributes) = self.build_attributes(event, context);
        let resolved = resolve_level(sink.as_ref(), level);
        sink.log(resolved, &message, &attributes);
        true
    }

    fn backend(&self) -> Option<Arc<dyn Backend>> {
        self.backend.clone().or_else(backend::installed)
    }

    fn build_attributes(
        &self,
        event: &LogEvent,
        mut context: Context,
    ) -> (String, Level, AttributeMap) {
        let mut payload = mem::take(&mut context.payload);
        let mut named_tags = mem::take(&mut context.named_tags);
        // One named-tags map, consumed in stages: transaction label first,
        // then user keys, then the remainder becomes the tags source.
        let transaction = named_tags.remove("transaction_name");
        let user = extract_user(&mut named_tags, &mut payload);
        let tags = build_tags(named_tags, mem::take(&mut context.tags));
        let level = context.level.take().unwrap_or(event.level);
        let message = context
            .message
            .take()
            .unwrap_or_else(|| event.message.clone());

        let mut attributes = self.base_attributes(event, transaction);
        if let Some(user) = user {
            attributes.insert(
                "user".to_string(),
                Value::Object(user.into_iter().collect()),
            );
        }
        if !tags.is_empty() {
            attributes.insert(
                "tags".to_string(),
                Value::Object(
                    tags.into_iter()
                        .map(|(key, value)| (key, Value::String(value)))
                        .collect(),
                ),
            );
        }
        attributes.extend(mem::take(&mut context.extra));
        attributes.extend(payload);
        add_exception_or_backtrace(&mut attributes, event);
        (message, level, attributes)
    }

    fn base_attributes(&self, event: &LogEvent, transaction: Option<Value>) -> AttributeMap {
        let mut base = AttributeMap::new();
        base.insert("origin".to_string(), Value::String(ORIGIN.to_string()));
        base.insert("logger".to_string(), Value::String(event.name.clone()));
        insert_label(&mut base, "application", self.application.as_deref());
        insert_label(&mut base, "environment", self.environment.as_deref());
        insert_label(&mut base, "host", self.host.as_deref());
        base.insert(
            "thread".to_string(),
            Value::String(event.thread_name.clone()),
        );
        if let Some(transaction) = transaction {
            if !transaction.is_null() {
                base.insert("transaction".to_string(), transaction);
            }
        }
        base.insert(
            "time".to_string(),
            Value::String(event.timestamp.to_rfc3339()),
        );
        if let Some(duration) = event.duration_ms {
            insert_number(&mut base, "duration_ms", duration);
        }
        if let Some(metric) = &event.metric {
            base.insert("metric".to_string(), Value::String(metric.clone()));
        }
        if let Some(amount) = event.metric_amount {
            insert_number(&mut base, "metric_amount", amount);
        }
        base
    }
}

fn insert_label(map: &mut AttributeMap, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
}

fn insert_number(map: &mut AttributeMap, key: &str, value: f64) {
    // Non-finite values have no JSON representation; skip them rather
    // than emit null.
    if let Some(number) = serde_json::Number::from_f64(value) {
        map.insert(key.to_string(), Value::Number(number));
    }
}

/// Pull the recognized user keys out of the named tags and payload, in
/// that order, then shallow-merge any explicit `user` object from either
/// source. Matched keys are removed from their source as they are
/// consumed. Returns `None` when neither a recognized key nor a `user`
/// object was found.
fn extract_user(
    named_tags: &mut AttributeMap,
    payload: &mut AttributeMap,
) -> Option<AttributeMap> {
    let mut user = AttributeMap::new();
    for source in [&mut *named_tags, &mut *payload] {
        for (source_key, target_key) in USER_KEYS {
            if let Some(value) = source.remove(source_key) {
                if !value.is_null() {
                    user.insert(target_key.to_string(), value);
                }
            }
        }
    }
    for source in [named_tags, payload] {
        // The `user` entry is consumed either way; non-object values are
        // dropped.
        if let Some(Value::Object(extras)) = source.remove("user") {
            user.extend(extras);
        }
    }
    if user.is_empty() {
        None
    } else {
        Some(user)
    }
}

/// Coerce the remaining named tags to strings, fold the ordered tag list
/// into the `tag` key (appending with ", " rather than overwriting), and
/// cap keys at 32 and values at 256 characters.
fn build_tags(named_tags: AttributeMap, tags: Vec<String>) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = named_tags
        .into_iter()
        .map(|(key, value)| (key, coerce_string(&value)))
        .collect();
    if !tags.is_empty() {
        let joined = tags.join(", ");
        let accumulated = match merged.remove("tag") {
            Some(existing) => format!("{}, {}", existing, joined),
            None => joined,
        };
        merged.insert("tag".to_string(), accumulated);
    }
    merged
        .into_iter()
        .map(|(key, value)| {
            (
                truncate_chars(&key, TAG_KEY_MAX_CHARS),
                truncate_chars(&value, TAG_VALUE_MAX_CHARS),
            )
        })
        .collect()
}

fn add_exception_or_backtrace(attributes: &mut AttributeMap, event: &LogEvent) {
    if let Some(exception) = &event.exception {
        attributes.insert(
            "exception_class".to_string(),
            Value::String(exception.class_name.clone()),
        );
        attributes.insert(
            "exception_message".to_string(),
            Value::String(exception.message.clone()),
        );
        attributes.insert(
            "exception_backtrace".to_string(),
            frames_value(&exception.backtrace),
        );
    } else if let Some(backtrace) = &event.backtrace {
        attributes.insert("backtrace".to_string(), frames_value(backtrace));
    }
}

fn frames_value(frames: &[String]) -> Value {
    Value::Array(frames.iter().map(|frame| Value::String(frame.clone())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(entries: &[(&str, Value)]) -> AttributeMap {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn user_keys_are_consumed_from_both_sources() {
        let mut named_tags = map(&[("user_id", json!(42)), ("shard", json!("eu-1"))]);
        let mut payload = map(&[("user_email", json!("a@b.example"))]);

        let user = extract_user(&mut named_tags, &mut payload).unwrap();
        assert_eq!(user.get("id"), Some(&json!(42)));
        assert_eq!(user.get("email"), Some(&json!("a@b.example")));
        assert!(named_tags.contains_key("shard"));
        assert!(!named_tags.contains_key("user_id"));
        assert!(payload.is_empty());
    }

    #[test]
    fn explicit_user_object_alone_yields_a_user() {
        let mut named_tags = AttributeMap::new();
        let mut payload = map(&[("user", json!({"plan": "pro"}))]);

        let user = extract_user(&mut named_tags, &mut payload).unwrap();
        assert_eq!(user.get("plan"), Some(&json!("pro")));
        assert!(payload.is_empty());
    }

    #[test]
    fn non_object_user_entries_are_dropped() {
        let mut named_tags = map(&[("user", json!("not-a-map"))]);
        let mut payload = AttributeMap::new();

        assert!(extract_user(&mut named_tags, &mut payload).is_none());
        assert!(named_tags.is_empty());
    }

    #[test]
    fn payload_user_extras_override_named_tag_extras() {
        let mut named_tags = map(&[
            ("user_id", json!(7)),
            ("user", json!({"plan": "free", "team": "core"})),
        ]);
        let mut payload = map(&[("user", json!({"plan": "pro"}))]);

        let user = extract_user(&mut named_tags, &mut payload).unwrap();
        assert_eq!(user.get("plan"), Some(&json!("pro")));
        assert_eq!(user.get("team"), Some(&json!("core")));
    }

    #[test]
    fn tag_list_appends_to_existing_tag_key() {
        let named_tags = map(&[("tag", json!("seed")), ("env", json!("prod"))]);
        let tags = build_tags(named_tags, vec!["tag1".to_string(), "tag2".to_string()]);
        assert_eq!(tags.get("tag").map(String::as_str), Some("seed, tag1, tag2"));
        assert_eq!(tags.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn tag_keys_and_values_are_capped() {
        let long_key = "k".repeat(40);
        let named_tags = map(&[(long_key.as_str(), json!("v".repeat(300)))]);
        let tags = build_tags(named_tags, Vec::new());

        let (key, value) = tags.iter().next().unwrap();
        assert_eq!(key.len(), 32);
        assert_eq!(value.len(), 256);
    }

    #[test]
    fn non_string_tag_values_are_coerced() {
        let named_tags = map(&[("attempt", json!(3)), ("flaky", json!(true))]);
        let tags = build_tags(named_tags, Vec::new());
        assert_eq!(tags.get("attempt").map(String::as_str), Some("3"));
        assert_eq!(tags.get("flaky").map(String::as_str), Some("true"));
    }
}
