use regex::Regex;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing_sentry_forwarder::layer::ForwarderLayer;
use tracing_sentry_forwarder::memory::{MemoryBackend, MemorySink};
use tracing_sentry_forwarder::{Filter, Forwarder, ForwarderConfig, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

fn capture_layer(config: ForwarderConfig) -> (Arc<MemorySink>, ForwarderLayer) {
    let sink = Arc::new(MemorySink::new());
    let backend = Arc::new(MemoryBackend::new(Arc::clone(&sink)));
    let forwarder = Forwarder::new(config).with_backend(backend);
    (sink, ForwarderLayer::new(forwarder))
}

#[test]
fn tracing_events_reach_the_sink_with_translated_fields() {
    let (sink, layer) = capture_layer(ForwarderConfig::default());
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(user_id = 42, request_id = "abc-1", "db down");
    });

    let calls = sink.calls();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.level, Level::Error);
    assert_eq!(call.message, "db down");
    assert_eq!(call.attributes.get("origin"), Some(&json!("tracing_sentry_forwarder")));
    assert_eq!(call.attributes.get("logger"), Some(&json!("layer_test")));
    // user_id was a named tag, so it surfaces as the user mapping.
    assert_eq!(call.attributes.get("user"), Some(&json!({ "id": 42 })));
    assert_eq!(
        call.attributes.get("tags"),
        Some(&json!({ "request_id": "abc-1" }))
    );
}

#[test]
fn events_below_the_minimum_level_are_gated() {
    let (sink, layer) = capture_layer(ForwarderConfig {
        level: Level::Warn,
        ..ForwarderConfig::default()
    });
    let total = Arc::clone(&layer.total_events);
    let forwarded = Arc::clone(&layer.forwarded_events);
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!("too quiet");
        tracing::warn!("loud enough");
    });

    assert_eq!(sink.calls().len(), 1);
    assert_eq!(sink.calls()[0].message, "loud enough");
    assert_eq!(total.load(Ordering::Relaxed), 2);
    assert_eq!(forwarded.load(Ordering::Relaxed), 1);
}

#[test]
fn pattern_filters_gate_on_logger_name() {
    let (sink, layer) = capture_layer(ForwarderConfig {
        filter: Some(Filter::pattern(Regex::new("^app::").unwrap())),
        ..ForwarderConfig::default()
    });
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(target: "app::db", "kept");
        tracing::error!(target: "noise::gc", "filtered");
    });

    let calls = sink.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].attributes.get("logger"), Some(&json!("app::db")));
}

#[test]
fn duration_and_metric_fields_are_lifted_from_event_fields() {
    let (sink, layer) = capture_layer(ForwarderConfig::default());
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!(
            duration_ms = 12.5,
            metric = "checkout/charge",
            metric_amount = 1.0,
            "slow charge"
        );
    });

    let call = &sink.calls()[0];
    assert_eq!(call.attributes.get("duration_ms"), Some(&json!(12.5)));
    assert_eq!(call.attributes.get("metric"), Some(&json!("checkout/charge")));
    assert_eq!(call.attributes.get("metric_amount"), Some(&json!(1.0)));
    assert!(!call.attributes.contains_key("tags"));
}

#[test]
fn the_backends_own_target_is_never_forwarded() {
    let (sink, layer) = capture_layer(ForwarderConfig::default());
    let forwarded = Arc::clone(&layer.forwarded_events);
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(target: "sentry", "internal transport error");
    });

    assert!(sink.calls().is_empty());
    assert_eq!(forwarded.load(Ordering::Relaxed), 0);
}
