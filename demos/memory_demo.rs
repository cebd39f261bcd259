use serde_json::json;
use std::sync::Arc;
use tracing_sentry_forwarder::memory::{MemoryBackend, MemorySink};
use tracing_sentry_forwarder::{Exception, Forwarder, ForwarderConfig, Level, LogEvent};

fn main() {
    let sink = Arc::new(MemorySink::new());
    let backend = Arc::new(MemoryBackend::new(Arc::clone(&sink)));
    let forwarder = Forwarder::new(ForwarderConfig {
        application: Some("demo-app".to_string()),
        ..ForwarderConfig::default()
    })
    .with_backend(backend);

    let mut event = LogEvent::new("demo::checkout", Level::Error, "charge failed");
    event.tags.push("payments".to_string());
    event.named_tags.insert("user_id".to_string(), json!(7));
    event.named_tags.insert("transaction_name".to_string(), json!("POST /charge"));
    event.exception = Some(Exception::new(
        "CardDeclined",
        "insufficient funds",
        vec!["charge.rs:42".to_string(), "handler.rs:10".to_string()],
    ));

    let forwarded = forwarder.handle(&event);
    println!("forwarded: {}", forwarded);

    for call in sink.calls() {
        println!("[{}] {}", call.level, call.message);
        for (key, value) in &call.attributes {
            println!("  {} = {}", key, value);
        }
    }
}
