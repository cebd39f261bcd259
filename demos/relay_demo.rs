use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, warn};
use tracing_sentry_forwarder::init::{init_forwarder_with_config, InitConfig};
use tracing_sentry_forwarder::relay::{RelayConfig, SentryRelay};
use tracing_sentry_forwarder::Level;

#[tokio::main]
async fn main() {
    let config = RelayConfig::from_env()
        .unwrap_or_else(|| RelayConfig::new("https://public_key@o0.ingest.sentry.io/42"));
    let (relay, _handle) = SentryRelay::new(config).expect("parse DSN");

    init_forwarder_with_config(
        Arc::new(relay),
        InitConfig {
            level: Level::Warn,
            application: Some("relay-demo".to_string()),
            ..InitConfig::default()
        },
    );

    warn!(user_id = 7, "cache miss rate above threshold");
    error!(duration_ms = 1830.0, "checkout handler timed out");

    // Give the background task a moment to drain the channel.
    sleep(Duration::from_secs(2)).await;
}
