use crate::backend::Backend;
use crate::context::AttributeMap;
use crate::env;
use crate::level::Level;
use crate::sink::StructuredSink;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Client identifier reported to the ingestion endpoint.
const SENTRY_CLIENT: &str = concat!("tracing-sentry-forwarder/", env!("CARGO_PKG_VERSION"));

/// Configuration for [`SentryRelay`].
///
/// The relay speaks Sentry's envelope protocol over HTTP. The DSN is the
/// standard `scheme://public_key@host/project_id` form; everything else
/// (endpoint path, auth query) is derived from it.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub dsn: String,
    /// Maximum envelopes queued before new ones are dropped.
    pub buffer: usize,
}

impl RelayConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        RelayConfig {
            dsn: dsn.into(),
            buffer: 1024,
        }
    }

    /// Read the DSN from `SENTRY_DSN`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var(env::SENTRY_DSN_ENV).ok().map(RelayConfig::new)
    }
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug)]
pub enum DsnError {
    #[error("DSN is missing a scheme")]
    MissingScheme,

    #[error("DSN is missing a public key")]
    MissingPublicKey,

    #[error("DSN is missing a project id")]
    MissingProjectId,
}

/// Derive the envelope ingestion endpoint from a DSN.
///
/// `https://key@o0.ingest.example/42` becomes
/// `https://o0.ingest.example/api/42/envelope/?sentry_key=key&...`.
fn envelope_endpoint(dsn: &str) -> Result<String, DsnError> {
    let (scheme, rest) = dsn.split_once("://").ok_or(DsnError::MissingScheme)?;
    let (key, rest) = rest.split_once('@').ok_or(DsnError::MissingPublicKey)?;
    let (host, project) = rest.rsplit_once('/').ok_or(DsnError::MissingProjectId)?;

    if scheme.is_empty() {
        return Err(DsnError::MissingScheme);
    }
    if key.is_empty() {
        return Err(DsnError::MissingPublicKey);
    }
    if host.is_empty() || project.is_empty() {
        return Err(DsnError::MissingProjectId);
    }

    Ok(format!(
        "{}://{}/api/{}/envelope/?sentry_key={}&sentry_version=7&sentry_client={}",
        scheme,
        host,
        project,
        urlencoding::encode(key),
        urlencoding::encode(SENTRY_CLIENT)
    ))
}

/// Asynchronous carrier for encoded envelopes.
///
/// The relay's background task calls `send` once per envelope; the sink
/// side never awaits it on the application thread.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one serialized envelope to the backend.
    ///
    /// **Returns**
    /// - `Ok(())` if the envelope was accepted.
    /// - `Err(..)` on network or HTTP failure. The relay reports the
    ///   failure and moves on; it does not retry.
    async fn send(&self, envelope: &str) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// HTTP implementation of [`Transport`] using the envelope endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: String) -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, envelope: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/x-sentry-envelope")
            .body(envelope.to_string())
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("envelope rejected with status {}: {}", status, text).into())
        }
    }
}

/// Sink half of the relay: encodes each structured call into a log
/// envelope and enqueues it for the background task. `log` never blocks;
/// when the channel is full the envelope is dropped and counted.
pub struct RelaySink {
    tx: mpsc::Sender<String>,
    /// Envelopes dropped because the channel was full.
    pub dropped_envelopes: AtomicU64,
}

impl StructuredSink for RelaySink {
    fn supports(&self, _level: Level) -> bool {
        // Sentry's log protocol accepts every severity.
        true
    }

    fn log(&self, level: Level, message: &str, attributes: &AttributeMap) {
        let envelope = encode_envelope(level, message, attributes);
        if self.tx.try_send(envelope).is_err() {
            self.dropped_envelopes.fetch_add(1, Ordering::Relaxed);
            eprintln!("relay channel full, dropping log envelope");
        }
    }
}

/// Backend client that ships structured log calls to Sentry.
///
/// Construction spawns a background task that drains a bounded channel and
/// hands envelopes to the [`Transport`], so the sink call on the
/// application thread is a non-blocking enqueue.
pub struct SentryRelay {
    sink: Arc<RelaySink>,
}

impl SentryRelay {
    /// Build a relay from `config`, deriving the HTTP endpoint from the
    /// DSN. Must be called within a Tokio runtime.
    pub fn new(config: RelayConfig) -> Result<(Self, JoinHandle<()>), DsnError> {
        let endpoint = envelope_endpoint(&config.dsn)?;
        let transport = Arc::new(HttpTransport::new(endpoint));
        Ok(Self::with_transport(transport, config.buffer))
    }

    /// Build a relay over an arbitrary [`Transport`]. Used by tests and by
    /// embedders with their own delivery path.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        buffer: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<String>(buffer.max(16));

        let handle = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                if let Err(e) = transport.send(&envelope).await {
                    eprintln!("error sending log envelope: {}", e);
                }
            }
        });

        let sink = Arc::new(RelaySink {
            tx,
            dropped_envelopes: AtomicU64::new(0),
        });
        (SentryRelay { sink }, handle)
    }

    /// Envelopes dropped so far because the channel was full.
    pub fn dropped_envelopes(&self) -> u64 {
        self.sink.dropped_envelopes.load(Ordering::Relaxed)
    }
}

impl Backend for SentryRelay {
    fn initialized(&self) -> bool {
        !self.sink.tx.is_closed()
    }

    fn logger(&self) -> Option<Arc<dyn StructuredSink>> {
        Some(Arc::clone(&self.sink) as Arc<dyn StructuredSink>)
    }
}

#[derive(Serialize)]
struct LogItem {
    timestamp: f64,
    level: String,
    body: String,
    attributes: serde_json::Map<String, Value>,
}

/// Encode one structured call as a three-line log envelope: envelope
/// header, item header, item payload.
fn encode_envelope(level: Level, message: &str, attributes: &AttributeMap) -> String {
    let item = LogItem {
        timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
        level: level.to_string(),
        body: message.to_string(),
        attributes: attributes
            .iter()
            .map(|(key, value)| (key.clone(), attribute_entry(value)))
            .collect(),
    };
    let payload = json!({ "items": [item] });
    let item_header = json!({
        "type": "log",
        "item_count": 1,
        "content_type": "application/vnd.sentry.items.log+json",
    });
    format!(
        "{{}}\n{}\n{}\n",
        item_header,
        serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string())
    )
}

/// Shape one attribute value as the protocol's typed entry.
fn attribute_entry(value: &Value) -> Value {
    match value {
        Value::String(s) => json!({ "value": s, "type": "string" }),
        Value::Bool(b) => json!({ "value": b, "type": "boolean" }),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            json!({ "value": n, "type": "integer" })
        }
        Value::Number(n) => json!({ "value": n, "type": "double" }),
        // Maps and arrays have no typed form; render them as JSON text.
        other => json!({ "value": other.to_string(), "type": "string" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn derives_envelope_endpoint_from_dsn() {
        let endpoint = envelope_endpoint("https://abc123@o0.ingest.example/42").unwrap();
        assert!(endpoint.starts_with("https://o0.ingest.example/api/42/envelope/"));
        assert!(endpoint.contains("sentry_key=abc123"));
        assert!(endpoint.contains("sentry_version=7"));
    }

    #[test]
    fn rejects_malformed_dsns() {
        assert!(matches!(
            envelope_endpoint("abc123@host/42"),
            Err(DsnError::MissingScheme)
        ));
        assert!(matches!(
            envelope_endpoint("https://host/42"),
            Err(DsnError::MissingPublicKey)
        ));
        assert!(matches!(
            envelope_endpoint("https://abc123@host"),
            Err(DsnError::MissingProjectId)
        ));
    }

    #[test]
    fn encodes_three_line_envelopes_with_typed_attributes() {
        let mut attributes = AttributeMap::new();
        attributes.insert("logger".to_string(), json!("app"));
        attributes.insert("attempt".to_string(), json!(3));
        attributes.insert("ratio".to_string(), json!(0.5));
        attributes.insert("flaky".to_string(), json!(true));

        let envelope = encode_envelope(Level::Error, "boom", &attributes);
        let lines: Vec<&str> = envelope.trim_end().split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "{}");

        let header: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(header["type"], json!("log"));
        assert_eq!(header["item_count"], json!(1));

        let payload: Value = serde_json::from_str(lines[2]).unwrap();
        let item = &payload["items"][0];
        assert_eq!(item["level"], json!("error"));
        assert_eq!(item["body"], json!("boom"));
        assert_eq!(item["attributes"]["logger"]["type"], json!("string"));
        assert_eq!(item["attributes"]["attempt"]["type"], json!("integer"));
        assert_eq!(item["attributes"]["ratio"]["type"], json!("double"));
        assert_eq!(item["attributes"]["flaky"]["type"], json!("boolean"));
    }

    struct CaptureTransport {
        envelopes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for CaptureTransport {
        async fn send(&self, envelope: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.envelopes.lock().unwrap().push(envelope.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn relay_hands_envelopes_to_the_transport() {
        let transport = Arc::new(CaptureTransport {
            envelopes: Mutex::new(Vec::new()),
        });
        let (relay, _handle) = SentryRelay::with_transport(
            Arc::clone(&transport) as Arc<dyn Transport>,
            64,
        );

        assert!(relay.initialized());
        let sink = relay.logger().unwrap();
        sink.log(Level::Warn, "queued", &AttributeMap::new());

        // Drain the channel.
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        let envelopes = transport.envelopes.lock().unwrap();
        assert_eq!(envelopes.len(), 1);
        assert!(envelopes[0].contains("\"queued\""));
        assert_eq!(relay.dropped_envelopes(), 0);
    }
}
