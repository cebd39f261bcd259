use crate::backend::{self, Backend};
use crate::forwarder::{Forwarder, ForwarderConfig};
use crate::layer::ForwarderLayer;
use crate::level::Level;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Options for [`init_forwarder_with_config`].
///
/// **Fields**
/// - `level`: minimum severity forwarded to the backend.
/// - `host`: host label attached to every event.
/// - `application`: application label attached to every event.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked on top so events also print to the console.
#[derive(Clone, Debug)]
pub struct InitConfig {
    pub level: Level,
    pub host: Option<String>,
    pub application: Option<String>,
    pub enable_stdout: bool,
}

impl Default for InitConfig {
    fn default() -> Self {
        InitConfig {
            level: Level::Info,
            host: None,
            application: None,
            enable_stdout: true,
        }
    }
}

/// Install `backend` as the process-global backend and set up the global
/// `tracing` subscriber with a [`ForwarderLayer`] built from `config`.
///
/// **Effects**
///
/// After this call every `tracing` event in the process at or above
/// `config.level` is translated and forwarded to the backend's sink.
pub fn init_forwarder_with_config(backend: Arc<dyn Backend>, config: InitConfig) {
    backend::install(backend);

    let forwarder = Forwarder::new(ForwarderConfig {
        level: config.level,
        host: config.host,
        application: config.application,
        ..ForwarderConfig::default()
    });
    let layer = ForwarderLayer::new(forwarder);

    // The forwarding layer is always attached; the `fmt` layer is added on
    // demand. Assembled in two variants for subscriber type compatibility.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
    }
}

/// Initialize forwarding with sensible defaults.
///
/// Equivalent to calling [`init_forwarder_with_config`] with
/// [`InitConfig::default`]. This is the recommended entrypoint for typical
/// services.
pub fn init_forwarder(backend: Arc<dyn Backend>) {
    init_forwarder_with_config(backend, InitConfig::default());
}
