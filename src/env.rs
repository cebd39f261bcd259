/// Environment variable names used by this crate for convenient
/// configuration from deployment environments.
///
/// These are purely helpers; the forwarder core stays decoupled from
/// environment access apart from the ambient `environment` label.

/// Sentry DSN, e.g. `https://public_key@o0.ingest.sentry.io/42`.
pub const SENTRY_DSN_ENV: &str = "SENTRY_DSN";

/// Deployment environment label attached to every forwarded event,
/// e.g. `production` or `staging`.
pub const SENTRY_ENVIRONMENT_ENV: &str = "SENTRY_ENVIRONMENT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
