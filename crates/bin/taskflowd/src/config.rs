//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `taskflow.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use taskflow_app::services::action_executor::ExecutorConfig;
use taskflow_app::services::execution_coordinator::{CoordinatorConfig, RetryPolicy};
use taskflow_domain::automation::ActionKind;
use taskflow_domain::metrics::MetricsOptions;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Tick loop, retries and timeouts.
    pub engine: EngineConfig,
    /// Dashboard metrics tunables.
    pub metrics: MetricsConfig,
    /// Webhook ingress settings.
    pub webhooks: WebhooksConfig,
    /// Simulated integration settings.
    pub integrations: IntegrationsConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Engine tunables.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between two schedule planner ticks.
    pub tick_interval_secs: u64,
    /// How long a provider event id is remembered for deduplication.
    pub dedupe_window_secs: u64,
    /// Timeout of one capability call.
    pub action_timeout_secs: u64,
    /// Per action kind overrides of `action_timeout_secs`, keyed by kind
    /// name (`send_email`, `create_task`, ...).
    pub action_timeouts: HashMap<String, u64>,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    /// Added to the worst-case execution time to form the lease TTL.
    pub lease_grace_secs: u64,
}

/// Dashboard metrics configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Number of recent executions listed on the dashboard.
    pub recent_executions: usize,
    /// Minutes of manual work one successful execution is assumed to save.
    pub minutes_saved_per_success: u32,
}

/// Webhook configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebhooksConfig {
    /// Shared HMAC-SHA256 secret. Required unless `allow_unsigned` is set.
    pub signing_secret: Option<String>,
    /// Accept unsigned deliveries when no secret is configured. Local runs only.
    pub allow_unsigned: bool,
}

impl WebhooksConfig {
    /// The configured secret, ignoring an empty value.
    #[must_use]
    pub fn secret(&self) -> Option<&str> {
        self.signing_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
    }
}

/// Simulated integration configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Latency of every simulated provider call.
    pub simulated_latency_ms: u64,
}

impl Config {
    /// Load configuration from `taskflow.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("taskflow.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TASKFLOW_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("TASKFLOW_PORT")
            && let Ok(port) = val.parse()
        {
            self.server.port = port;
        }
        if let Ok(val) = std::env::var("TASKFLOW_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("TASKFLOW_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("TASKFLOW_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("TASKFLOW_WEBHOOK_SECRET") {
            self.webhooks.signing_secret = Some(val);
        }
        if let Ok(val) = std::env::var("TASKFLOW_WEBHOOK_ALLOW_UNSIGNED")
            && let Ok(allow) = val.parse()
        {
            self.webhooks.allow_unsigned = allow;
        }
        if let Ok(val) = std::env::var("TASKFLOW_TICK_INTERVAL_SECS")
            && let Ok(secs) = val.parse()
        {
            self.engine.tick_interval_secs = secs;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.engine.tick_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "tick interval must be non-zero".to_string(),
            ));
        }
        if self.engine.action_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "action timeout must be non-zero".to_string(),
            ));
        }
        if self.engine.dedupe_window_secs == 0 {
            return Err(ConfigError::Validation(
                "dedupe window must be non-zero".to_string(),
            ));
        }
        if self.webhooks.secret().is_none() && !self.webhooks.allow_unsigned {
            return Err(ConfigError::Validation(
                "webhooks.signing_secret is required unless webhooks.allow_unsigned is set"
                    .to_string(),
            ));
        }
        self.engine.executor_config().map(|_| ())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl EngineConfig {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    #[must_use]
    pub fn dedupe_window(&self) -> chrono::Duration {
        i64::try_from(self.dedupe_window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Timeouts for the action executor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an unknown action kind or a
    /// zero timeout.
    pub fn executor_config(&self) -> Result<ExecutorConfig, ConfigError> {
        let mut config = ExecutorConfig::default()
            .with_default_timeout(Duration::from_secs(self.action_timeout_secs));
        for (name, secs) in &self.action_timeouts {
            let kind = ActionKind::from_str(name).map_err(|name| {
                ConfigError::Validation(format!(
                    "unknown action kind `{name}` in action_timeouts"
                ))
            })?;
            if *secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "timeout of `{kind}` must be non-zero"
                )));
            }
            config = config.with_timeout(kind, Duration::from_secs(*secs));
        }
        Ok(config)
    }

    #[must_use]
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff_base: Duration::from_millis(self.backoff_base_ms),
                backoff_cap: Duration::from_millis(self.backoff_cap_ms),
                ..RetryPolicy::default()
            },
            lease_grace: Duration::from_secs(self.lease_grace_secs),
        }
    }
}

impl MetricsConfig {
    #[must_use]
    pub fn options(&self) -> MetricsOptions {
        MetricsOptions {
            recent_limit: self.recent_executions,
            minutes_saved_per_success: self.minutes_saved_per_success,
        }
    }
}

impl IntegrationsConfig {
    #[must_use]
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:taskflow.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "taskflow=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            tick_interval_secs: 30,
            dedupe_window_secs: 24 * 60 * 60,
            action_timeout_secs: 30,
            action_timeouts: HashMap::new(),
            max_retries: retry.max_retries,
            backoff_base_ms: 500,
            backoff_cap_ms: 8_000,
            lease_grace_secs: 30,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let options = MetricsOptions::default();
        Self {
            recent_executions: options.recent_limit,
            minutes_saved_per_success: options.minutes_saved_per_success,
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            simulated_latency_ms: 50,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
