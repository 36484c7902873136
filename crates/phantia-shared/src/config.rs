//! Configuration management

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::constants::*;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub store: StoreSettings,
    pub ttl: TtlSettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub log_dir: String,
}

impl AppSettings {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    /// Full connection URL; when set, host/port/password/db are ignored.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    pub key_prefix: String,
    pub pool_max_size: usize,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl StoreSettings {
    /// Connection URL in `redis://[:password@]host:port/db` form.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!("redis://:{}@{}:{}/{}", password, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: DEFAULT_STORE_HOST.to_string(),
            port: DEFAULT_STORE_PORT,
            password: None,
            db: 0,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            pool_max_size: 16,
            connect_timeout_ms: 2_000,
            request_timeout_ms: 1_000,
            max_retries: 3,
            retry_base_ms: 100,
            retry_max_ms: 3_000,
        }
    }
}

/// Per-entity expiry policy, in seconds.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TtlSettings {
    pub context_secs: u64,
    pub state_secs: u64,
    pub buffer_secs: u64,
    pub lock_secs: u64,
}

impl Default for TtlSettings {
    fn default() -> Self {
        Self {
            context_secs: DEFAULT_CONTEXT_TTL_SECS,
            state_secs: DEFAULT_STATE_TTL_SECS,
            buffer_secs: DEFAULT_BUFFER_TTL_SECS,
            lock_secs: DEFAULT_LOCK_TTL_SECS,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub max_requests: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_RATE_WINDOW_SECS,
            max_requests: DEFAULT_RATE_MAX_REQUESTS,
        }
    }
}

impl AppConfig {
    /// Load from `config/default`, `config/{APP_ENV}`, `PHANTIA__*` env vars,
    /// then the legacy `REDIS_*`, `PORT` and `LOG_LEVEL` variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let store = StoreSettings::default();
        let ttl = TtlSettings::default();
        let rate = RateLimitSettings::default();

        let config = Config::builder()
            .set_default("app.env", env.clone())?
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", DEFAULT_HTTP_PORT)?
            .set_default("app.name", "phantia")?
            .set_default("app.log_dir", "logs")?
            .set_default("store.host", store.host)?
            .set_default("store.port", store.port)?
            .set_default("store.db", store.db)?
            .set_default("store.key_prefix", store.key_prefix)?
            .set_default("store.pool_max_size", store.pool_max_size as u64)?
            .set_default("store.connect_timeout_ms", store.connect_timeout_ms)?
            .set_default("store.request_timeout_ms", store.request_timeout_ms)?
            .set_default("store.max_retries", store.max_retries)?
            .set_default("store.retry_base_ms", store.retry_base_ms)?
            .set_default("store.retry_max_ms", store.retry_max_ms)?
            .set_default("ttl.context_secs", ttl.context_secs)?
            .set_default("ttl.state_secs", ttl.state_secs)?
            .set_default("ttl.buffer_secs", ttl.buffer_secs)?
            .set_default("ttl.lock_secs", ttl.lock_secs)?
            .set_default("rate_limit.window_secs", rate.window_secs)?
            .set_default("rate_limit.max_requests", rate.max_requests)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("PHANTIA")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("store.host", std::env::var("REDIS_HOST").ok())?
            .set_override_option("store.port", std::env::var("REDIS_PORT").ok())?
            .set_override_option("store.password", std::env::var("REDIS_PASSWORD").ok())?
            .set_override_option("app.port", std::env::var("PORT").ok())?
            .build()?;

        let parsed: AppConfig = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.key_prefix.is_empty() || self.store.key_prefix.contains(':') {
            return Err(ConfigError::Message(format!(
                "store.key_prefix must be non-empty and must not contain ':' (got {:?})",
                self.store.key_prefix
            )));
        }
        if self.rate_limit.window_secs == 0 || self.rate_limit.max_requests == 0 {
            return Err(ConfigError::Message(
                "rate_limit.window_secs and rate_limit.max_requests must be positive".into(),
            ));
        }
        let ttl = &self.ttl;
        if [ttl.context_secs, ttl.state_secs, ttl.buffer_secs, ttl.lock_secs].contains(&0) {
            return Err(ConfigError::Message("ttl values must be positive".into()));
        }
        Ok(())
    }
}
