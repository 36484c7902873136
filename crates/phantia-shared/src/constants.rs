//! Application-wide constants

/// Namespace prefix separating Phantia keys from co-tenants on the store.
pub const DEFAULT_KEY_PREFIX: &str = "phantia";

pub const DEFAULT_CONTEXT_TTL_SECS: u64 = 3600;
pub const DEFAULT_STATE_TTL_SECS: u64 = 86_400;
pub const DEFAULT_BUFFER_TTL_SECS: u64 = 300;
pub const DEFAULT_LOCK_TTL_SECS: u64 = 30;

pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
pub const DEFAULT_RATE_MAX_REQUESTS: u64 = 30;

pub const DEFAULT_STORE_HOST: &str = "localhost";
pub const DEFAULT_STORE_PORT: u16 = 6379;
pub const DEFAULT_HTTP_PORT: u16 = 3000;
