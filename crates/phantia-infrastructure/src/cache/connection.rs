//! Redis connection pool

use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use phantia_shared::config::StoreSettings;
use phantia_shared::AppError;

/// Build the pool. Connections are opened lazily; waiting for, creating and
/// recycling a connection are all bounded by `connect_timeout_ms`.
pub fn create_pool(settings: &StoreSettings) -> Result<Pool, AppError> {
    let mut cfg = Config::from_url(settings.connection_url());

    let mut pool_cfg = PoolConfig::new(settings.pool_max_size.max(1));
    pool_cfg.timeouts.wait = Some(settings.connect_timeout());
    pool_cfg.timeouts.create = Some(settings.connect_timeout());
    pool_cfg.timeouts.recycle = Some(settings.connect_timeout());
    cfg.pool = Some(pool_cfg);

    cfg.create_pool(Some(Runtime::Tokio1))
        .map_err(|e| AppError::StoreBootstrap(e.to_string()))
}
