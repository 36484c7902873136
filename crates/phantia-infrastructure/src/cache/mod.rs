//! Redis adapter (deadpool-redis pool)

pub mod connection;
mod redis_store;
mod retry;

pub use connection::create_pool;
pub use redis_store::RedisStore;
pub use retry::RetryPolicy;
