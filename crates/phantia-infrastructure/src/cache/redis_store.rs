// ============================================================================
// Phantia Infrastructure - Redis Store
// File: crates/phantia-infrastructure/src/cache/redis_store.rs
// ============================================================================

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{self, Cmd, FromRedisValue, RedisError, RedisResult, Script};
use deadpool_redis::{Connection, Pool};
use phantia_core::{CycleCommit, KeyValueStore, StoreError};
use phantia_shared::config::StoreSettings;
use phantia_shared::AppError;
use tracing::{debug, error, info, warn};

use super::connection::create_pool;
use super::retry::RetryPolicy;

/// Deletes KEYS[1] only while it still holds ARGV[1].
const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// INCR KEYS[1]; attach the ARGV[1] second window only if the key has no expiry.
const INCR_IN_WINDOW: &str = r#"
local count = redis.call("INCR", KEYS[1])
if redis.call("TTL", KEYS[1]) == -1 then
    redis.call("EXPIRE", KEYS[1], ARGV[1])
end
return count
"#;

/// KEYS: lock, state, buffer. ARGV: token, state, state ttl, consumed.
/// Writes only while the lock still holds the token.
const COMMIT_CYCLE: &str = r#"
if redis.call("GET", KEYS[1]) ~= ARGV[1] then
    return 0
end
redis.call("SETEX", KEYS[2], ARGV[3], ARGV[2])
if tonumber(ARGV[4]) > 0 then
    redis.call("LTRIM", KEYS[3], ARGV[4], -1)
end
redis.call("DEL", KEYS[1])
return 1
"#;

/// [`KeyValueStore`] backed by a pooled Redis connection.
///
/// Only connection acquisition is retried. Once a command has been written it
/// is never re-sent, so INCR and RPUSH cannot be applied twice; a command that
/// misses `request_timeout` fails with [`StoreError::Timeout`].
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    request_timeout: Duration,
    retry: RetryPolicy,
    compare_and_delete: Script,
    incr_in_window: Script,
    commit_cycle: Script,
}

impl RedisStore {
    pub fn new(pool: Pool, request_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            pool,
            request_timeout,
            retry,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
            incr_in_window: Script::new(INCR_IN_WINDOW),
            commit_cycle: Script::new(COMMIT_CYCLE),
        }
    }

    /// Build the pool from settings. Does not touch the network; call
    /// [`KeyValueStore::ping`] to verify reachability.
    pub fn connect(settings: &StoreSettings) -> Result<Self, AppError> {
        let pool = create_pool(settings)?;
        info!(
            "Redis pool ready: {}:{} db={} (max {} connections)",
            settings.host, settings.port, settings.db, settings.pool_max_size
        );
        Ok(Self::new(
            pool,
            settings.request_timeout(),
            RetryPolicy::from_settings(settings),
        ))
    }

    async fn connection(&self) -> Result<Connection, StoreError> {
        let mut attempt = 0;
        loop {
            match self.pool.get().await {
                Ok(conn) => return Ok(conn),
                Err(e) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        "Redis connection failed (attempt {}/{}): {}; retrying in {:?}",
                        attempt + 1,
                        self.retry.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("Redis unavailable after {} attempts: {}", attempt + 1, e);
                    return Err(StoreError::Unavailable(e.to_string()));
                }
            }
        }
    }

    async fn within_deadline<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result.map_err(|e| self.classify(e)),
            Err(_) => {
                error!("Redis command exceeded {:?}", self.request_timeout);
                Err(StoreError::Timeout(self.request_timeout))
            }
        }
    }

    async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T, StoreError> {
        let mut conn = self.connection().await?;
        self.within_deadline(cmd.query_async(&mut conn)).await
    }

    fn classify(&self, e: RedisError) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.request_timeout)
        } else if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            error!("Redis connection error: {}", e);
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Command(e.to_string())
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let _: String = self.query(&redis::cmd("PING")).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.query(redis::cmd("SETEX").arg(key).arg(ttl_secs).arg(value))
            .await
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let reply: Option<String> = self
            .query(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_secs),
            )
            .await?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let removed: i64 = self.query(redis::cmd("DEL").arg(key)).await?;
        Ok(removed > 0)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let mut invocation = self.compare_and_delete.key(key);
        invocation.arg(expected);
        let removed: i64 = self
            .within_deadline(invocation.invoke_async(&mut conn))
            .await?;
        Ok(removed > 0)
    }

    async fn push_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<u64, StoreError> {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("RPUSH")
            .arg(key)
            .arg(value)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs)
            .ignore();

        let mut conn = self.connection().await?;
        let (len,): (u64,) = self.within_deadline(pipe.query_async(&mut conn)).await?;
        debug!("RPUSH {} -> {} (ttl={}s)", key, len, ttl_secs);
        Ok(len)
    }

    async fn range_all(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.query(redis::cmd("LRANGE").arg(key).arg(0).arg(-1))
            .await
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        self.query(redis::cmd("LLEN").arg(key)).await
    }

    async fn trim_front(&self, key: &str, count: u64) -> Result<(), StoreError> {
        self.query(redis::cmd("LTRIM").arg(key).arg(count).arg(-1))
            .await
    }

    async fn incr_in_window(&self, key: &str, window_secs: u64) -> Result<i64, StoreError> {
        let mut conn = self.connection().await?;
        let mut invocation = self.incr_in_window.key(key);
        invocation.arg(window_secs);
        self.within_deadline(invocation.invoke_async(&mut conn)).await
    }

    async fn commit_cycle(&self, commit: CycleCommit) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let mut invocation = self.commit_cycle.key(&commit.lock_key);
        invocation
            .key(&commit.state_key)
            .key(&commit.buffer_key)
            .arg(&commit.token)
            .arg(&commit.state)
            .arg(commit.state_ttl_secs)
            .arg(commit.consumed);
        let applied: i64 = self
            .within_deadline(invocation.invoke_async(&mut conn))
            .await?;
        debug!("Cycle commit on {} -> {}", commit.lock_key, applied);
        Ok(applied == 1)
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, StoreError> {
        // -2: missing, -1: no expiry
        let secs: i64 = self.query(redis::cmd("TTL").arg(key)).await?;
        Ok(u64::try_from(secs).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_settings() -> StoreSettings {
        StoreSettings {
            // Port 1 on loopback refuses connections immediately
            host: "127.0.0.1".into(),
            port: 1,
            connect_timeout_ms: 200,
            request_timeout_ms: 200,
            max_retries: 2,
            retry_base_ms: 1,
            retry_max_ms: 5,
            ..StoreSettings::default()
        }
    }

    #[tokio::test]
    async fn test_unreachable_store_reports_unavailable() {
        let store = RedisStore::connect(&unreachable_settings()).unwrap();
        let err = store.get("phantia:context:s1").await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_scripts() {
        let store = RedisStore::connect(&unreachable_settings()).unwrap();
        assert!(store.incr_in_window("phantia:rate:jid", 60).await.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_ping() {
        let store = RedisStore::connect(&unreachable_settings()).unwrap();
        assert!(store.ping().await.is_err());
    }
}
