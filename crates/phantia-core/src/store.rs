//! Expiring key-value store port
//!
//! The command set mirrors Redis: GET, SETEX, `SET NX EX`, DEL, RPUSH + EXPIRE,
//! LRANGE, LLEN, LTRIM, INCR + EXPIRE, TTL and PING, plus a compare-and-delete
//! and the owner-checked cycle commit. Every method is a single round trip and
//! atomic. Adapters must be safe to share across tasks.

use async_trait::async_trait;

use crate::error::StoreError;

/// Writes that close a processing cycle, applied only while `lock_key` still
/// holds `token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleCommit {
    pub lock_key: String,
    pub token: String,
    pub state_key: String,
    pub state: String,
    pub state_ttl_secs: u64,
    pub buffer_key: String,
    /// Messages to drop from the head of the buffer.
    pub consumed: u64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// SETEX: unconditional overwrite of value and expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// `SET key value NX EX ttl`; true iff the key was absent and is now set.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, StoreError>;

    /// Returns whether a key was removed.
    async fn del(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete only if the stored value equals `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Append to the tail of a list and reset its expiry in one atomic step.
    /// Returns the list length after the append.
    async fn push_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<u64, StoreError>;

    /// Whole list, head to tail.
    async fn range_all(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn list_len(&self, key: &str) -> Result<u64, StoreError>;

    /// Drop the first `count` elements (LTRIM key count -1).
    async fn trim_front(&self, key: &str, count: u64) -> Result<(), StoreError>;

    /// INCR, and set the expiry to `window_secs` whenever the counter has
    /// none. An existing expiry is never moved.
    async fn incr_in_window(&self, key: &str, window_secs: u64) -> Result<i64, StoreError>;

    /// If the lock still holds the token: SETEX the state, LTRIM the consumed
    /// messages and delete the lock. Otherwise write nothing and return false.
    async fn commit_cycle(&self, commit: CycleCommit) -> Result<bool, StoreError>;

    /// Remaining lifetime in seconds; `None` if the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<u64>, StoreError>;
}
