//! Per-conversation processing lock
//!
//! States: unlocked -> (acquire) -> held by one token -> (release, TTL expiry
//! or force_release) -> unlocked.
//!
//! Acquisition is a single `SET NX EX` carrying a random token, never a
//! read-then-write. Release is a compare-and-delete on that token, so a holder
//! that outlived its TTL cannot remove a lock that has since been taken by
//! another worker.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StateError;
use crate::keys::{KeyKind, KeySpace};
use crate::store::KeyValueStore;

/// Proof of ownership returned by a successful acquire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone)]
pub struct ProcessingLock {
    store: Arc<dyn KeyValueStore>,
    keys: KeySpace,
    default_ttl_secs: u64,
}

impl ProcessingLock {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: KeySpace, default_ttl_secs: u64) -> Self {
        Self {
            store,
            keys,
            default_ttl_secs,
        }
    }

    /// `Some(token)` iff this caller became the holder. Contention is `None`,
    /// not an error.
    pub async fn acquire(&self, remote_jid: &str) -> Result<Option<LockToken>, StateError> {
        self.acquire_with_ttl(remote_jid, self.default_ttl_secs).await
    }

    pub async fn acquire_with_ttl(
        &self,
        remote_jid: &str,
        ttl_secs: u64,
    ) -> Result<Option<LockToken>, StateError> {
        let key = self.keys.key(KeyKind::Lock, remote_jid)?;
        let token = LockToken::generate();
        if self.store.set_nx_ex(&key, token.as_str(), ttl_secs).await? {
            debug!("Lock acquired: {} (ttl={}s)", key, ttl_secs);
            Ok(Some(token))
        } else {
            debug!("Lock busy: {}", key);
            Ok(None)
        }
    }

    /// Release only if `token` still owns the lock. Returns false when the lock
    /// expired or now belongs to someone else.
    pub async fn release(&self, remote_jid: &str, token: &LockToken) -> Result<bool, StateError> {
        let key = self.keys.key(KeyKind::Lock, remote_jid)?;
        let released = self.store.delete_if_equals(&key, token.as_str()).await?;
        if released {
            debug!("Lock released: {}", key);
        } else {
            warn!("Lock {} no longer held by this worker; left untouched", key);
        }
        Ok(released)
    }

    /// Unconditional delete, regardless of owner. For operator recovery only:
    /// it can remove a lock another worker acquired after our TTL lapsed.
    pub async fn force_release(&self, remote_jid: &str) -> Result<(), StateError> {
        let key = self.keys.key(KeyKind::Lock, remote_jid)?;
        warn!("Force-releasing lock: {}", key);
        self.store.del(&key).await?;
        Ok(())
    }

    pub async fn is_locked(&self, remote_jid: &str) -> Result<bool, StateError> {
        let key = self.keys.key(KeyKind::Lock, remote_jid)?;
        Ok(self.store.get(&key).await?.is_some())
    }
}
