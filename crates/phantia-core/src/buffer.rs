//! Message buffer
//!
//! Pending inbound messages per conversation, oldest first. Every append
//! resets the buffer TTL (sliding window), so a burst keeps the buffer alive
//! while a long silence evicts it even if nobody drains it.

use std::sync::Arc;

use tracing::debug;

use crate::codec::{decode, encode};
use crate::error::StateError;
use crate::keys::{KeyKind, KeySpace};
use crate::store::KeyValueStore;
use crate::JsonMap;

#[derive(Clone)]
pub struct MessageBuffer {
    store: Arc<dyn KeyValueStore>,
    keys: KeySpace,
    ttl_secs: u64,
}

impl MessageBuffer {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: KeySpace, ttl_secs: u64) -> Self {
        Self {
            store,
            keys,
            ttl_secs,
        }
    }

    /// Append to the tail and restart the TTL. Uses the store's atomic
    /// push so concurrent appenders never overwrite each other.
    /// Returns the number of buffered messages.
    pub async fn append(&self, remote_jid: &str, message: &JsonMap) -> Result<u64, StateError> {
        let key = self.keys.key(KeyKind::Buffer, remote_jid)?;
        let payload = encode(&key, message)?;
        let len = self.store.push_with_ttl(&key, &payload, self.ttl_secs).await?;
        debug!("Buffered message for {} ({} pending)", remote_jid, len);
        Ok(len)
    }

    /// All buffered messages, oldest first. Does not drain.
    pub async fn get_all(&self, remote_jid: &str) -> Result<Vec<JsonMap>, StateError> {
        let key = self.keys.key(KeyKind::Buffer, remote_jid)?;
        self.store
            .range_all(&key)
            .await?
            .iter()
            .map(|raw| decode(&key, raw))
            .collect()
    }

    pub async fn len(&self, remote_jid: &str) -> Result<u64, StateError> {
        let key = self.keys.key(KeyKind::Buffer, remote_jid)?;
        Ok(self.store.list_len(&key).await?)
    }

    /// Remove the whole buffer.
    pub async fn clear(&self, remote_jid: &str) -> Result<(), StateError> {
        let key = self.keys.key(KeyKind::Buffer, remote_jid)?;
        debug!("Clearing buffer: {}", key);
        self.store.del(&key).await?;
        Ok(())
    }

    /// Drop only the `count` oldest messages, keeping anything appended after
    /// they were read.
    pub async fn discard_front(&self, remote_jid: &str, count: u64) -> Result<(), StateError> {
        if count == 0 {
            return Ok(());
        }
        let key = self.keys.key(KeyKind::Buffer, remote_jid)?;
        self.store.trim_front(&key, count).await?;
        Ok(())
    }
}
