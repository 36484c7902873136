//! Conversation state store
//!
//! Durable orchestrator snapshot per conversation. Absence is meaningful here
//! (it marks a new conversation), so reads return `None` for a missing key and
//! surface undecodable payloads as [`StateError::Corrupt`].

use std::sync::Arc;

use tracing::debug;

use crate::codec::{decode, encode};
use crate::error::StateError;
use crate::keys::{KeyKind, KeySpace};
use crate::store::KeyValueStore;
use crate::JsonMap;

#[derive(Clone)]
pub struct ConversationStateStore {
    store: Arc<dyn KeyValueStore>,
    keys: KeySpace,
    default_ttl_secs: u64,
}

impl ConversationStateStore {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: KeySpace, default_ttl_secs: u64) -> Self {
        Self {
            store,
            keys,
            default_ttl_secs,
        }
    }

    pub async fn save(&self, remote_jid: &str, state: &JsonMap) -> Result<(), StateError> {
        self.save_with_ttl(remote_jid, state, self.default_ttl_secs).await
    }

    /// Whole-value replace; no merge with the previous snapshot.
    pub async fn save_with_ttl(
        &self,
        remote_jid: &str,
        state: &JsonMap,
        ttl_secs: u64,
    ) -> Result<(), StateError> {
        let key = self.keys.key(KeyKind::State, remote_jid)?;
        debug!("Saving conversation state: {} (ttl={}s)", key, ttl_secs);
        let payload = encode(&key, state)?;
        self.store.set_ex(&key, &payload, ttl_secs).await?;
        Ok(())
    }

    pub async fn get(&self, remote_jid: &str) -> Result<Option<JsonMap>, StateError> {
        let key = self.keys.key(KeyKind::State, remote_jid)?;
        match self.store.get(&key).await? {
            Some(raw) => decode(&key, &raw).map(Some),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, remote_jid: &str) -> Result<(), StateError> {
        let key = self.keys.key(KeyKind::State, remote_jid)?;
        self.store.del(&key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockKeyValueStore;

    fn state_store(mock: MockKeyValueStore) -> ConversationStateStore {
        ConversationStateStore::new(Arc::new(mock), KeySpace::default(), 86_400)
    }

    #[tokio::test]
    async fn test_absent_is_none_and_empty_is_some() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get()
            .withf(|key| key == "phantia:state:new")
            .returning(|_| Ok(None));
        mock.expect_get()
            .withf(|key| key == "phantia:state:known")
            .returning(|_| Ok(Some("{}".to_string())));

        let store = state_store(mock);
        assert_eq!(store.get("new").await.unwrap(), None);
        assert_eq!(store.get("known").await.unwrap(), Some(JsonMap::new()));
    }

    #[tokio::test]
    async fn test_corrupt_state_is_surfaced() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get().returning(|_| Ok(Some("garbage".to_string())));

        let err = state_store(mock).get("jid").await.unwrap_err();
        match err {
            StateError::Corrupt { key, .. } => assert_eq!(key, "phantia:state:jid"),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_save_uses_default_ttl() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_set_ex()
            .withf(|key, value, ttl| key == "phantia:state:jid" && value == "{}" && *ttl == 86_400)
            .times(1)
            .returning(|_, _, _| Ok(()));

        state_store(mock).save("jid", &JsonMap::new()).await.unwrap();
    }
}
