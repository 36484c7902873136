//! Session context store
//!
//! Open-ended per-session data with a TTL refreshed on every write. Reads fail
//! open: an absent or undecodable payload reads as an empty context.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{decode, encode};
use crate::error::StateError;
use crate::keys::{KeyKind, KeySpace};
use crate::store::KeyValueStore;
use crate::JsonMap;

#[derive(Clone)]
pub struct SessionContextStore {
    store: Arc<dyn KeyValueStore>,
    keys: KeySpace,
    default_ttl_secs: u64,
}

impl SessionContextStore {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: KeySpace, default_ttl_secs: u64) -> Self {
        Self {
            store,
            keys,
            default_ttl_secs,
        }
    }

    /// Overwrite the context with the default TTL.
    pub async fn save(&self, session_id: &str, context: &JsonMap) -> Result<(), StateError> {
        self.save_with_ttl(session_id, context, self.default_ttl_secs).await
    }

    pub async fn save_with_ttl(
        &self,
        session_id: &str,
        context: &JsonMap,
        ttl_secs: u64,
    ) -> Result<(), StateError> {
        let key = self.keys.key(KeyKind::Context, session_id)?;
        debug!("Saving context: {} (ttl={}s)", key, ttl_secs);
        let payload = encode(&key, context)?;
        self.store.set_ex(&key, &payload, ttl_secs).await?;
        Ok(())
    }

    /// Current context, or an empty map when absent, expired or corrupt.
    pub async fn get(&self, session_id: &str) -> Result<JsonMap, StateError> {
        let key = self.keys.key(KeyKind::Context, session_id)?;
        debug!("Fetching context: {}", key);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(JsonMap::new());
        };
        match decode::<JsonMap>(&key, &raw) {
            Ok(context) => Ok(context),
            Err(e) => {
                warn!("Discarding unreadable context: {}", e);
                Ok(JsonMap::new())
            }
        }
    }

    /// Shallow merge: top-level keys from `updates` replace existing ones.
    ///
    /// The merged context is written with the default TTL, so a custom TTL from
    /// an earlier `save_with_ttl` does not survive an update.
    pub async fn update(&self, session_id: &str, updates: JsonMap) -> Result<JsonMap, StateError> {
        let mut merged = self.get(session_id).await?;
        merged.extend(updates);
        self.save(session_id, &merged).await?;
        Ok(merged)
    }

    /// Idempotent removal.
    pub async fn delete(&self, session_id: &str) -> Result<(), StateError> {
        let key = self.keys.key(KeyKind::Context, session_id)?;
        debug!("Deleting context: {}", key);
        self.store.del(&key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MockKeyValueStore;
    use serde_json::json;

    fn context_store(mock: MockKeyValueStore) -> SessionContextStore {
        SessionContextStore::new(Arc::new(mock), KeySpace::default(), 3600)
    }

    #[tokio::test]
    async fn test_corrupt_payload_reads_as_empty() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get()
            .withf(|key| key == "phantia:context:s1")
            .returning(|_| Ok(Some("{not json".to_string())));

        let ctx = context_store(mock).get("s1").await.unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_non_object_payload_reads_as_empty() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get().returning(|_| Ok(Some("[1,2,3]".to_string())));

        assert!(context_store(mock).get("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_writes_with_default_ttl() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get()
            .returning(|_| Ok(Some(r#"{"a":1,"b":2}"#.to_string())));
        mock.expect_set_ex()
            .withf(|key, value, ttl| {
                let merged: JsonMap = serde_json::from_str(value).unwrap();
                key == "phantia:context:s1"
                    && *ttl == 3600
                    && merged.get("a") == Some(&json!(1))
                    && merged.get("b") == Some(&json!(3))
                    && merged.get("c") == Some(&json!(4))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let updates = json!({"b": 3, "c": 4}).as_object().cloned().unwrap();
        let merged = context_store(mock).update("s1", updates).await.unwrap();
        assert_eq!(merged.len(), 3);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get()
            .returning(|_| Err(StoreError::Unavailable("connection refused".into())));

        let err = context_store(mock).get("s1").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_session_id_rejected_before_store_call() {
        let mock = MockKeyValueStore::new();
        let err = context_store(mock).delete("").await.unwrap_err();
        assert!(matches!(err, StateError::Key(_)));
    }
}
