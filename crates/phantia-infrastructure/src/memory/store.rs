use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use phantia_core::{CycleCommit, KeyValueStore, StoreError};
use tokio::time::Instant;
use tracing::debug;

use super::entry::{Entry, Value};

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// Expiring key-value store held in process memory.
///
/// Each command runs under the DashMap shard lock for its key, which gives the
/// same per-key atomicity Redis does. `commit_cycle` spans three keys: it reads
/// the lock and writes the others against one clock reading, so a lock seen
/// as held is treated as held for the whole commit. Expired entries are dropped lazily on
/// access or by [`MemoryStore::purge_expired`]. Clock reads go through
/// `tokio::time`, so tests can drive expiry with a paused clock.
///
/// State lives in this process only: use it for tests and single-instance
/// development, never to coordinate several server processes.
#[derive(Default)]
pub struct MemoryStore {
    map: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live keys (expired entries not yet purged are excluded).
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.map.iter().filter(|r| !r.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// List live keys matching the given prefix (empty = all keys)
    pub fn keys(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        self.map
            .iter()
            .filter(|r| r.key().starts_with(prefix) && !r.is_expired(now))
            .map(|r| r.key().clone())
            .collect()
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.map.len();
        self.map.retain(|_, e| !e.is_expired(now));
        let removed = before.saturating_sub(self.map.len());
        if removed > 0 {
            debug!("Purged {} expired keys", removed);
        }
        removed
    }

    /// Entry for `key` with any expired value already evicted.
    fn live_entry(&self, key: &str, now: Instant) -> MapEntry<'_, String, Entry> {
        match self.map.entry(key.to_string()) {
            MapEntry::Occupied(o) if o.get().is_expired(now) => {
                let vacant_key = o.key().clone();
                o.remove();
                self.map.entry(vacant_key)
            }
            other => other,
        }
    }
}

fn ttl(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let Some(entry) = self.map.get(key) else {
            return Ok(None);
        };
        if entry.is_expired(now) {
            drop(entry);
            self.map.remove_if(key, |_, e| e.is_expired(now));
            return Ok(None);
        }
        match &entry.value {
            Value::Text(v) => Ok(Some(v.clone())),
            Value::List(_) => Err(StoreError::Command(WRONGTYPE.into())),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let now = Instant::now();
        self.map
            .insert(key.to_string(), Entry::text(value, Some(ttl(ttl_secs)), now));
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.live_entry(key, now) {
            MapEntry::Occupied(_) => Ok(false),
            MapEntry::Vacant(v) => {
                v.insert(Entry::text(value, Some(ttl(ttl_secs)), now));
                Ok(true)
            }
        }
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(self
            .map
            .remove(key)
            .is_some_and(|(_, e)| !e.is_expired(now)))
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let removed = self.map.remove_if(key, |_, e| {
            !e.is_expired(now) && matches!(&e.value, Value::Text(v) if v == expected)
        });
        Ok(removed.is_some())
    }

    async fn push_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut entry = self.live_entry(key, now).or_insert_with(Entry::empty_list);
        let Value::List(items) = &mut entry.value else {
            return Err(StoreError::Command(WRONGTYPE.into()));
        };
        items.push_back(value.to_string());
        let len = items.len() as u64;
        entry.expires_at = Some(now + ttl(ttl_secs));
        Ok(len)
    }

    async fn range_all(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        match self.map.get(key) {
            Some(e) if !e.is_expired(now) => match &e.value {
                Value::List(items) => Ok(items.iter().cloned().collect()),
                Value::Text(_) => Err(StoreError::Command(WRONGTYPE.into())),
            },
            _ => Ok(Vec::new()),
        }
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        match self.map.get(key) {
            Some(e) if !e.is_expired(now) => match &e.value {
                Value::List(items) => Ok(items.len() as u64),
                Value::Text(_) => Err(StoreError::Command(WRONGTYPE.into())),
            },
            _ => Ok(0),
        }
    }

    async fn trim_front(&self, key: &str, count: u64) -> Result<(), StoreError> {
        let now = Instant::now();
        if let MapEntry::Occupied(mut o) = self.live_entry(key, now) {
            let Value::List(items) = &mut o.get_mut().value else {
                return Err(StoreError::Command(WRONGTYPE.into()));
            };
            let n = (count as usize).min(items.len());
            items.drain(..n);
            // Redis removes a list once it becomes empty
            if items.is_empty() {
                o.remove();
            }
        }
        Ok(())
    }

    async fn incr_in_window(&self, key: &str, window_secs: u64) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut entry = match self.live_entry(key, now) {
            MapEntry::Vacant(v) => v.insert(Entry::text("0", None, now)),
            MapEntry::Occupied(o) => o.into_ref(),
        };
        let Value::Text(raw) = &mut entry.value else {
            return Err(StoreError::Command(WRONGTYPE.into()));
        };
        let next = raw
            .parse::<i64>()
            .ok()
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| StoreError::Command("ERR value is not an integer or out of range".into()))?;
        *raw = next.to_string();
        // an existing window is never moved
        if entry.expires_at.is_none() {
            entry.expires_at = Some(now + ttl(window_secs));
        }
        Ok(next)
    }

    async fn commit_cycle(&self, commit: CycleCommit) -> Result<bool, StoreError> {
        let now = Instant::now();
        let held = self.map.get(&commit.lock_key).is_some_and(|e| {
            !e.is_expired(now) && matches!(&e.value, Value::Text(v) if *v == commit.token)
        });
        if !held {
            return Ok(false);
        }

        self.map.insert(
            commit.state_key,
            Entry::text(commit.state, Some(ttl(commit.state_ttl_secs)), now),
        );
        self.trim_front(&commit.buffer_key, commit.consumed).await?;
        self.map
            .remove_if(&commit.lock_key, |_, e| matches!(&e.value, Value::Text(v) if *v == commit.token));
        Ok(true)
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = Instant::now();
        Ok(self
            .map
            .get(key)
            .filter(|e| !e.is_expired(now))
            .and_then(|e| e.ttl_secs(now)))
    }
}
