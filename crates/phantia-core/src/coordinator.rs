//! Coordinator
//!
//! Wires every component over one shared store handle and exposes the intake
//! step and the lock-guarded processing cycle used by the orchestrator:
//!
//! 1. `ingest` each inbound message (rate limit, then buffer);
//! 2. `begin_cycle` takes the conversation lock and loads state + buffer;
//! 3. `finish_cycle` saves the new state, drops the consumed messages and
//!    releases the lock as one owner-checked store step (or `abandon_cycle`
//!    just releases it).

use std::sync::Arc;

use phantia_shared::config::{RateLimitSettings, TtlSettings};
use tracing::{debug, info, warn};

use crate::buffer::MessageBuffer;
use crate::context::SessionContextStore;
use crate::error::{StateError, StoreError};
use crate::codec::encode;
use crate::keys::{KeyKind, KeySpace};
use crate::lock::{LockToken, ProcessingLock};
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::state::ConversationStateStore;
use crate::store::{CycleCommit, KeyValueStore};
use crate::JsonMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Buffered { pending: u64 },
    RateLimited { count: u64 },
}

/// A conversation checked out for processing. Holds the lock token.
#[derive(Debug)]
pub struct ProcessingCycle {
    pub remote_jid: String,
    token: LockToken,
    /// `None` for a conversation seen for the first time.
    pub state: Option<JsonMap>,
    pub messages: Vec<JsonMap>,
}

impl ProcessingCycle {
    pub fn is_new_conversation(&self) -> bool {
        self.state.is_none()
    }
}

#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn KeyValueStore>,
    keys: KeySpace,
    state_ttl_secs: u64,
    context: SessionContextStore,
    state: ConversationStateStore,
    buffer: MessageBuffer,
    lock: ProcessingLock,
    rate: RateLimiter,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        keys: KeySpace,
        ttl: TtlSettings,
        rate: RateLimitSettings,
    ) -> Self {
        info!(
            "Initializing coordinator: prefix={}, ttl(context={}s, state={}s, buffer={}s, lock={}s), rate={}/{}s",
            keys.prefix(),
            ttl.context_secs,
            ttl.state_secs,
            ttl.buffer_secs,
            ttl.lock_secs,
            rate.max_requests,
            rate.window_secs
        );
        Self {
            context: SessionContextStore::new(store.clone(), keys.clone(), ttl.context_secs),
            state: ConversationStateStore::new(store.clone(), keys.clone(), ttl.state_secs),
            buffer: MessageBuffer::new(store.clone(), keys.clone(), ttl.buffer_secs),
            lock: ProcessingLock::new(store.clone(), keys.clone(), ttl.lock_secs),
            rate: RateLimiter::new(store.clone(), keys.clone(), rate),
            state_ttl_secs: ttl.state_secs,
            keys,
            store,
        }
    }

    pub fn context(&self) -> &SessionContextStore {
        &self.context
    }

    pub fn state(&self) -> &ConversationStateStore {
        &self.state
    }

    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    pub fn lock(&self) -> &ProcessingLock {
        &self.lock
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    /// Count the message against the sender's window and buffer it if admitted.
    pub async fn ingest(&self, remote_jid: &str, message: &JsonMap) -> Result<IngestOutcome, StateError> {
        match self.rate.hit(remote_jid).await? {
            RateDecision::Limited { count } => Ok(IngestOutcome::RateLimited { count }),
            RateDecision::Allowed { .. } => {
                let pending = self.buffer.append(remote_jid, message).await?;
                Ok(IngestOutcome::Buffered { pending })
            }
        }
    }

    /// `None` when another worker already holds the conversation.
    pub async fn begin_cycle(&self, remote_jid: &str) -> Result<Option<ProcessingCycle>, StateError> {
        let Some(token) = self.lock.acquire(remote_jid).await? else {
            return Ok(None);
        };

        let loaded = async {
            let state = self.state.get(remote_jid).await?;
            let messages = self.buffer.get_all(remote_jid).await?;
            Ok::<_, StateError>((state, messages))
        }
        .await;

        match loaded {
            Ok((state, messages)) => {
                debug!(
                    "Cycle started for {} ({} buffered, new={})",
                    remote_jid,
                    messages.len(),
                    state.is_none()
                );
                Ok(Some(ProcessingCycle {
                    remote_jid: remote_jid.to_string(),
                    token,
                    state,
                    messages,
                }))
            }
            Err(e) => {
                if let Err(release_err) = self.lock.release(remote_jid, &token).await {
                    warn!("Failed to release lock for {} after load error: {}", remote_jid, release_err);
                }
                Err(e)
            }
        }
    }

    /// Persist `new_state`, drop the messages this cycle consumed and release
    /// the lock, all in one store step guarded by the cycle's token. Messages
    /// buffered while the cycle ran stay queued.
    ///
    /// Returns false, having written nothing, if the lock expired and may now
    /// belong to another worker.
    pub async fn finish_cycle(&self, cycle: ProcessingCycle, new_state: &JsonMap) -> Result<bool, StateError> {
        let jid = cycle.remote_jid.as_str();
        let state_key = self.keys.key(KeyKind::State, jid)?;
        let commit = CycleCommit {
            lock_key: self.keys.key(KeyKind::Lock, jid)?,
            token: cycle.token.as_str().to_string(),
            state: encode(&state_key, new_state)?,
            state_key,
            state_ttl_secs: self.state_ttl_secs,
            buffer_key: self.keys.key(KeyKind::Buffer, jid)?,
            consumed: cycle.messages.len() as u64,
        };

        let committed = self.store.commit_cycle(commit).await?;
        if committed {
            debug!("Cycle finished for {} ({} consumed)", jid, cycle.messages.len());
        } else {
            warn!("Cycle for {} lost its lock; results discarded", jid);
        }
        Ok(committed)
    }

    pub async fn abandon_cycle(&self, cycle: ProcessingCycle) -> Result<bool, StateError> {
        self.lock.release(&cycle.remote_jid, &cycle.token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockKeyValueStore;

    fn coordinator(mock: MockKeyValueStore) -> Coordinator {
        Coordinator::new(
            Arc::new(mock),
            KeySpace::default(),
            TtlSettings::default(),
            RateLimitSettings::default(),
        )
    }

    fn cycle(messages: usize) -> ProcessingCycle {
        ProcessingCycle {
            remote_jid: "jid".into(),
            token: LockToken::generate(),
            state: None,
            messages: vec![JsonMap::new(); messages],
        }
    }

    #[tokio::test]
    async fn test_finish_cycle_is_one_owner_checked_commit() {
        let cycle = cycle(2);
        let token = cycle.token.as_str().to_string();
        let mut mock = MockKeyValueStore::new();
        mock.expect_commit_cycle()
            .withf(move |c| {
                c.lock_key == "phantia:lock:jid"
                    && c.token == token
                    && c.state_key == "phantia:state:jid"
                    && c.state == r#"{"stage":"done"}"#
                    && c.state_ttl_secs == 86_400
                    && c.buffer_key == "phantia:buffer:jid"
                    && c.consumed == 2
            })
            .times(1)
            .returning(|_| Ok(true));
        mock.expect_set_ex().never();
        mock.expect_trim_front().never();
        mock.expect_delete_if_equals().never();

        let mut state = JsonMap::new();
        state.insert("stage".into(), "done".into());
        assert!(coordinator(mock).finish_cycle(cycle, &state).await.unwrap());
    }

    #[tokio::test]
    async fn test_finish_cycle_reports_lost_lock() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_commit_cycle().times(1).returning(|_| Ok(false));

        let finished = coordinator(mock).finish_cycle(cycle(1), &JsonMap::new()).await;
        assert!(!finished.unwrap());
    }
}
