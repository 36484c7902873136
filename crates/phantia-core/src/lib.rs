//! # Phantia Core
//!
//! Conversation-state coordination over an expiring key-value store:
//! session context, conversation state, message buffering, the per-conversation
//! processing lock and per-sender rate limiting.
//!
//! Every component holds an `Arc<dyn KeyValueStore>` handed in at construction;
//! the store is the only source of truth and the only synchronization point.

pub mod buffer;
mod codec;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod keys;
pub mod lock;
pub mod rate_limit;
pub mod state;
pub mod store;

pub use buffer::MessageBuffer;
pub use context::SessionContextStore;
pub use coordinator::{Coordinator, IngestOutcome, ProcessingCycle};
pub use error::{KeyError, StateError, StoreError};
pub use keys::{KeyKind, KeySpace};
pub use lock::{LockToken, ProcessingLock};
pub use rate_limit::{RateDecision, RateLimiter};
pub use state::ConversationStateStore;
pub use store::{CycleCommit, KeyValueStore};

/// JSON object used for context, state snapshots and buffered messages.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
