//! # Phantia Infrastructure
//!
//! Store adapters implementing [`phantia_core::KeyValueStore`]: Redis (pooled)
//! and an in-process store with the same semantics.

pub mod cache;
pub mod memory;

pub use cache::{create_pool, RedisStore, RetryPolicy};
pub use memory::MemoryStore;
