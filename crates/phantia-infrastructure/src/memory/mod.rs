//! In-process expiring store

mod entry;
mod store;

pub use store::MemoryStore;
