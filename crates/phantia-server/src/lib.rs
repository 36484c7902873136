//! # Phantia Server
//!
//! HTTP intake for the coordination layer: health probe and the inbound
//! message webhook.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
