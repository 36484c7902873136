//! # Phantia Shared
//!
//! Configuration, telemetry and shared error types for the Phantia workspace.

pub mod config;
pub mod constants;
pub mod error;
pub mod telemetry;

pub use config::AppConfig;
pub use error::AppError;
