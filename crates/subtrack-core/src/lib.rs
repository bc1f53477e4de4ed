//! Subtrack Core Library
//!
//! This crate provides the domain models, billing-cycle arithmetic, error types,
//! configuration and validation shared across all Subtrack components.

pub mod config;
pub mod constants;
pub mod error;
pub mod hooks;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use hooks::NotificationChannel;
