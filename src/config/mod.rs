//! Configuration module for the dispatch engine
//!
//! This module provides the `DispatchConfig` struct, its type-safe builder
//! and the environment loader used by the binary.

// Sub-modules
pub mod builder;
pub mod env;
pub mod getters;
pub mod methods;
pub mod types;

// Re-exports for public API
pub use builder::{DispatchConfigBuilder, WithApiKey, WithEndpoint};
pub use types::DispatchConfig;
