//! Configuration module for the verification proxy
//!
//! This module provides the `ProxyConfig` struct, its setters and getters,
//! validation, and loading from file and environment.

// Sub-modules
pub mod getters;
pub mod loader;
pub mod methods;
pub mod types;

// Re-exports for public API
pub use loader::{CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE, ENV_KEYS};
pub use types::ProxyConfig;
