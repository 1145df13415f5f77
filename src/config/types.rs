//! Core configuration type for the proxy
//!
//! `ProxyConfig` carries everything the listener, the hasher and the mixing
//! pipeline need. Values come from defaults, then an optional config file,
//! then `ANON_*` environment variables, then command-line flags.

use std::fmt;

use crate::mixing::{
    DEFAULT_BATCH_SIZE, DEFAULT_JITTER_MAX_MS, DEFAULT_JITTER_MIN_MS, DEFAULT_TIMEOUT_GRACE_MS,
};
use crate::tracking::{DEFAULT_CACHE_EVICT_CHUNK, DEFAULT_CACHE_MAX_ENTRIES};

/// Main configuration struct for the verification proxy
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub(crate) port: u16,
    pub(crate) bind_address: String,

    /// Decision service endpoint; receives `POST {"idval": ...}`
    pub(crate) backend_api_url: String,

    /// Whole-request timeout for one backend call
    ///
    /// Handlers wait `backend_timeout_ms + timeout_grace_ms` before giving up.
    ///
    /// Default: 5000
    pub(crate) backend_timeout_ms: u64,

    /// TCP connect timeout for backend calls
    ///
    /// Default: 3000
    pub(crate) connect_timeout_ms: u64,

    /// Maximum client requests handled concurrently
    ///
    /// Each handler parks on its completion cell, so this also bounds the
    /// number of waiters.
    ///
    /// Default: 1000
    pub(crate) max_connections: usize,

    /// Salt wrapped around identifiers before hashing (`salt ∥ id ∥ salt`)
    pub(crate) hash_salt: String,

    pub(crate) cache_max_entries: usize,
    pub(crate) cache_evict_chunk: usize,

    /// Per-item jitter range applied before each backend call
    ///
    /// Default: 100..=2000 ms
    pub(crate) jitter_min_ms: u64,
    pub(crate) jitter_max_ms: u64,

    /// Requests drained per worker wake-up
    ///
    /// Default: 20
    pub(crate) batch_size: usize,

    /// Extra wait beyond the backend timeout before a handler declares timeout
    ///
    /// Default: 3000
    pub(crate) timeout_grace_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            backend_api_url: "http://localhost:9090/verify".to_string(),
            backend_timeout_ms: 5000,
            connect_timeout_ms: 3000,
            max_connections: 1000,
            hash_salt: String::new(),
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            cache_evict_chunk: DEFAULT_CACHE_EVICT_CHUNK,
            jitter_min_ms: DEFAULT_JITTER_MIN_MS,
            jitter_max_ms: DEFAULT_JITTER_MAX_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_grace_ms: DEFAULT_TIMEOUT_GRACE_MS,
        }
    }
}

// Salt stays out of logs
impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("port", &self.port)
            .field("bind_address", &self.bind_address)
            .field("backend_api_url", &self.backend_api_url)
            .field("backend_timeout_ms", &self.backend_timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("max_connections", &self.max_connections)
            .field(
                "hash_salt",
                &if self.hash_salt.is_empty() {
                    "<empty>"
                } else {
                    "<redacted>"
                },
            )
            .field("cache_max_entries", &self.cache_max_entries)
            .field("cache_evict_chunk", &self.cache_evict_chunk)
            .field("jitter_min_ms", &self.jitter_min_ms)
            .field("jitter_max_ms", &self.jitter_max_ms)
            .field("batch_size", &self.batch_size)
            .field("timeout_grace_ms", &self.timeout_grace_ms)
            .finish()
    }
}
