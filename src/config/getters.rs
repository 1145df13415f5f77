//! Getter methods for `ProxyConfig`

use std::net::SocketAddr;
use std::time::Duration;

use super::types::ProxyConfig;
use crate::mixing::{Jitter, MixerConfig};

impl ProxyConfig {
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    /// `bind_address:port`, if the address parses
    #[must_use]
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port).parse().ok()
    }

    #[must_use]
    pub fn backend_api_url(&self) -> &str {
        &self.backend_api_url
    }

    #[must_use]
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn timeout_grace(&self) -> Duration {
        Duration::from_millis(self.timeout_grace_ms)
    }

    /// How long a handler waits on its completion cell
    #[must_use]
    pub fn wait_deadline(&self) -> Duration {
        self.backend_timeout() + self.timeout_grace()
    }

    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    #[must_use]
    pub fn hash_salt(&self) -> &str {
        &self.hash_salt
    }

    #[must_use]
    pub fn cache_max_entries(&self) -> usize {
        self.cache_max_entries
    }

    #[must_use]
    pub fn cache_evict_chunk(&self) -> usize {
        self.cache_evict_chunk
    }

    #[must_use]
    pub fn jitter(&self) -> Jitter {
        Jitter::from_millis(self.jitter_min_ms, self.jitter_max_ms)
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn mixer_config(&self) -> MixerConfig {
        MixerConfig {
            batch_size: self.batch_size,
            jitter: self.jitter(),
        }
    }
}
