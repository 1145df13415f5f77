//! Builder-style setters and validation for `ProxyConfig`

use anyhow::{Result, bail};
use tokio::sync::Semaphore;

use super::types::ProxyConfig;

impl ProxyConfig {
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    #[must_use]
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_api_url = url.into();
        self
    }

    #[must_use]
    pub fn with_backend_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.backend_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    #[must_use]
    pub fn with_hash_salt(mut self, salt: impl Into<String>) -> Self {
        self.hash_salt = salt.into();
        self
    }

    #[must_use]
    pub fn with_cache_bounds(mut self, max_entries: usize, evict_chunk: usize) -> Self {
        self.cache_max_entries = max_entries;
        self.cache_evict_chunk = evict_chunk;
        self
    }

    #[must_use]
    pub fn with_jitter_ms(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.jitter_min_ms = min_ms;
        self.jitter_max_ms = max_ms;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_timeout_grace_ms(mut self, grace_ms: u64) -> Self {
        self.timeout_grace_ms = grace_ms;
        self
    }

    /// Reject configurations the pipeline cannot run with
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.jitter_min_ms > self.jitter_max_ms {
            bail!(
                "jitter_min_ms ({}) exceeds jitter_max_ms ({})",
                self.jitter_min_ms,
                self.jitter_max_ms
            );
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.cache_max_entries == 0 {
            bail!("cache_max_entries must be at least 1");
        }
        if self.cache_evict_chunk == 0 || self.cache_evict_chunk > self.cache_max_entries {
            bail!(
                "cache_evict_chunk ({}) must be between 1 and cache_max_entries ({})",
                self.cache_evict_chunk,
                self.cache_max_entries
            );
        }
        if self.max_connections == 0 {
            bail!("max_connections must be at least 1");
        }
        if self.max_connections > Semaphore::MAX_PERMITS {
            bail!(
                "max_connections ({}) exceeds the limit of {}",
                self.max_connections,
                Semaphore::MAX_PERMITS
            );
        }
        if self.backend_timeout_ms == 0 {
            bail!("backend_timeout_ms must be greater than 0");
        }
        match url::Url::parse(&self.backend_api_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => bail!(
                "backend_api_url must be http or https, got scheme '{}'",
                url.scheme()
            ),
            Err(e) => bail!("Invalid backend_api_url '{}': {e}", self.backend_api_url),
        }
        if self.socket_addr().is_none() {
            bail!(
                "Invalid bind address '{}:{}'",
                self.bind_address,
                self.port
            );
        }
        Ok(())
    }
}
