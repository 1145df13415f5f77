//! Salted digest computation

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

use super::cache::HashCache;

/// Hex length of a SHA-256 digest
pub const TRACKING_HASH_LEN: usize = 64;

/// Lowercase hex SHA-256 of `salt ∥ identifier ∥ salt`
///
/// Cheap to clone: the digest string is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackingHash(Arc<str>);

impl TrackingHash {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex chars, the only form that goes into logs
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for TrackingHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the salted digest without touching any cache
#[must_use]
pub fn salted_digest(salt: &str, identifier: &str) -> TrackingHash {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(identifier.as_bytes());
    hasher.update(salt.as_bytes());
    TrackingHash(Arc::from(hex::encode(hasher.finalize())))
}

/// Salted hasher fronted by a bounded cache
///
/// Cache reads and writes happen under the cache's lock; the digest itself is
/// computed with the lock released.
#[derive(Debug)]
pub struct TrackingHasher {
    salt: String,
    cache: HashCache,
}

impl TrackingHasher {
    #[must_use]
    pub fn new(salt: impl Into<String>, cache: HashCache) -> Self {
        Self {
            salt: salt.into(),
            cache,
        }
    }

    /// Tracking hash for `identifier`, served from cache when possible
    pub fn hash(&self, identifier: &str) -> TrackingHash {
        if let Some(hash) = self.cache.get(identifier) {
            return hash;
        }

        let hash = salted_digest(&self.salt, identifier);
        self.cache.insert(identifier, hash.clone());
        hash
    }

    #[must_use]
    pub fn cache(&self) -> &HashCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_matches_known_vector() {
        // sha256("abc")
        let hash = salted_digest("", "abc");
        assert_eq!(
            hash.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_salt_wraps_identifier() {
        assert_eq!(salted_digest("s", "abc"), salted_digest("", "sabcs"));
        assert_ne!(salted_digest("s", "abc"), salted_digest("", "abc"));
    }

    #[test]
    fn test_short_form() {
        let hash = salted_digest("", "abc");
        assert_eq!(hash.short(), "ba7816bf");
        assert_eq!(hash.as_str().len(), TRACKING_HASH_LEN);
    }
}
