//! Tracking hashes for in-flight requests
//!
//! Identifiers are turned into salted SHA-256 digests that serve as internal
//! lookup keys only. The digest never leaves the process; the backend always
//! sees the original identifier.
//!
//! - `hasher` - salted digest computation and the `TrackingHash` newtype
//! - `cache` - bounded identifier → digest cache with bulk eviction

pub mod cache;
pub mod hasher;

pub use cache::{CacheStats, HashCache};
pub use hasher::{TRACKING_HASH_LEN, TrackingHash, TrackingHasher, salted_digest};

/// Default upper bound on cached identifiers
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

/// Default number of earliest-inserted entries dropped when the bound is hit
pub const DEFAULT_CACHE_EVICT_CHUNK: usize = 1_000;
