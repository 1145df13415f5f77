pub mod backend;
pub mod config;
pub mod error;
pub mod mixing;
pub mod proxy;
pub mod response;
pub mod server;
pub mod stats;
pub mod tracking;

pub use backend::{Backend, HttpBackend};
pub use config::ProxyConfig;
pub use error::{VerifyError, VerifyResult};
pub use mixing::{MixerConfig, MixerHandle, MixerStatsSnapshot, PendingTable, VerifyOutcome};
pub use proxy::ProxyContext;
pub use response::VerifyResponse;
pub use stats::{ProxyStats, ProxyStatsSnapshot};
pub use tracking::{HashCache, TrackingHash, TrackingHasher, salted_digest};
