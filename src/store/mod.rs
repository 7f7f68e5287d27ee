//! Persisted session state.
//!
//! The engine only needs two artifacts per account across restarts: the
//! device fingerprint presented during login negotiation and the opaque
//! session token the server hands back. Everything else lives in memory.

mod filestore;
mod memory;

pub use filestore::FsSessionStore;
pub use memory::MemorySessionStore;

use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Device identity presented during login. Generated once per account
/// and reused so the server recognizes the installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// 16 random bytes, hex-encoded.
    pub fingerprint: String,
    pub model: String,
    pub created_at: i64,
}

impl DeviceProfile {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self {
            fingerprint: hex::encode(bytes),
            model: "tern-rs".to_string(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Narrow persistence contract the login flow talks to.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_device(&self, account_id: u64) -> Result<Option<DeviceProfile>, anyhow::Error>;
    async fn save_device(
        &self,
        account_id: u64,
        device: &DeviceProfile,
    ) -> Result<(), anyhow::Error>;
    async fn load_session_token(&self, account_id: u64)
    -> Result<Option<Vec<u8>>, anyhow::Error>;
    async fn save_session_token(
        &self,
        account_id: u64,
        token: &[u8],
    ) -> Result<(), anyhow::Error>;
}
