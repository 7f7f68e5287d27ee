use super::{DeviceProfile, SessionStore};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemorySessionStore {
    devices: Mutex<HashMap<u64, DeviceProfile>>,
    tokens: Mutex<HashMap<u64, Vec<u8>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_device(&self, account_id: u64) -> Result<Option<DeviceProfile>, anyhow::Error> {
        Ok(self.devices.lock().await.get(&account_id).cloned())
    }

    async fn save_device(
        &self,
        account_id: u64,
        device: &DeviceProfile,
    ) -> Result<(), anyhow::Error> {
        self.devices.lock().await.insert(account_id, device.clone());
        Ok(())
    }

    async fn load_session_token(
        &self,
        account_id: u64,
    ) -> Result<Option<Vec<u8>>, anyhow::Error> {
        Ok(self.tokens.lock().await.get(&account_id).cloned())
    }

    async fn save_session_token(
        &self,
        account_id: u64,
        token: &[u8],
    ) -> Result<(), anyhow::Error> {
        self.tokens.lock().await.insert(account_id, token.to_vec());
        Ok(())
    }
}
