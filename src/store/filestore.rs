use super::{DeviceProfile, SessionStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Filesystem store: `<base>/<account_id>/device.json` and
/// `<base>/<account_id>/session.token`.
pub struct FsSessionStore {
    base_dir: PathBuf,
}

impl FsSessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn account_dir(&self, account_id: u64) -> PathBuf {
        self.base_dir.join(account_id.to_string())
    }

    async fn ensure_dir(&self, account_id: u64) -> Result<PathBuf, anyhow::Error> {
        let dir = self.account_dir(account_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, anyhow::Error> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn load_device(&self, account_id: u64) -> Result<Option<DeviceProfile>, anyhow::Error> {
        let path = self.account_dir(account_id).join("device.json");
        match Self::read_optional(&path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save_device(
        &self,
        account_id: u64,
        device: &DeviceProfile,
    ) -> Result<(), anyhow::Error> {
        let dir = self.ensure_dir(account_id).await?;
        let bytes = serde_json::to_vec_pretty(device)?;
        fs::write(dir.join("device.json"), bytes).await?;
        Ok(())
    }

    async fn load_session_token(
        &self,
        account_id: u64,
    ) -> Result<Option<Vec<u8>>, anyhow::Error> {
        let path = self.account_dir(account_id).join("session.token");
        Self::read_optional(&path).await
    }

    async fn save_session_token(
        &self,
        account_id: u64,
        token: &[u8],
    ) -> Result<(), anyhow::Error> {
        let dir = self.ensure_dir(account_id).await?;
        fs::write(dir.join("session.token"), token).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn device_profile_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());

        assert!(store.load_device(42).await.unwrap().is_none());

        let device = DeviceProfile::generate();
        store.save_device(42, &device).await.unwrap();
        assert_eq!(store.load_device(42).await.unwrap(), Some(device));
    }

    #[tokio::test]
    async fn session_token_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());

        assert!(store.load_session_token(42).await.unwrap().is_none());

        store.save_session_token(42, b"opaque-token").await.unwrap();
        assert_eq!(
            store.load_session_token(42).await.unwrap(),
            Some(b"opaque-token".to_vec())
        );
    }

    #[tokio::test]
    async fn accounts_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());

        store.save_session_token(1, b"one").await.unwrap();
        store.save_session_token(2, b"two").await.unwrap();

        assert_eq!(
            store.load_session_token(1).await.unwrap(),
            Some(b"one".to_vec())
        );
        assert_eq!(
            store.load_session_token(2).await.unwrap(),
            Some(b"two".to_vec())
        );
    }
}
