use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, warn};

use super::entities::TallyStateEntity;

const STATE_FILE_NAME: &str = "state.json";

/// Interface for abstracting durable storage of the counter state.
pub trait StateStore: Send + 'static {
    /// Reads the last saved state. A missing document is not an error, counting simply starts
    /// from the zero value.
    fn load(&self) -> impl Future<Output = Result<TallyStateEntity>> + Send;

    /// Replaces the saved state. The bytes have reached the file by the time this resolves, so a
    /// crash right after a completed save loses nothing.
    fn save(&self, state: &TallyStateEntity) -> impl Future<Output = Result<()>> + Send;
}

/// The main realization of [StateStore]. The cli reads the same document the daemon writes, so
/// access goes through shared/exclusive file locks.
pub struct StateStoreImpl {
    state_path: PathBuf,
}

impl StateStoreImpl {
    pub fn new(state_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&state_dir)?;

        Ok(Self {
            state_path: state_dir.join(STATE_FILE_NAME),
        })
    }

    async fn read_document(path: &Path) -> Result<String, std::io::Error> {
        debug!("Extracting {path:?}");
        let mut file = File::open(path).await?;
        file.lock_shared()?;
        let mut content = String::new();
        let result = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        result?;
        Ok(content)
    }

    async fn write_document(file: &mut File, state: &TallyStateEntity) -> Result<()> {
        let mut buffer = serde_json::to_vec(state)?;
        buffer.push(b'\n');

        file.set_len(0).await?;
        file.seek(std::io::SeekFrom::Start(0)).await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

impl StateStore for StateStoreImpl {
    async fn load(&self) -> Result<TallyStateEntity> {
        let content = match Self::read_document(&self.state_path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(TallyStateEntity::default()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<TallyStateEntity>(&content) {
            Ok(v) => Ok(v),
            Err(e) => {
                // ignore illegal documents. Might happen after shutdowns
                warn!(
                    "In path {:?} found illegal json document: {e}",
                    self.state_path
                );
                Ok(TallyStateEntity::default())
            }
        }
    }

    async fn save(&self, state: &TallyStateEntity) -> Result<()> {
        let mut file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(&self.state_path)
            .await?;

        // Semi-safe acquire-release for a file. Truncation happens after the lock is held so a
        // concurrent reader never observes an empty document.
        file.lock_exclusive()?;
        let result = Self::write_document(&mut file, state).await;
        file.unlock_async().await?;
        result
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    use super::{StateStore, StateStoreImpl, STATE_FILE_NAME};
    use crate::daemon::store::entities::TallyStateEntity;

    fn test_entity() -> TallyStateEntity {
        let mut entity = TallyStateEntity {
            today_count: 42,
            last_date: NaiveDate::from_ymd_opt(2025, 1, 3),
            ..Default::default()
        };
        entity
            .history
            .insert(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), 100);
        entity
            .history
            .insert(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), 300);
        entity
    }

    #[tokio::test]
    async fn test_missing_document_loads_default() -> Result<()> {
        let dir = tempdir()?;
        let store = StateStoreImpl::new(dir.path().to_owned())?;

        assert_eq!(store.load().await?, TallyStateEntity::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let store = StateStoreImpl::new(dir.path().to_owned())?;

        let entity = test_entity();
        store.save(&entity).await?;
        assert_eq!(store.load().await?, entity);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_replaces_previous_document() -> Result<()> {
        let dir = tempdir()?;
        let store = StateStoreImpl::new(dir.path().to_owned())?;

        let mut entity = test_entity();
        store.save(&entity).await?;

        entity.today_count = 1;
        entity.history.clear();
        store.save(&entity).await?;

        assert_eq!(store.load().await?, entity);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupted_document_loads_default() -> Result<()> {
        let dir = tempdir()?;
        let store = StateStoreImpl::new(dir.path().to_owned())?;

        let mut file = tokio::fs::File::create(dir.path().join(STATE_FILE_NAME)).await?;
        file.write_all(b"{\"today_count\": 12, \"hist").await?;
        file.flush().await?;
        drop(file);

        assert_eq!(store.load().await?, TallyStateEntity::default());
        Ok(())
    }
}
