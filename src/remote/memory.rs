use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{CodepadError, Result};
use crate::files::{FilePatch, FileRecord};
use crate::remote::FileStore;

/// A remote call observed by [`MemoryFileStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Save { file_id: String, code: String },
    Update { file_id: String },
    Delete { file_id: String },
}

/// Process-local file store.
///
/// Backs guest sessions, where nothing outlives the process, and doubles as
/// the remote in tests: it can be switched offline or slowed down, and
/// records every write.
#[derive(Default)]
pub struct MemoryFileStore {
    files: Mutex<BTreeMap<(String, String), FileRecord>>,
    calls: Mutex<Vec<StoreCall>>,
    offline: AtomicBool,
    latency: Mutex<Duration>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without logging a call.
    pub fn insert(&self, user_id: &str, record: FileRecord) {
        self.files
            .lock()
            .insert((user_id.to_string(), record.id.clone()), record);
    }

    /// Make every subsequent call fail with `RemoteUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `latency` before it takes effect.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Current stored copy of a record.
    pub fn stored(&self, user_id: &str, file_id: &str) -> Option<FileRecord> {
        self.files
            .lock()
            .get(&(user_id.to_string(), file_id.to_string()))
            .cloned()
    }

    /// Writes received so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Code payloads of every save for one file, oldest first.
    pub fn saves_of(&self, file_id: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                StoreCall::Save { file_id: id, code } if id == file_id => Some(code.clone()),
                _ => None,
            })
            .collect()
    }

    async fn round_trip(&self) -> Result<()> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(CodepadError::RemoteUnavailable("store is offline".into()));
        }
        Ok(())
    }

    fn key(user_id: &str, file_id: &str) -> (String, String) {
        (user_id.to_string(), file_id.to_string())
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn save_file(&self, user_id: &str, file_id: &str, record: &FileRecord) -> Result<()> {
        self.round_trip().await?;
        let mut record = record.clone();
        record.id = file_id.to_string();
        self.calls.lock().push(StoreCall::Save {
            file_id: file_id.to_string(),
            code: record.code.clone(),
        });
        self.files.lock().insert(Self::key(user_id, file_id), record);
        Ok(())
    }

    async fn get_file(&self, user_id: &str, file_id: &str) -> Result<Option<FileRecord>> {
        self.round_trip().await?;
        Ok(self.stored(user_id, file_id))
    }

    async fn get_files(&self, user_id: &str) -> Result<Vec<FileRecord>> {
        self.round_trip().await?;
        Ok(self
            .files
            .lock()
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn update_file(&self, user_id: &str, file_id: &str, patch: &FilePatch) -> Result<()> {
        self.round_trip().await?;
        let mut files = self.files.lock();
        let record = files
            .get_mut(&Self::key(user_id, file_id))
            .ok_or_else(|| CodepadError::NotFound(file_id.to_string()))?;
        record.apply(patch);
        self.calls.lock().push(StoreCall::Update {
            file_id: file_id.to_string(),
        });
        Ok(())
    }

    async fn delete_file(&self, user_id: &str, file_id: &str) -> Result<()> {
        self.round_trip().await?;
        self.files.lock().remove(&Self::key(user_id, file_id));
        self.calls.lock().push(StoreCall::Delete {
            file_id: file_id.to_string(),
        });
        Ok(())
    }
}
