//! Remote File Store: per-user document collection keyed by
//! `users/{userId}/files/{fileId}`.

pub mod firestore;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::files::{FilePatch, FileRecord};

pub use firestore::FirestoreFileStore;
pub use memory::MemoryFileStore;

/// Durable sink for file records. Every failure of the backing service is
/// reported as [`CodepadError::RemoteUnavailable`](crate::error::CodepadError).
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Create or overwrite the whole record.
    async fn save_file(&self, user_id: &str, file_id: &str, record: &FileRecord) -> Result<()>;

    async fn get_file(&self, user_id: &str, file_id: &str) -> Result<Option<FileRecord>>;

    async fn get_files(&self, user_id: &str) -> Result<Vec<FileRecord>>;

    /// Merge `patch` into an existing record. Fails with `NotFound` if the
    /// record does not exist.
    async fn update_file(&self, user_id: &str, file_id: &str, patch: &FilePatch) -> Result<()>;

    async fn delete_file(&self, user_id: &str, file_id: &str) -> Result<()>;

    /// Initialize the user's root document after sign-up.
    async fn init_user(&self, _user_id: &str) -> Result<()> {
        Ok(())
    }
}
