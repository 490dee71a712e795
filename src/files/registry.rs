use crate::error::{CodepadError, Result};
use crate::files::{FilePatch, FileRecord};
use crate::remote::FileStore;

/// In-memory collection of the current user's files.
///
/// Order is whatever the remote listing returned followed by files added this
/// session; callers must not attach meaning to it.
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: Vec<FileRecord>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the local contents with the user's full remote file set.
    pub async fn load(&mut self, store: &dyn FileStore, user_id: &str) -> Result<&[FileRecord]> {
        let fetched = store.get_files(user_id).await?;
        self.replace(fetched);
        Ok(&self.files)
    }

    /// Replace the local contents, dropping any repeated ids.
    pub fn replace(&mut self, records: Vec<FileRecord>) {
        self.files.clear();
        for record in records {
            if self.contains(&record.id) {
                tracing::warn!(file_id = %record.id, "duplicate file id in listing, keeping first");
                continue;
            }
            self.files.push(record);
        }
    }

    pub fn add(&mut self, record: FileRecord) -> Result<()> {
        if self.contains(&record.id) {
            return Err(CodepadError::DuplicateId(record.id));
        }
        self.files.push(record);
        Ok(())
    }

    /// Merge `patch` into the record with `id`, returning the updated record.
    pub fn edit(&mut self, id: &str, patch: &FilePatch) -> Result<&FileRecord> {
        let record = self
            .files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| CodepadError::NotFound(id.to_string()))?;
        record.apply(patch);
        Ok(record)
    }

    pub fn remove(&mut self, id: &str) -> Option<FileRecord> {
        let idx = self.files.iter().position(|f| f.id == id)?;
        Some(self.files.remove(idx))
    }

    pub fn find(&self, id: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Files whose name starts with `query`, ignoring case and surrounding
    /// whitespace. An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<&FileRecord> {
        let needle = query.trim().to_lowercase();
        self.files
            .iter()
            .filter(|f| f.name.to_lowercase().starts_with(&needle))
            .collect()
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
