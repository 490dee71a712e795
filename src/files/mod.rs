//! Client-side file state: registry of known files, local drafts, debounced
//! autosave and the active-file workspace that ties them together.

pub mod autosave;
pub mod drafts;
pub mod registry;
pub mod workspace;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use autosave::{AutosaveCoordinator, EventSender, SyncEvent, DEFAULT_AUTOSAVE_DELAY};
pub use drafts::DraftCache;
pub use registry::FileRegistry;
pub use workspace::{EditorView, SelectionState, SessionStart, Workspace, WorkspaceSettings};

/// One user file as stored remotely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub code: String,
    pub language: String,
}

impl FileRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        code: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: code.into(),
            language: language.into(),
        }
    }

    /// Merge the fields present in `patch` into this record.
    pub fn apply(&mut self, patch: &FilePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(code) = &patch.code {
            self.code = code.clone();
        }
        if let Some(language) = &patch.language {
            self.language = language.clone();
        }
    }
}

/// Partial update of a [`FileRecord`]. The id is never part of a patch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl FilePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.code.is_none() && self.language.is_none()
    }

    /// Field names set in this patch, in Firestore field-mask order.
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        if self.name.is_some() {
            paths.push("name");
        }
        if self.code.is_some() {
            paths.push("code");
        }
        if self.language.is_some() {
            paths.push("language");
        }
        paths
    }
}

/// Durable "last opened file" pointer that survives restarts.
pub trait SelectionStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, file_id: &str) -> crate::error::Result<()>;
    fn clear(&self) -> crate::error::Result<()>;
}

/// Pointer kept in process memory. Used by guest sessions and tests.
#[derive(Default)]
pub struct MemorySelection {
    last: Mutex<Option<String>>,
}

impl MemorySelection {
    pub fn with(file_id: impl Into<String>) -> Self {
        Self {
            last: Mutex::new(Some(file_id.into())),
        }
    }
}

impl SelectionStore for MemorySelection {
    fn load(&self) -> Option<String> {
        self.last.lock().clone()
    }

    fn save(&self, file_id: &str) -> crate::error::Result<()> {
        *self.last.lock() = Some(file_id.to_string());
        Ok(())
    }

    fn clear(&self) -> crate::error::Result<()> {
        *self.last.lock() = None;
        Ok(())
    }
}
