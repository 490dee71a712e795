use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{CodepadError, Result};
use crate::files::autosave::{AutosaveCoordinator, EventSender, SyncEvent, DEFAULT_AUTOSAVE_DELAY};
use crate::files::{DraftCache, FilePatch, FileRecord, FileRegistry, MemorySelection, SelectionStore};
use crate::remote::{FileStore, MemoryFileStore};
use crate::templates;
use crate::util::{split_file_name, unix_millis};

/// User id of the throwaway guest session.
pub const GUEST_USER: &str = "guest";

#[derive(Clone, Debug)]
pub struct WorkspaceSettings {
    pub autosave_delay: Duration,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
        }
    }
}

/// Which file, if any, is bound to the editor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "fileId")]
pub enum SelectionState {
    NoFileOpen,
    FileOpen(String),
}

/// What the editor shows after a file is opened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    pub id: String,
    pub name: String,
    pub language: String,
    pub code: String,
}

impl EditorView {
    fn of(record: &FileRecord, code: String) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            language: record.language.clone(),
            code,
        }
    }
}

/// Outcome of restoring a session at startup.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    /// The previously opened file, if it still exists.
    pub opened: Option<EditorView>,
    pub file_count: usize,
    /// No files at all: the frontend should prompt to create one.
    pub needs_file: bool,
}

struct Session {
    selection: SelectionState,
    drafts: DraftCache,
    // Files created this session; only these may fall back to the template.
    created: HashSet<String>,
}

/// One user's file session: registry, drafts, autosave and the active file.
///
/// Constructed explicitly and handed to whatever frontend layer drives it.
/// Operations that wait on the remote store are serialized, so a switch,
/// create or delete always sees the state the previous one left behind.
pub struct Workspace {
    user_id: String,
    store: Arc<dyn FileStore>,
    selection_store: Arc<dyn SelectionStore>,
    registry: Arc<Mutex<FileRegistry>>,
    session: Mutex<Session>,
    autosave: AutosaveCoordinator,
    events: Option<EventSender>,
    op_lock: tokio::sync::Mutex<()>,
}

impl Workspace {
    pub fn new(
        user_id: impl Into<String>,
        store: Arc<dyn FileStore>,
        selection_store: Arc<dyn SelectionStore>,
        settings: WorkspaceSettings,
        events: Option<EventSender>,
    ) -> Self {
        let user_id = user_id.into();
        let registry = Arc::new(Mutex::new(FileRegistry::new()));
        let autosave = AutosaveCoordinator::new(
            store.clone(),
            user_id.clone(),
            registry.clone(),
            settings.autosave_delay,
            events.clone(),
        );
        Self {
            user_id,
            store,
            selection_store,
            registry,
            session: Mutex::new(Session {
                selection: SelectionState::NoFileOpen,
                drafts: DraftCache::new(),
                created: HashSet::new(),
            }),
            autosave,
            events,
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// A session whose files live only in process memory.
    pub fn guest(settings: WorkspaceSettings, events: Option<EventSender>) -> Self {
        Self::new(
            GUEST_USER,
            Arc::new(MemoryFileStore::new()),
            Arc::new(MemorySelection::default()),
            settings,
            events,
        )
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn autosave(&self) -> &AutosaveCoordinator {
        &self.autosave
    }

    // ── Session lifecycle ───────────────────────────────────────────────────

    /// Load the user's files and reopen the last opened one if it still
    /// exists. A failed load leaves an empty registry and a warning.
    pub async fn start(&self) -> Result<SessionStart> {
        let _op = self.op_lock.lock().await;

        let mut loaded = FileRegistry::new();
        match loaded.load(self.store.as_ref(), &self.user_id).await {
            Ok(records) => {
                tracing::info!(user = %self.user_id, files = records.len(), "loaded files");
                *self.registry.lock() = loaded;
            }
            Err(err) => {
                tracing::warn!(user = %self.user_id, error = %err, "could not load files");
                self.warn(format!("Could not load your files: {err}"));
            }
        }

        let last = self.selection_store.load();
        let known = last
            .as_deref()
            .is_some_and(|id| self.registry.lock().contains(id));
        let opened = match last {
            Some(last) if known => Some(self.select_locked(&last).await?),
            Some(last) => {
                tracing::debug!(file_id = %last, "last opened file no longer exists");
                None
            }
            None => None,
        };

        let (file_count, needs_file) = {
            let registry = self.registry.lock();
            (registry.len(), registry.is_empty())
        };
        Ok(SessionStart {
            opened,
            file_count,
            needs_file,
        })
    }

    /// Write out every pending edit. Call before logging out or quitting.
    pub async fn close(&self) -> Result<()> {
        let _op = self.op_lock.lock().await;
        let saved = self.autosave.flush_all().await?;
        tracing::info!(user = %self.user_id, saved, "session closed");
        Ok(())
    }

    // ── Editing ─────────────────────────────────────────────────────────────

    /// Record an edit of the active file and restart its autosave timer.
    pub fn edit(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let mut session = self.session.lock();
        let id = match &session.selection {
            SelectionState::FileOpen(id) => id.clone(),
            SelectionState::NoFileOpen => return Err(CodepadError::NoActiveFile),
        };
        let record = self
            .registry
            .lock()
            .find(&id)
            .cloned()
            .ok_or(CodepadError::NoActiveFile)?;

        session.drafts.write(&id, text.clone());
        // Scheduled under the session lock so a concurrent delete either sees
        // this payload or makes the edit fail.
        self.autosave.schedule(FileRecord { code: text, ..record });
        Ok(())
    }

    // ── Selection ───────────────────────────────────────────────────────────

    /// Open `target`, first writing out the outgoing file's latest draft.
    ///
    /// Remote failures never fail a switch: the outgoing draft stays pending
    /// and the incoming content falls back to what is known locally.
    pub async fn select_file(&self, target: &str) -> Result<EditorView> {
        let _op = self.op_lock.lock().await;
        self.select_locked(target).await
    }

    async fn select_locked(&self, target: &str) -> Result<EditorView> {
        let record = self
            .registry
            .lock()
            .find(target)
            .cloned()
            .ok_or_else(|| CodepadError::NotFound(target.to_string()))?;

        let outgoing = match self.state() {
            SelectionState::FileOpen(prev) if prev != target => Some(prev),
            _ => None,
        };
        if let Some(prev) = outgoing {
            self.hand_off(&prev).await;
        }

        let (record, code) = self.resolve_content(record).await;
        {
            let mut session = self.session.lock();
            session.drafts.write(target, code.clone());
            session.selection = SelectionState::FileOpen(target.to_string());
        }
        if let Err(err) = self.selection_store.save(target) {
            tracing::warn!(file_id = %target, error = %err, "could not remember last opened file");
        }

        Ok(EditorView::of(&record, code))
    }

    /// Flush the outgoing file so no edit is lost on a switch.
    async fn hand_off(&self, prev: &str) {
        let unsaved = {
            let session = self.session.lock();
            let registry = self.registry.lock();
            match (registry.find(prev), session.drafts.read(prev)) {
                (Some(record), Some(draft)) if draft != record.code => Some(FileRecord {
                    code: draft.to_string(),
                    ..record.clone()
                }),
                _ => None,
            }
        };
        if let Some(record) = unsaved {
            if !self.autosave.is_pending(prev) {
                self.autosave.stage(record);
            }
        }

        if let Err(err) = self.autosave.flush_now(prev).await {
            tracing::warn!(file_id = %prev, error = %err, "could not save file before switching");
        }
    }

    /// Content for an incoming file: draft, then the remote copy, then the
    /// language template for a file created this session with no content.
    async fn resolve_content(&self, record: FileRecord) -> (FileRecord, String) {
        let draft = self.session.lock().drafts.read(&record.id).map(str::to_string);
        if let Some(draft) = draft {
            return (record, draft);
        }

        let record = match self.store.get_file(&self.user_id, &record.id).await {
            Ok(Some(remote)) => {
                if remote != record {
                    let patch = FilePatch {
                        name: Some(remote.name.clone()),
                        code: Some(remote.code.clone()),
                        language: Some(remote.language.clone()),
                    };
                    let _ = self.registry.lock().edit(&record.id, &patch);
                }
                FileRecord {
                    id: record.id,
                    ..remote
                }
            }
            Ok(None) => record,
            Err(err) => {
                tracing::warn!(file_id = %record.id, error = %err, "using cached copy");
                self.warn(format!(
                    "Could not fetch the latest copy of {}; showing the cached version",
                    record.name
                ));
                record
            }
        };

        let fresh = self.session.lock().created.contains(&record.id);
        if record.code.is_empty() && fresh {
            let template = templates::default_template(&record.language).to_string();
            return (record, template);
        }
        let code = record.code.clone();
        (record, code)
    }

    // ── File management ─────────────────────────────────────────────────────

    /// Create a file with the language's template and open it. The remote
    /// write happens first; nothing changes locally if it fails.
    pub async fn create_file(&self, name: &str, language: &str) -> Result<EditorView> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CodepadError::Custom("File name is required".into()));
        }

        let _op = self.op_lock.lock().await;
        let record = FileRecord::new(
            self.next_file_id(),
            with_extension(name, language),
            templates::default_template(language),
            language,
        );
        self.commit_new(record).await
    }

    /// Store an uploaded file and open it. The language comes from the
    /// extension.
    pub async fn upload_file(&self, file_name: &str, contents: &str) -> Result<EditorView> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(CodepadError::Custom("File name is required".into()));
        }

        let language = match split_file_name(file_name).1 {
            Some(ext) => templates::find_by_extension(ext)
                .map(|lang| lang.language.to_string())
                .unwrap_or_else(|| ext.to_lowercase()),
            None => "plaintext".to_string(),
        };

        let _op = self.op_lock.lock().await;
        let record = FileRecord::new(self.next_file_id(), file_name, contents, language);
        self.commit_new(record).await
    }

    async fn commit_new(&self, record: FileRecord) -> Result<EditorView> {
        self.store
            .save_file(&self.user_id, &record.id, &record)
            .await?;

        let id = record.id.clone();
        tracing::info!(file_id = %id, name = %record.name, "created file");
        self.registry.lock().add(record)?;
        self.session.lock().created.insert(id.clone());
        self.select_locked(&id).await
    }

    /// Rename a file remotely, then locally.
    pub async fn rename_file(&self, id: &str, new_name: &str) -> Result<FileRecord> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(CodepadError::Custom("File name is required".into()));
        }

        let _op = self.op_lock.lock().await;
        if !self.registry.lock().contains(id) {
            return Err(CodepadError::NotFound(id.to_string()));
        }

        // No autosave write may land between the remote and local rename;
        // writes after it pick the new name up from the registry.
        let patch = FilePatch::rename(new_name);
        let renamed = {
            let _file = self.autosave.lock_file(id).await;
            match self.store.update_file(&self.user_id, id, &patch).await {
                Ok(()) => self.registry.lock().edit(id, &patch).cloned(),
                Err(err) => Err(err),
            }
        };
        self.autosave.release_gate(id);
        let renamed = renamed?;
        tracing::info!(file_id = %id, name = %renamed.name, "renamed file");
        Ok(renamed)
    }

    /// Delete a file remotely, then locally. Deleting the active file closes
    /// it; the caller decides what to open next.
    pub async fn delete_file(&self, id: &str) -> Result<()> {
        let _op = self.op_lock.lock().await;
        if !self.registry.lock().contains(id) {
            return Err(CodepadError::NotFound(id.to_string()));
        }

        // A pending autosave would recreate the file after the delete. The
        // file lock keeps timer writes out until the local removal is done.
        let file = self.autosave.lock_file(id).await;
        let parked = self.autosave.discard(id);
        if let Err(err) = self.store.delete_file(&self.user_id, id).await {
            drop(file);
            if let Some(record) = parked {
                self.autosave.restore(record);
            }
            self.autosave.release_gate(id);
            return Err(err);
        }

        let was_active = {
            let mut session = self.session.lock();
            self.registry.lock().remove(id);
            // Edits made while the remote delete was in flight.
            self.autosave.discard(id);
            session.drafts.clear(id);
            session.created.remove(id);
            let active = session.selection == SelectionState::FileOpen(id.to_string());
            if active {
                session.selection = SelectionState::NoFileOpen;
            }
            active
        };

        drop(file);
        self.autosave.release_gate(id);

        if was_active || self.selection_store.load().as_deref() == Some(id) {
            if let Err(err) = self.selection_store.clear() {
                tracing::warn!(error = %err, "could not clear last opened file");
            }
        }
        tracing::info!(file_id = %id, was_active, "deleted file");
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> SelectionState {
        self.session.lock().selection.clone()
    }

    /// The active file with its current draft.
    pub fn active(&self) -> Option<EditorView> {
        let session = self.session.lock();
        let SelectionState::FileOpen(id) = &session.selection else {
            return None;
        };
        let registry = self.registry.lock();
        let record = registry.find(id)?;
        let code = session
            .drafts
            .read(id)
            .map_or_else(|| record.code.clone(), str::to_string);
        Some(EditorView::of(record, code))
    }

    pub fn draft(&self, id: &str) -> Option<String> {
        self.session.lock().drafts.read(id).map(str::to_string)
    }

    pub fn files(&self) -> Vec<FileRecord> {
        self.registry.lock().records().to_vec()
    }

    pub fn find(&self, id: &str) -> Option<FileRecord> {
        self.registry.lock().find(id).cloned()
    }

    pub fn search(&self, query: &str) -> Vec<FileRecord> {
        self.registry
            .lock()
            .search(query)
            .into_iter()
            .cloned()
            .collect()
    }

    // ── Helpers ─────────────────────────────────────────────────────────────

    /// `file{millis}`, bumped until it is unused.
    fn next_file_id(&self) -> String {
        let registry = self.registry.lock();
        let mut millis = unix_millis();
        loop {
            let id = format!("file{millis}");
            if !registry.contains(&id) {
                return id;
            }
            millis += 1;
        }
    }

    fn warn(&self, message: String) {
        if let Some(tx) = &self.events {
            let _ = tx.send(SyncEvent::Warning { message });
        }
    }
}

/// Append the language's extension unless the name already carries it.
fn with_extension(name: &str, language: &str) -> String {
    let ext = templates::extension_for(language);
    match split_file_name(name).1 {
        Some(existing) if existing.eq_ignore_ascii_case(ext) => name.to_string(),
        _ => format!("{name}.{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_extension() {
        assert_eq!(with_extension("test", "python"), "test.py");
        assert_eq!(with_extension("test.py", "python"), "test.py");
        assert_eq!(with_extension("notes", "cobol"), "notes.txt");
        assert_eq!(with_extension("v1.2", "rust"), "v1.2.rs");
    }

    #[tokio::test]
    async fn test_edit_without_open_file_is_rejected() {
        let ws = Workspace::guest(WorkspaceSettings::default(), None);
        assert!(matches!(ws.edit("x"), Err(CodepadError::NoActiveFile)));
    }

    #[tokio::test]
    async fn test_guest_session_creates_and_edits_in_memory() {
        let ws = Workspace::guest(WorkspaceSettings::default(), None);
        let start = ws.start().await.unwrap();
        assert!(start.needs_file);

        let view = ws.create_file("scratch", "javascript").await.unwrap();
        assert_eq!(view.name, "scratch.js");
        ws.edit("console.log(1)").unwrap();
        assert_eq!(ws.active().unwrap().code, "console.log(1)");
        ws.close().await.unwrap();
        assert_eq!(ws.find(&view.id).unwrap().code, "console.log(1)");
    }
}
