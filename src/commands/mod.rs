pub mod files;
pub mod run;
pub mod session;
pub mod settings;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::ConfigStore;
use crate::error::{CodepadError, Result};
use crate::files::Workspace;
use crate::remote::FirestoreFileStore;
use crate::services::{Assistant, CodeRunner, FirebaseAuth};

/// Managed state shared by every command.
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub auth: FirebaseAuth,
    pub store: Arc<FirestoreFileStore>,
    pub runner: CodeRunner,
    pub assistant: Assistant,
    pub workspace: Arc<Mutex<Option<Arc<Workspace>>>>,
    pub forwarder: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AppState {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        let settings = config.load();
        Self {
            auth: FirebaseAuth::new(settings.firebase.api_key.clone()),
            store: Arc::new(FirestoreFileStore::new(settings.firebase.project_id.clone())),
            runner: CodeRunner::new(settings.execute_url.clone()),
            assistant: Assistant::new(settings.assistant_api_key.clone().unwrap_or_default()),
            config,
            workspace: Arc::new(Mutex::new(None)),
            forwarder: Arc::new(Mutex::new(None)),
        }
    }

    /// The signed-in (or guest) workspace.
    pub async fn workspace(&self) -> Result<Arc<Workspace>> {
        self.workspace
            .lock()
            .await
            .clone()
            .ok_or_else(|| CodepadError::Auth("Not signed in".into()))
    }

    /// Flush pending edits and stop the event forwarder (for window close handler).
    pub fn shutdown_sync(&self) {
        let workspace = match self.workspace.try_lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        if let Some(workspace) = workspace {
            if let Err(err) = tauri::async_runtime::block_on(workspace.close()) {
                tracing::warn!(error = %err, "unsaved edits at shutdown");
            }
        }
        if let Ok(mut guard) = self.forwarder.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
