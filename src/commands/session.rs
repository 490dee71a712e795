use std::sync::Arc;

use serde::Serialize;
use tauri::ipc::Channel;
use tokio::sync::mpsc;

use super::AppState;
use crate::error::Result;
use crate::files::{SessionStart, SyncEvent, Workspace};
use crate::services::AuthUser;

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// `None` for a guest session.
    pub user: Option<AuthUser>,
    pub start: SessionStart,
}

/// Replace the current workspace with a fresh one for `user` and stream its
/// sync events to the frontend.
async fn open_workspace(
    state: &AppState,
    user: Option<AuthUser>,
    on_event: Channel<SyncEvent>,
) -> Result<SessionInfo> {
    close_workspace(state).await;

    let settings = state.config.load().workspace_settings();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let workspace = match &user {
        Some(user) => {
            state.store.set_id_token(Some(user.id_token.clone()));
            Workspace::new(
                user.uid.clone(),
                state.store.clone(),
                state.config.clone(),
                settings,
                Some(tx),
            )
        }
        None => Workspace::guest(settings, Some(tx)),
    };
    let workspace = Arc::new(workspace);

    let forwarder = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if on_event.send(event).is_err() {
                break;
            }
        }
    });
    *state.forwarder.lock().await = Some(forwarder);
    *state.workspace.lock().await = Some(workspace.clone());

    let start = workspace.start().await?;
    tracing::info!(user = %workspace.user_id(), files = start.file_count, "session started");
    Ok(SessionInfo { user, start })
}

async fn close_workspace(state: &AppState) {
    let previous = state.workspace.lock().await.take();
    if let Some(workspace) = previous {
        if let Err(err) = workspace.close().await {
            tracing::warn!(user = %workspace.user_id(), error = %err, "closing with unsaved edits");
        }
    }
    if let Some(handle) = state.forwarder.lock().await.take() {
        handle.abort();
    }
}

#[tauri::command]
pub async fn sign_up(
    email: String,
    password: String,
    on_event: Channel<SyncEvent>,
    state: tauri::State<'_, AppState>,
) -> Result<SessionInfo> {
    let user = state
        .auth
        .sign_up(&email, &password, state.store.as_ref())
        .await?;
    open_workspace(&state, Some(user), on_event).await
}

#[tauri::command]
pub async fn log_in(
    email: String,
    password: String,
    on_event: Channel<SyncEvent>,
    state: tauri::State<'_, AppState>,
) -> Result<SessionInfo> {
    let user = state.auth.log_in(&email, &password).await?;
    open_workspace(&state, Some(user), on_event).await
}

/// Sign in with a token obtained from an identity provider such as Google.
#[tauri::command]
pub async fn log_in_with_provider(
    provider_id: String,
    id_token: String,
    on_event: Channel<SyncEvent>,
    state: tauri::State<'_, AppState>,
) -> Result<SessionInfo> {
    let user = state.auth.log_in_with_provider(&provider_id, &id_token).await?;
    open_workspace(&state, Some(user), on_event).await
}

#[tauri::command]
pub async fn start_guest(
    on_event: Channel<SyncEvent>,
    state: tauri::State<'_, AppState>,
) -> Result<SessionInfo> {
    open_workspace(&state, None, on_event).await
}

#[tauri::command]
pub async fn log_out(state: tauri::State<'_, AppState>) -> Result<()> {
    close_workspace(&state).await;
    state.auth.log_out();
    state.store.set_id_token(None);
    Ok(())
}

#[tauri::command]
pub async fn current_user(state: tauri::State<'_, AppState>) -> Result<Option<AuthUser>> {
    Ok(state.auth.current_user())
}
