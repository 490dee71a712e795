use super::AppState;
use crate::error::Result;
use crate::files::autosave::Flushed;
use crate::files::{EditorView, FileRecord, SelectionState};

#[tauri::command]
pub async fn list_files(state: tauri::State<'_, AppState>) -> Result<Vec<FileRecord>> {
    Ok(state.workspace().await?.files())
}

#[tauri::command]
pub async fn search_files(query: String, state: tauri::State<'_, AppState>) -> Result<Vec<FileRecord>> {
    Ok(state.workspace().await?.search(&query))
}

#[tauri::command]
pub async fn get_selection(state: tauri::State<'_, AppState>) -> Result<SelectionState> {
    Ok(state.workspace().await?.state())
}

#[tauri::command]
pub async fn get_active_file(state: tauri::State<'_, AppState>) -> Result<Option<EditorView>> {
    Ok(state.workspace().await?.active())
}

#[tauri::command]
pub async fn select_file(file_id: String, state: tauri::State<'_, AppState>) -> Result<EditorView> {
    state.workspace().await?.select_file(&file_id).await
}

#[tauri::command]
pub async fn create_file(
    name: String,
    language: String,
    state: tauri::State<'_, AppState>,
) -> Result<EditorView> {
    state.workspace().await?.create_file(&name, &language).await
}

/// Store a file picked through the dialog plugin. The frontend reads it and
/// passes the contents along.
#[tauri::command]
pub async fn upload_file(
    file_name: String,
    contents: String,
    state: tauri::State<'_, AppState>,
) -> Result<EditorView> {
    state.workspace().await?.upload_file(&file_name, &contents).await
}

#[tauri::command]
pub async fn rename_file(
    file_id: String,
    new_name: String,
    state: tauri::State<'_, AppState>,
) -> Result<FileRecord> {
    state.workspace().await?.rename_file(&file_id, &new_name).await
}

#[tauri::command]
pub async fn delete_file(file_id: String, state: tauri::State<'_, AppState>) -> Result<()> {
    state.workspace().await?.delete_file(&file_id).await
}

/// Called on every editor change.
#[tauri::command]
pub async fn edit_code(code: String, state: tauri::State<'_, AppState>) -> Result<()> {
    state.workspace().await?.edit(code)
}

/// Write a file's pending edit now instead of waiting for the timer.
/// Returns whether anything was written.
#[tauri::command]
pub async fn save_now(file_id: String, state: tauri::State<'_, AppState>) -> Result<bool> {
    let flushed = state.workspace().await?.autosave().flush_now(&file_id).await?;
    Ok(flushed == Flushed::Saved)
}
