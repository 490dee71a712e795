use super::AppState;
use crate::error::Result;
use crate::services::RunOutput;

#[tauri::command]
pub async fn execute_code(
    language: String,
    code: String,
    input: String,
    state: tauri::State<'_, AppState>,
) -> Result<RunOutput> {
    state.runner.run(&language, &code, &input).await
}

#[tauri::command]
pub async fn ask_assistant(prompt: String, state: tauri::State<'_, AppState>) -> Result<Option<String>> {
    Ok(state.assistant.send(&prompt).await)
}

#[tauri::command]
pub async fn assistant_transcript(state: tauri::State<'_, AppState>) -> Result<Vec<String>> {
    Ok(state.assistant.transcript())
}
