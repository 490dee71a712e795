use super::AppState;
use crate::config::CodepadConfig;
use crate::error::Result;
use crate::templates::{LanguageSpec, LANGUAGES};

#[tauri::command]
pub async fn load_config(state: tauri::State<'_, AppState>) -> Result<CodepadConfig> {
    Ok(state.config.load())
}

/// Takes effect for the next session.
#[tauri::command]
pub async fn save_settings(
    autosave_delay_ms: Option<u64>,
    execute_url: Option<String>,
    state: tauri::State<'_, AppState>,
) -> Result<CodepadConfig> {
    state.config.update(|config| {
        if let Some(delay) = autosave_delay_ms {
            config.autosave_delay_ms = delay;
        }
        if let Some(url) = execute_url {
            config.execute_url = url;
        }
    })
}

#[tauri::command]
pub async fn list_languages() -> Vec<LanguageSpec> {
    LANGUAGES.to_vec()
}
