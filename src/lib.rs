//! Codepad: file sync and autosave for a browser-style code editor, plus
//! clients for the services around it.
//!
//! [`files::Workspace`] is the entry point. The `desktop` feature adds a
//! Tauri shell exposing it to the web frontend.

#[cfg(feature = "desktop")]
mod commands;
pub mod config;
pub mod error;
pub mod files;
pub mod logs;
pub mod remote;
pub mod services;
pub mod templates;
pub mod util;

#[cfg(feature = "desktop")]
pub fn run() {
    use std::sync::Arc;
    use tauri::Manager;

    if let Some(dir) = config::data_dir() {
        logs::init_logging(&dir.join("logs"));
    }
    let config = match config::ConfigStore::default_location() {
        Ok(store) => store,
        Err(err) => {
            tracing::warn!(error = %err, "using config in the working directory");
            config::ConfigStore::at("codepad-config.json")
        }
    };

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_fs::init())
        .manage(commands::AppState::new(Arc::new(config)))
        .invoke_handler(tauri::generate_handler![
            commands::session::sign_up,
            commands::session::log_in,
            commands::session::log_in_with_provider,
            commands::session::start_guest,
            commands::session::log_out,
            commands::session::current_user,
            commands::files::list_files,
            commands::files::search_files,
            commands::files::get_selection,
            commands::files::get_active_file,
            commands::files::select_file,
            commands::files::create_file,
            commands::files::upload_file,
            commands::files::rename_file,
            commands::files::delete_file,
            commands::files::edit_code,
            commands::files::save_now,
            commands::run::execute_code,
            commands::run::ask_assistant,
            commands::run::assistant_transcript,
            commands::settings::load_config,
            commands::settings::save_settings,
            commands::settings::list_languages,
        ])
        .on_window_event(|window, event| {
            if let tauri::WindowEvent::Destroyed = event {
                // Write out pending edits before the process goes away
                if let Some(state) = window.try_state::<commands::AppState>() {
                    state.inner().shutdown_sync();
                }
            }
        })
        .run(tauri::generate_context!())
        .expect("failed to run Codepad");
}
