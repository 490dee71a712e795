use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{CodepadError, Result};
use crate::files::{SelectionStore, WorkspaceSettings, DEFAULT_AUTOSAVE_DELAY};

pub const CONFIG_VERSION: u32 = 1;

/// Default endpoint of the code execution service.
pub const DEFAULT_EXECUTE_URL: &str = "https://winter-of-code-react-js.vercel.app/code/execute-code";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseSettings {
    pub api_key: String,
    pub project_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodepadConfig {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_file_id: Option<String>,
    #[serde(default)]
    pub firebase: FirebaseSettings,
    #[serde(default = "default_execute_url")]
    pub execute_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_api_key: Option<String>,
    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,
}

fn default_execute_url() -> String {
    DEFAULT_EXECUTE_URL.to_string()
}

fn default_autosave_delay_ms() -> u64 {
    DEFAULT_AUTOSAVE_DELAY.as_millis() as u64
}

impl Default for CodepadConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            last_file_id: None,
            firebase: FirebaseSettings::default(),
            execute_url: default_execute_url(),
            assistant_api_key: None,
            autosave_delay_ms: default_autosave_delay_ms(),
        }
    }
}

impl CodepadConfig {
    pub fn workspace_settings(&self) -> WorkspaceSettings {
        WorkspaceSettings {
            autosave_delay: Duration::from_millis(self.autosave_delay_ms),
        }
    }
}

/// `~/.codepad`, where the config and session logs live.
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".codepad"))
}

/// JSON config file on disk. Reads never fail: a missing or unreadable file
/// yields the defaults.
pub struct ConfigStore {
    path: PathBuf,
    // Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The store at `~/.codepad/config.json`.
    pub fn default_location() -> Result<Self> {
        let dir = data_dir()
            .ok_or_else(|| CodepadError::Custom("Cannot find home directory".into()))?;
        Ok(Self::at(dir.join("config.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> CodepadConfig {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return CodepadConfig::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "ignoring unreadable config");
                CodepadConfig::default()
            }
        }
    }

    pub fn save(&self, config: &CodepadConfig) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.write(config)
    }

    /// Load, apply `change`, write back and return the new config.
    pub fn update(&self, change: impl FnOnce(&mut CodepadConfig)) -> Result<CodepadConfig> {
        let _guard = self.write_lock.lock();
        let mut config = self.load();
        change(&mut config);
        self.write(&config)?;
        Ok(config)
    }

    fn write(&self, config: &CodepadConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SelectionStore for ConfigStore {
    fn load(&self) -> Option<String> {
        ConfigStore::load(self).last_file_id
    }

    fn save(&self, file_id: &str) -> Result<()> {
        self.update(|config| config.last_file_id = Some(file_id.to_string()))
            .map(|_| ())
    }

    fn clear(&self) -> Result<()> {
        self.update(|config| config.last_file_id = None).map(|_| ())
    }
}
