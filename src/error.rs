use serde::Serialize;

/// All errors surfaced by the Codepad core and its service clients.
#[derive(Debug, thiserror::Error)]
pub enum CodepadError {
    /// Network or service failure on a Remote File Store call.
    #[error("Remote file store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("A file with id {0} already exists")]
    DuplicateId(String),

    #[error("No file is open")]
    NoActiveFile,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

impl CodepadError {
    /// Wrap any displayable failure from a remote call.
    pub fn remote(err: impl std::fmt::Display) -> Self {
        CodepadError::RemoteUnavailable(err.to_string())
    }
}

// Tauri requires error types to implement Serialize for IPC transport.
impl Serialize for CodepadError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CodepadError>;
