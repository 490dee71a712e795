use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};

use crate::error::{CodepadError, Result};
use crate::files::{FilePatch, FileRecord};
use crate::remote::FileStore;

pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

const PAGE_SIZE: &str = "300";

/// Firestore REST client storing files under `users/{uid}/files/{fileId}`.
pub struct FirestoreFileStore {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    id_token: RwLock<Option<String>>,
}

impl FirestoreFileStore {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: FIRESTORE_BASE_URL.to_string(),
            project_id: project_id.into(),
            id_token: RwLock::new(None),
        }
    }

    /// Point the client at another endpoint, e.g. the Firestore emulator.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the Firebase ID token sent as bearer credentials.
    pub fn set_id_token(&self, token: Option<String>) {
        *self.id_token.write() = token;
    }

    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            self.base_url, self.project_id
        )
    }

    fn user_url(&self, user_id: &str) -> String {
        format!("{}/users/{user_id}", self.documents_root())
    }

    fn files_url(&self, user_id: &str) -> String {
        format!("{}/files", self.user_url(user_id))
    }

    fn file_url(&self, user_id: &str, file_id: &str) -> String {
        format!("{}/{file_id}", self.files_url(user_id))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.id_token.read().as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        self.authorize(request)
            .send()
            .await
            .map_err(CodepadError::remote)
    }
}

/// Encode a record as a Firestore `fields` map.
pub(crate) fn encode_record(record: &FileRecord) -> Value {
    json!({
        "id": { "stringValue": record.id },
        "name": { "stringValue": record.name },
        "code": { "stringValue": record.code },
        "language": { "stringValue": record.language },
    })
}

pub(crate) fn encode_patch(patch: &FilePatch) -> Value {
    let mut fields = Map::new();
    if let Some(name) = &patch.name {
        fields.insert("name".into(), json!({ "stringValue": name }));
    }
    if let Some(code) = &patch.code {
        fields.insert("code".into(), json!({ "stringValue": code }));
    }
    if let Some(language) = &patch.language {
        fields.insert("language".into(), json!({ "stringValue": language }));
    }
    Value::Object(fields)
}

/// Decode one Firestore document. The id is the last segment of the
/// document's resource name; missing string fields decode as empty.
pub(crate) fn decode_document(document: &Value) -> Option<FileRecord> {
    let name = document["name"].as_str()?;
    let id = name.rsplit('/').next()?.to_string();
    let field = |key: &str| {
        document["fields"][key]["stringValue"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    };
    Some(FileRecord {
        id,
        name: field("name"),
        code: field("code"),
        language: field("language"),
    })
}

/// Pull the human-readable message out of a Firestore error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

async fn failure(response: reqwest::Response) -> CodepadError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    CodepadError::RemoteUnavailable(format!("{status}: {}", error_message(&body)))
}

#[async_trait]
impl FileStore for FirestoreFileStore {
    async fn save_file(&self, user_id: &str, file_id: &str, record: &FileRecord) -> Result<()> {
        let mut record = record.clone();
        record.id = file_id.to_string();
        let request = self
            .client
            .patch(self.file_url(user_id, file_id))
            .json(&json!({ "fields": encode_record(&record) }));

        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(failure(response).await);
        }
        Ok(())
    }

    async fn get_file(&self, user_id: &str, file_id: &str) -> Result<Option<FileRecord>> {
        let request = self.client.get(self.file_url(user_id, file_id));
        let response = self.send(request).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(failure(response).await);
        }

        let body: Value = response.json().await.map_err(CodepadError::remote)?;
        Ok(decode_document(&body))
    }

    async fn get_files(&self, user_id: &str) -> Result<Vec<FileRecord>> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.files_url(user_id))
                .query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = self.send(request).await?;
            // A user without a files collection lists as 404 on some backends
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                break;
            }
            if !response.status().is_success() {
                return Err(failure(response).await);
            }

            let body: Value = response.json().await.map_err(CodepadError::remote)?;
            if let Some(documents) = body["documents"].as_array() {
                records.extend(documents.iter().filter_map(decode_document));
            }

            match body["nextPageToken"].as_str() {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(records)
    }

    async fn update_file(&self, user_id: &str, file_id: &str, patch: &FilePatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut query: Vec<(&str, &str)> = patch
            .field_paths()
            .into_iter()
            .map(|path| ("updateMask.fieldPaths", path))
            .collect();
        query.push(("currentDocument.exists", "true"));

        let request = self
            .client
            .patch(self.file_url(user_id, file_id))
            .query(&query)
            .json(&json!({ "fields": encode_patch(patch) }));

        let response = self.send(request).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CodepadError::NotFound(file_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(failure(response).await);
        }
        Ok(())
    }

    async fn delete_file(&self, user_id: &str, file_id: &str) -> Result<()> {
        let request = self.client.delete(self.file_url(user_id, file_id));
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(failure(response).await);
        }
        Ok(())
    }

    async fn init_user(&self, user_id: &str) -> Result<()> {
        let request = self
            .client
            .patch(self.user_url(user_id))
            .json(&json!({ "fields": { "files": { "arrayValue": {} } } }));
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(failure(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_document_takes_id_from_resource_name() {
        let doc = json!({
            "name": "projects/p/databases/(default)/documents/users/u1/files/file1700000000000",
            "fields": {
                "name": { "stringValue": "main.py" },
                "code": { "stringValue": "print('hi')" },
                "language": { "stringValue": "python" }
            }
        });
        let record = decode_document(&doc).unwrap();
        assert_eq!(record.id, "file1700000000000");
        assert_eq!(record.name, "main.py");
        assert_eq!(record.code, "print('hi')");
        assert_eq!(record.language, "python");
    }

    #[test]
    fn test_decode_document_tolerates_missing_fields() {
        let doc = json!({ "name": "projects/p/databases/(default)/documents/users/u1/files/f2" });
        let record = decode_document(&doc).unwrap();
        assert_eq!(record.id, "f2");
        assert!(record.code.is_empty());
        assert!(decode_document(&json!({})).is_none());
    }

    #[test]
    fn test_encode_patch_only_includes_set_fields() {
        let encoded = encode_patch(&FilePatch::rename("app.rs"));
        assert_eq!(encoded, json!({ "name": { "stringValue": "app.rs" } }));
    }

    #[test]
    fn test_encode_record_uses_string_values() {
        let record = FileRecord::new("f1", "a.js", "1;", "javascript");
        let encoded = encode_record(&record);
        assert_eq!(encoded["code"]["stringValue"], "1;");
        assert_eq!(encoded["id"]["stringValue"], "f1");
    }

    #[test]
    fn test_urls() {
        let store = FirestoreFileStore::new("demo").with_base_url("http://localhost:8080/v1/");
        assert_eq!(
            store.file_url("u1", "f1"),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents/users/u1/files/f1"
        );
    }

    #[test]
    fn test_error_message_prefers_firestore_message() {
        let body = r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(error_message(body), "Missing or insufficient permissions.");
        assert_eq!(error_message("  plain  "), "plain");
    }
}
