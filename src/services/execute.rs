use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CodepadError, Result};
use crate::templates;

/// Shown when the execution service fails without saying why.
pub const EXECUTION_FAILED: &str = "An error occurred while executing the code.";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    source_code: &'a str,
    code_input: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    pub output: String,
}

/// Client for the remote code execution service.
pub struct CodeRunner {
    client: reqwest::Client,
    endpoint: String,
}

impl CodeRunner {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Run `source` with `stdin`. Only an unsupported language is an error;
    /// service failures come back as output text for the terminal.
    pub async fn run(&self, language: &str, source: &str, stdin: &str) -> Result<RunOutput> {
        let version = templates::find(language)
            .and_then(|lang| lang.execution_version)
            .ok_or_else(|| CodepadError::UnsupportedLanguage(language.to_string()))?;

        let request = ExecuteRequest {
            language,
            version,
            source_code: source,
            code_input: stdin,
        };

        let response = match self.client.post(&self.endpoint).json(&request).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(language, error = %e, "execution request failed");
                return Ok(RunOutput {
                    output: EXECUTION_FAILED.into(),
                });
            }
        };

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            tracing::warn!(language, %status, "execution service returned an error");
        }
        Ok(RunOutput {
            output: output_from(&body, status.is_success()),
        })
    }
}

/// The `output` field of a response body. Failed runs without one get the
/// generic message; successful runs without one print nothing.
fn output_from(body: &Value, success: bool) -> String {
    match body["output"].as_str() {
        Some(output) => output.to_string(),
        None if success => String::new(),
        None => EXECUTION_FAILED.to_string(),
    }
}
