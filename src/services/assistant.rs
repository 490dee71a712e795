use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::{CodepadError, Result};

pub const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

pub const GREETING: &str = "Hello! How can I assist you?";
pub const FAILURE_REPLY: &str = "AI: Sorry, something went wrong.";

/// Chat with a Gemini model, keeping a plain-text transcript.
pub struct Assistant {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    transcript: Mutex<Vec<String>>,
}

impl Assistant {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            transcript: Mutex::new(vec![GREETING.to_string()]),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn transcript(&self) -> Vec<String> {
        self.transcript.lock().clone()
    }

    /// Send a prompt and return the reply line appended to the transcript.
    /// Blank prompts are ignored.
    pub async fn send(&self, prompt: &str) -> Option<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }
        self.transcript.lock().push(format!("You: {prompt}"));

        let reply = match self.generate(prompt).await {
            Ok(text) => format!("AI: {text}"),
            Err(err) => {
                tracing::warn!(error = %err, "assistant request failed");
                FAILURE_REPLY.to_string()
            }
        };
        self.transcript.lock().push(reply.clone());
        Some(reply)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CodepadError::Custom(format!(
                "assistant returned {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        extract_text(&body).ok_or_else(|| CodepadError::Custom("empty assistant reply".into()))
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: &Value) -> Option<String> {
    let parts = body["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    (!text.is_empty()).then_some(text)
}
