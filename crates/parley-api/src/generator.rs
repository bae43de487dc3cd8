//! Seam to the generative-text backend.

use std::time::Duration;

use anyhow::Context;
use futures_util::future::BoxFuture;
use serde_json::{Value, json};
use tracing::warn;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const FALLBACK_REPLY: &str = "Sorry, I couldn't understand the response.";

/// Produces the assistant reply for a user prompt.
pub trait ReplyGenerator: Send + Sync {
    fn generate_reply<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, anyhow::Result<String>>;
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!("{GEMINI_BASE_URL}/v1/models/{}:generateContent", self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response: Value = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?
            .error_for_status()
            .context("Gemini returned an error status")?
            .json()
            .await
            .context("Gemini response was not JSON")?;

        Ok(extract_text(&response).unwrap_or_else(|| {
            warn!("Gemini response had no candidate text");
            FALLBACK_REPLY.to_string()
        }))
    }
}

impl ReplyGenerator for GeminiClient {
    fn generate_reply<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(self.generate(prompt))
    }
}

fn extract_text(response: &Value) -> Option<String> {
    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Offline generator that answers with the prompt. Used when no API key is configured.
pub struct EchoGenerator;

impl ReplyGenerator for EchoGenerator {
    fn generate_reply<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move { Ok(format!("You said: {prompt}")) })
    }
}
