use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use sift_core::errors::InferenceError;
use sift_core::prompt::Prompt;
use sift_core::provider::{GenerateOptions, LlmProvider};
use sift_core::stream::EventStream;

use crate::ndjson::NdjsonStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for an Ollama-compatible server.
#[derive(Debug)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    /// Sent as a Bearer token when the server sits behind an auth proxy.
    pub api_key: Option<SecretString>,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl OllamaConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            connect_timeout: CONNECT_TIMEOUT,
            idle_timeout: STREAM_IDLE_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout = idle;
        self
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Streams completions from `{base_url}/api/generate`.
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| InferenceError::InvalidRequest(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => req.bearer_auth(key.expose_secret()),
            None => req,
        }
    }

    /// Request body for a streaming generate call.
    pub fn build_body(&self, prompt: &Prompt, options: &GenerateOptions) -> Value {
        let mut model_options = serde_json::Map::new();
        if let Some(t) = options.temperature {
            model_options.insert("temperature".into(), json!(t));
        }
        if let Some(n) = options.max_tokens {
            model_options.insert("num_predict".into(), json!(n));
        }
        if !options.stop_sequences.is_empty() {
            model_options.insert("stop".into(), json!(options.stop_sequences));
        }

        let mut body = json!({
            "model": self.config.model,
            "prompt": prompt.user,
            "stream": true,
            "options": Value::Object(model_options),
        });
        if let Some(system) = &prompt.system {
            body["system"] = json!(system);
        }
        body
    }

    /// Ask the server which models it has. Fails when it is unreachable.
    pub async fn health_check(&self) -> Result<Vec<String>, InferenceError> {
        let resp = self
            .authorize(self.client.get(self.endpoint("/api/tags")))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| InferenceError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(InferenceError::from_status(status, body));
        }

        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| InferenceError::NetworkError(format!("bad /api/tags body: {e}")))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether the configured model is installed on the server.
    pub async fn has_model(&self) -> Result<bool, InferenceError> {
        let models = self.health_check().await?;
        let wanted = self.config.model.as_str();
        Ok(models
            .iter()
            .any(|m| m == wanted || m.strip_suffix(":latest") == Some(wanted)))
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(model = %self.config.model, prompt_chars = prompt.char_len()))]
    async fn stream(
        &self,
        prompt: &Prompt,
        options: &GenerateOptions,
    ) -> Result<EventStream, InferenceError> {
        let body = self.build_body(prompt, options);
        let resp = self
            .authorize(self.client.post(self.endpoint("/api/generate")))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout(self.config.connect_timeout)
                } else {
                    InferenceError::NetworkError(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            debug!(status, "generate request rejected");
            return Err(InferenceError::from_status(status, body));
        }

        let stream = NdjsonStream::new(resp.bytes_stream(), self.config.idle_timeout);
        Ok(Box::pin(stream))
    }
}
