use crate::config::BackendSettings;
use crate::error::AssistError;
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const TOP_P: f32 = 0.9;

#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
}

/// Raw HTTP access to the backend. Errors mean the request never produced a
/// response (refused, DNS, timeout).
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply>;
    async fn post_json(&self, url: &str, body: &serde_json::Value, timeout: Duration) -> Result<HttpReply>;
}

pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }
}

fn describe_reqwest_error(url: &str, timeout: Duration, e: reqwest::Error) -> anyhow::Error {
    if e.is_timeout() {
        anyhow!("request to {} timed out after {}s", url, timeout.as_secs())
    } else if e.is_connect() {
        anyhow!("unable to connect to {}", url)
    } else {
        anyhow!("request to {} failed: {}", url, e)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply> {
        let res = self.http.get(url).timeout(timeout).send().await
            .map_err(|e| describe_reqwest_error(url, timeout, e))?;
        let status = res.status().as_u16();
        let body = res.text().await.map_err(|e| describe_reqwest_error(url, timeout, e))?;
        Ok(HttpReply { status, body })
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value, timeout: Duration) -> Result<HttpReply> {
        let res = self.http.post(url).json(body).timeout(timeout).send().await
            .map_err(|e| describe_reqwest_error(url, timeout, e))?;
        let status = res.status().as_u16();
        let body = res.text().await.map_err(|e| describe_reqwest_error(url, timeout, e))?;
        Ok(HttpReply { status, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Connected,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub status: LinkState,
    pub models: Vec<String>,
    pub current_model: String,
    pub model_available: bool,
    pub message: Option<String>,
}

impl ConnectionStatus {
    fn error(current_model: &str, message: impl Into<String>) -> Self {
        Self {
            status: LinkState::Error,
            models: vec![],
            current_model: current_model.to_string(),
            model_available: false,
            message: Some(message.into()),
        }
    }

    pub fn is_connected(&self) -> bool { self.status == LinkState::Connected }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: String,
    pub modified: Option<String>,
}

#[derive(Deserialize)]
struct Tags {
    #[serde(default)]
    models: Vec<Tag>,
}

#[derive(Deserialize)]
struct Tag {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    modified_at: Option<String>,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
    top_p: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

/// Single point of contact with the LLM backend.
pub struct Gateway {
    transport: Arc<dyn Transport>,
    settings: BackendSettings,
}

impl Gateway {
    pub fn new(settings: BackendSettings) -> Result<Self> {
        Ok(Self::with_transport(settings, Arc::new(HttpTransport::new()?)))
    }

    pub fn with_transport(settings: BackendSettings, transport: Arc<dyn Transport>) -> Self {
        Self { transport, settings }
    }

    pub fn current_model(&self) -> &str { &self.settings.model }

    pub fn base_url(&self) -> &str { self.settings.base_url() }

    pub fn timeout(&self) -> Duration { self.settings.request_timeout() }

    async fn fetch_tags(&self, timeout: Duration) -> Result<Tags> {
        let url = format!("{}/api/tags", self.base_url());
        let reply = self.transport.get(&url, timeout).await?;
        if !reply.is_success() {
            return Err(anyhow!("unexpected status {} from {}", reply.status, url));
        }
        let tags: Tags = serde_json::from_str(&reply.body)
            .map_err(|e| anyhow!("failed to parse model list: {}", e))?;
        Ok(tags)
    }

    /// Health check. Never fails: problems are reported through `status`.
    pub async fn probe(&self) -> ConnectionStatus {
        match self.fetch_tags(PROBE_TIMEOUT).await {
            Ok(tags) => {
                let models: Vec<String> = tags.models.into_iter().map(|t| t.name).collect();
                let model_available = models.iter().any(|m| m == &self.settings.model);
                tracing::debug!(count = models.len(), model_available, "backend probe ok");
                ConnectionStatus {
                    status: LinkState::Connected,
                    models,
                    current_model: self.settings.model.clone(),
                    model_available,
                    message: None,
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "backend probe failed");
                ConnectionStatus::error(&self.settings.model, e.to_string())
            }
        }
    }

    /// Submit a prompt. Connectivity is re-checked on every call.
    pub async fn ask(&self, prompt: &str) -> Result<String, AssistError> {
        let status = self.probe().await;
        if !status.is_connected() {
            return Err(AssistError::Connectivity(status.message.unwrap_or_else(|| "unknown error".to_string())));
        }
        if !status.model_available {
            return Err(AssistError::ModelUnavailable { model: self.settings.model.clone() });
        }

        let body = GenerateRequest {
            model: &self.settings.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_tokens,
                top_p: TOP_P,
            },
        };
        let body = serde_json::to_value(&body).map_err(|e| AssistError::Generation(e.to_string()))?;
        let url = format!("{}/api/generate", self.base_url());
        tracing::debug!(model = %self.settings.model, prompt_chars = prompt.len(), "submitting prompt");

        let reply = self.transport
            .post_json(&url, &body, self.timeout())
            .await
            .map_err(|e| AssistError::Generation(e.to_string()))?;

        if !reply.is_success() {
            let msg = serde_json::from_str::<serde_json::Value>(&reply.body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(|s| s.to_string()))
                .unwrap_or_else(|| format!("backend returned status {}", reply.status));
            return Err(AssistError::Generation(msg));
        }

        let parsed: serde_json::Value = serde_json::from_str(&reply.body)
            .map_err(|e| AssistError::MalformedOutput(format!("invalid JSON from backend: {}", e)))?;
        match parsed.get("response").and_then(|r| r.as_str()) {
            Some(text) => Ok(text.trim().to_string()),
            None => Err(AssistError::MalformedOutput("backend response has no `response` field".to_string())),
        }
    }

    /// Installed models, for display only; empty on any failure.
    pub async fn list_models(&self) -> Vec<ModelInfo> {
        match self.fetch_tags(self.timeout()).await {
            Ok(tags) => tags
                .models
                .into_iter()
                .map(|t| ModelInfo { name: t.name, size: format_size(t.size), modified: t.modified_at })
                .collect(),
            Err(e) => {
                tracing::debug!(error = %e, "listing models failed");
                vec![]
            }
        }
    }
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
