use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    config::GeneratorConfig,
    error::{Result, StoryforgeError},
};

/// Substring the relay server uses when its model credential is missing.
const MISSING_SERVER_KEY: &str = "API_KEY is not set";
const UNKNOWN_SERVER_ERROR: &str = "Unknown server error";

/// Status and body exactly as received.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, payload: &Value) -> Result<RawResponse>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, config: &GeneratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let api_key = config.provider.validate_api_key()?;
        Self::new(config.endpoint(), api_key, config)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, payload: &Value) -> Result<RawResponse> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(payload);
        if let Some(key) = &self.api_key {
            request = request.header("x-goog-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(status, bytes = body.len(), endpoint = %self.endpoint, "Backend responded");

        Ok(RawResponse { status, body })
    }
}

/// Send the payload unless `cancel` fires first. A response that arrives
/// after cancellation is dropped unread.
pub async fn send_cancellable(
    transport: &dyn Transport,
    payload: &Value,
    cancel: &CancellationToken,
) -> Result<String> {
    let raw = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(StoryforgeError::Cancelled),
        raw = transport.post(payload) => raw?,
    };
    if cancel.is_cancelled() {
        return Err(StoryforgeError::Cancelled);
    }
    candidate_text(raw)
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Map a raw response to the first candidate's text, or to a typed error.
pub fn candidate_text(raw: RawResponse) -> Result<String> {
    if !(200..300).contains(&raw.status) {
        let message = error_message(&raw.body);
        tracing::warn!(status = raw.status, %message, "Backend returned an error");
        if message.contains(MISSING_SERVER_KEY) {
            return Err(StoryforgeError::configuration(format!(
                "The generation server has no model API key configured ({message})"
            )));
        }
        return Err(StoryforgeError::Backend {
            status: raw.status,
            message,
        });
    }

    let parsed: GenerateResponse = serde_json::from_str(&raw.body).map_err(|e| {
        tracing::warn!(error = %e, bytes = raw.body.len(), "Success body is not a candidates envelope");
        StoryforgeError::EmptyResponse
    })?;
    let first = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or(StoryforgeError::EmptyResponse)?;

    let text: String = first
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(StoryforgeError::EmptyResponse);
    }
    Ok(text)
}

fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return UNKNOWN_SERVER_ERROR.to_string();
    };
    let error = &value["error"];
    error
        .as_str()
        .or_else(|| error["message"].as_str())
        .unwrap_or(UNKNOWN_SERVER_ERROR)
        .to_string()
}
