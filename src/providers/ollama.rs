//! Ollama provider implementation using the `/api/generate` API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use super::{
    check_http_response, shorten_error_body, CompletionRequest, CompletionResponse, LlmProvider,
    ProviderError, StreamChunk, UsageStats,
};

/// Default Ollama API base URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default model.
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen3:0.6b";

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Ollama generate API request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    /// Model name.
    pub model: String,
    /// Prompt text.
    pub prompt: String,
    /// System prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Stream NDJSON chunks instead of one body.
    pub stream: bool,
    /// Generation options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

/// Ollama generation options.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct GenerateOptions {
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// Ollama generate API response body, also one streamed NDJSON line.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    /// Generated text (a fragment when streaming).
    #[serde(default)]
    pub response: String,
    /// Model that served the response.
    #[serde(default)]
    pub model: String,
    /// Generation finished.
    #[serde(default)]
    pub done: bool,
    /// Input token count.
    pub prompt_eval_count: Option<u32>,
    /// Output token count.
    pub eval_count: Option<u32>,
}

/// `/api/tags` response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    /// Locally pulled models.
    #[serde(default)]
    pub models: Vec<TagEntry>,
}

/// One pulled model.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct TagEntry {
    /// Model name including tag, e.g. `qwen3:0.6b`.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Ollama generate API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    /// Model name passed to Ollama.
    #[doc(hidden)]
    pub model: String,
    /// Base URL for the Ollama API.
    #[doc(hidden)]
    pub base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a provider for `model` at the default URL.
    pub fn new(model: String) -> Self {
        Self {
            model,
            base_url: DEFAULT_OLLAMA_URL.to_owned(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a provider with a base URL and request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_settings(
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            model,
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    /// Check whether the Ollama server is reachable.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        self.client.get(&url).send().await.is_ok()
    }

    /// Check that the configured model has been pulled.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or the tag list is malformed.
    pub async fn has_model(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?;
        let body = check_http_response(response).await?;
        model_listed(&body, &self.model)
    }

    /// Fail unless the server is reachable and the model is pulled.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Unavailable` if the model is missing, or the
    /// transport error if the server cannot be reached.
    pub async fn ensure_ready(&self) -> Result<(), ProviderError> {
        if self.has_model().await? {
            return Ok(());
        }
        Err(ProviderError::Unavailable(format!(
            "model '{}' is not pulled on {}",
            self.model, self.base_url
        )))
    }
}

// ---------------------------------------------------------------------------
// Request / Response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build an Ollama generate request.
#[doc(hidden)]
pub fn build_request(model: &str, request: &CompletionRequest, stream: bool) -> GenerateRequest {
    GenerateRequest {
        model: model.to_owned(),
        prompt: request.prompt.clone(),
        system: request.system.clone(),
        stream,
        options: request.max_tokens.map(|n| GenerateOptions {
            num_predict: Some(n),
        }),
    }
}

/// Parse a non-streaming generate response.
///
/// # Errors
///
/// Returns `ProviderError::Parse` if the body cannot be deserialized.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<CompletionResponse, ProviderError> {
    let resp: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    Ok(CompletionResponse {
        text: resp.response,
        usage: UsageStats {
            input_tokens: resp.prompt_eval_count.unwrap_or(0),
            output_tokens: resp.eval_count.unwrap_or(0),
        },
        model: resp.model,
    })
}

/// Parse one NDJSON line of a streamed response. Blank or malformed lines yield `None`.
#[doc(hidden)]
pub fn parse_stream_line(line: &str) -> Option<StreamChunk> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<GenerateResponse>(line) {
        Ok(resp) => Some(StreamChunk {
            content: resp.response,
            done: resp.done,
        }),
        Err(e) => {
            debug!(error = %e, "skipping malformed stream line");
            None
        }
    }
}

/// Whether `model` appears in a `/api/tags` body.
///
/// # Errors
///
/// Returns `ProviderError::Parse` if the body cannot be deserialized.
#[doc(hidden)]
pub fn model_listed(body: &str, model: &str) -> Result<bool, ProviderError> {
    let tags: TagsResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;
    Ok(tags.models.iter().any(|m| m.name == model))
}

// ---------------------------------------------------------------------------
// Trait impl
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let api_request = build_request(&self.model, &request, false);

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        parse_response(&payload)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<usize, ProviderError> {
        let api_request = build_request(&self.model, &request, true);

        let url = format!("{}/api/generate", self.base_url);
        let response = self.client.post(&url).json(&api_request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                body: shorten_error_body(&body),
            });
        }

        let mut bytes = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut sent: usize = 0;

        while let Some(piece) = bytes.next().await {
            buffer.extend_from_slice(&piece?);
            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let Some(chunk) = parse_stream_line(&String::from_utf8_lossy(&line)) else {
                    continue;
                };
                let done = chunk.done;
                if tx.send(chunk).await.is_err() {
                    warn!("stream receiver dropped, stopping");
                    return Ok(sent);
                }
                sent = sent.saturating_add(1);
                if done {
                    return Ok(sent);
                }
            }
        }

        // Trailing line without a newline.
        if let Some(chunk) = parse_stream_line(&String::from_utf8_lossy(&buffer)) {
            if tx.send(chunk).await.is_ok() {
                sent = sent.saturating_add(1);
            }
        }
        Ok(sent)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
