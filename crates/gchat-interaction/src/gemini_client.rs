//! Gemini REST client.
//!
//! Calls `generateContent` and `streamGenerateContent` directly over HTTP.
//! The client never retries; retry policy belongs to the caller.

use crate::sse::SseStreamReader;
use crate::wire::{ErrorWrapper, GenerateContentRequest, GenerateContentResponse};
use futures::StreamExt;
use futures::stream::BoxStream;
use gchat_core::config::{self, keys};
use gchat_core::{ConfigReader, GchatError, Result};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Raw response body chunks as delivered by reqwest.
pub type ByteStream = BoxStream<'static, std::result::Result<Vec<u8>, reqwest::Error>>;

/// Fragment reader over a live streaming response.
pub type ResponseStream = SseStreamReader<ByteStream>;

/// Endpoint and timeout settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// Base URL up to and including `/models`
    pub endpoint: String,
    /// Maximum idle time between reads of the response body
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl ClientSettings {
    pub fn from_config(config: &dyn ConfigReader) -> Result<Self> {
        let endpoint = config::get_string(config, keys::ENDPOINT)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config::get_parsed(
                config,
                keys::TIMEOUT_SECS,
                DEFAULT_TIMEOUT_SECS,
            )?),
            connect_timeout: Duration::from_secs(config::get_parsed(
                config,
                keys::CONNECT_TIMEOUT_SECS,
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?),
        })
    }
}

/// Talks to the Gemini HTTP API with a single API key.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, settings: ClientSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.timeout)
            .build()
            .map_err(|e| GchatError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: settings.endpoint,
        })
    }

    /// Builds a client from config. A missing or placeholder API key fails
    /// here, before any request is attempted.
    pub fn from_config(config: &dyn ConfigReader) -> Result<Self> {
        let api_key = config::api_key(config)?;
        Self::new(api_key, ClientSettings::from_config(config)?)
    }

    /// Sends one non-streaming request and returns the answer text.
    pub async fn generate(&self, model: &str, body: &GenerateContentRequest) -> Result<String> {
        let response = self.post(model, "generateContent", &[], body).await?;

        let raw = response.text().await.map_err(transport_error)?;
        let parsed: GenerateContentResponse = serde_json::from_str(&raw)
            .map_err(|e| GchatError::parse(format!("invalid Gemini response: {e}")))?;

        if let Some(error) = &parsed.error {
            return Err(GchatError::api(error.code, error.describe()));
        }

        parsed.first_text().map(str::to_string).ok_or_else(|| {
            GchatError::api(
                None,
                "Gemini returned no text in the response candidates",
            )
        })
    }

    /// Opens a streaming request and returns a reader over its SSE body.
    ///
    /// Dropping the reader closes the connection.
    pub async fn stream_generate(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<ResponseStream> {
        let response = self
            .post(model, "streamGenerateContent", &[("alt", "sse")], body)
            .await?;

        let bytes: ByteStream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(reqwest::Error::without_url))
            .boxed();

        Ok(SseStreamReader::new(bytes))
    }

    async fn post(
        &self,
        model: &str,
        method: &str,
        query: &[(&str, &str)],
        body: &GenerateContentRequest,
    ) -> Result<Response> {
        let url = format!("{}/{model}:{method}", self.endpoint);
        tracing::debug!(url = %url, ?query, turns = body.contents.len(), "sending Gemini request");

        let response = self
            .client
            .post(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }
        tracing::debug!(%status, "Gemini responded");
        Ok(response)
    }
}

fn transport_error(err: reqwest::Error) -> GchatError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    GchatError::transport(format!("Gemini API {kind}: {}", err.without_url()))
}

fn map_http_error(status: StatusCode, body: &str) -> GchatError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| wrapper.error.describe())
        .unwrap_or_else(|_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                trimmed.chars().take(500).collect()
            }
        });
    GchatError::api(Some(status.as_u16()), message)
}
