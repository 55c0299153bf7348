//! Gemini `generateContent` client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use spotter_models::EnrichedObject;
use spotter_vision::encode_jpeg;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::enricher::{EnrichRequest, RemoteEnricher};
use crate::error::{EnrichError, EnrichResult};
use crate::metrics;
use crate::parser::parse_response;
use crate::prompt::build_prompt;
use crate::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, InlineData, Part};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for the Gemini enricher.
#[derive(Debug, Clone)]
pub struct EnricherConfig {
    pub api_key: String,
    /// Base URL of the Generative Language API
    pub base_url: String,
    pub model: String,
    /// Whole-call timeout, including upload and parsing
    pub timeout: Duration,
    /// Longest image side sent upstream
    pub max_image_dim: u32,
    pub jpeg_quality: u8,
    pub temperature: f32,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(10),
            max_image_dim: 1024,
            jpeg_quality: 80,
            temperature: 0.1,
        }
    }
}

impl EnricherConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            timeout: std::env::var("ENRICH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_image_dim: std::env::var("ENRICH_MAX_IMAGE_DIM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_image_dim),
            ..defaults
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Remote enricher backed by Gemini.
pub struct GeminiEnricher {
    http: Client,
    config: EnricherConfig,
}

impl GeminiEnricher {
    /// Create a new client. Fails without an API key.
    pub fn new(config: EnricherConfig) -> EnrichResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EnrichError::config("GEMINI_API_KEY not set"));
        }

        let http = Client::builder().build()?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> EnrichResult<Self> {
        Self::new(EnricherConfig::from_env())
    }

    pub fn config(&self) -> &EnricherConfig {
        &self.config
    }

    async fn encode_frames(&self, request: &EnrichRequest) -> EnrichResult<Vec<String>> {
        let frames = request.frames.clone();
        let max_dim = self.config.max_image_dim;
        let quality = self.config.jpeg_quality;

        tokio::task::spawn_blocking(move || {
            frames
                .iter()
                .map(|frame| {
                    encode_jpeg(&frame.image, max_dim, quality)
                        .map(|bytes| STANDARD.encode(bytes))
                        .map_err(|e| EnrichError::Encoding(e.to_string()))
                })
                .collect::<EnrichResult<Vec<_>>>()
        })
        .await
        .map_err(|e| EnrichError::Encoding(format!("Encoding task failed: {}", e)))?
    }

    async fn call(
        &self,
        request: &EnrichRequest,
        cancel: &CancelToken,
    ) -> EnrichResult<Vec<EnrichedObject>> {
        if cancel.is_cancelled() {
            return Err(EnrichError::Cancelled);
        }

        let images = tokio::select! {
            images = self.encode_frames(request) => images?,
            _ = cancel.cancelled() => return Err(EnrichError::Cancelled),
        };

        let mut parts = vec![Part::Text {
            text: build_prompt(&request.context, images.len()),
        }];
        parts.extend(images.into_iter().map(|data| Part::Inline {
            inline_data: InlineData {
                mime_type: "image/jpeg",
                data,
            },
        }));

        let body = GenerateContentRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: self.config.temperature,
            },
        };

        if cancel.is_cancelled() {
            return Err(EnrichError::Cancelled);
        }

        let url = self.config.endpoint();
        debug!(model = %self.config.model, images = request.frames.len(), "Sending identification request");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let raw = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&raw)
            .map_err(|e| EnrichError::unparseable(format!("Invalid API envelope: {}", e)))?;

        match parsed.text() {
            Some(text) => parse_response(&text),
            None => Err(EnrichError::unparseable("No content in response")),
        }
    }
}

#[async_trait]
impl RemoteEnricher for GeminiEnricher {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn identify(
        &self,
        request: &EnrichRequest,
        cancel: &CancelToken,
    ) -> EnrichResult<Vec<EnrichedObject>> {
        let started = Instant::now();

        let result = match tokio::time::timeout(self.config.timeout, self.call(request, cancel)).await {
            Ok(result) => result,
            Err(_) => Err(EnrichError::Timeout(self.config.timeout)),
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let frame_index = request.anchor().map(|f| f.index);
        match &result {
            Ok(items) => {
                metrics::record_call(self.name(), "ok", latency_ms, items.len());
                debug!(?frame_index, items = items.len(), latency_ms, "Identification completed");
            }
            Err(EnrichError::Cancelled) => {
                debug!(?frame_index, "Identification cancelled before submission");
            }
            Err(e) => {
                metrics::record_call(self.name(), e.kind(), latency_ms, 0);
                warn!(?frame_index, error = %e, latency_ms, "Identification failed");
            }
        }

        result
    }
}
