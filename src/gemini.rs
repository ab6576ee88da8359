//! Gemini API client: embeddings, streamed generation, and one-shot
//! generation.
//!
//! Endpoints (relative to `generation.base_url`):
//!
//! | Call | Endpoint |
//! |------|----------|
//! | Embedding | `POST /models/{model}:embedContent` |
//! | Streamed generation | `POST /models/{model}:streamGenerateContent?alt=sse` |
//! | One-shot generation | `POST /models/{model}:generateContent` |
//!
//! The API key travels in the `x-goog-api-key` header so it never appears in
//! URLs or request logs. Non-2xx responses are classified with
//! [`classify_upstream`]; quota errors become
//! [`ProviderError::QuotaExceeded`].

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use folio_chat_core::embedding::Embedder;
use serde::{Deserialize, Serialize};

use crate::config::{Config, Credentials};
use crate::error::{classify_upstream, ProviderError};
use crate::generation::{GenerationRequest, Generator, ProviderRole, TextStream};
use crate::stream::text_deltas;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub base_url: String,
    pub api_key: String,
    pub embedding_model: String,
    /// Total time allowed for embedding and one-shot generation calls.
    pub timeout: Duration,
    /// Longest gap tolerated between two reads of a generation stream.
    pub stream_idle_timeout: Duration,
}

impl GeminiSettings {
    pub fn from_config(config: &Config, credentials: &Credentials) -> Self {
        Self {
            base_url: config.generation.base_url.trim_end_matches('/').to_string(),
            api_key: credentials.gemini_api_key.clone(),
            embedding_model: config.embedding.model.clone(),
            timeout: Duration::from_secs(config.generation.timeout_secs),
            stream_idle_timeout: Duration::from_secs(config.generation.stream_idle_timeout_secs),
        }
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    settings: GeminiSettings,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(settings.timeout)
            .build()?;
        Ok(Self { http, settings })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.settings.base_url, model, method)
    }

    /// Embed one text with the configured embedding model.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let model = &self.settings.embedding_model;
        let body = EmbedBody {
            model: format!("models/{}", model),
            content: ContentBody {
                role: None,
                parts: vec![PartBody { text }],
            },
        };

        let response = self
            .http
            .post(self.endpoint(model, "embedContent"))
            .header(API_KEY_HEADER, &self.settings.api_key)
            .timeout(self.settings.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_upstream(model, status.as_u16(), &text));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("embedding response: {}", e)))?;
        if parsed.embedding.values.is_empty() {
            return Err(ProviderError::Malformed(
                "embedding response has no values".to_string(),
            ));
        }
        Ok(parsed.embedding.values)
    }
}

fn generate_body(request: &GenerationRequest) -> GenerateBody<'_> {
    GenerateBody {
        system_instruction: request.system_instruction.as_deref().map(|text| ContentBody {
            role: None,
            parts: vec![PartBody { text }],
        }),
        contents: request
            .messages
            .iter()
            .map(|m| ContentBody {
                role: Some(m.role),
                parts: vec![PartBody { text: &m.text }],
            })
            .collect(),
        generation_config: GenerationConfigBody {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        },
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn stream(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<TextStream, ProviderError> {
        let url = format!("{}?alt=sse", self.endpoint(model, "streamGenerateContent"));
        let pending = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.settings.api_key)
            .json(&generate_body(request))
            .send();
        // Only the wait for response headers is bounded here; reads are
        // bounded by the idle timeout.
        let response = tokio::time::timeout(self.settings.timeout, pending)
            .await
            .map_err(|_| ProviderError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_upstream(model, status.as_u16(), &text));
        }

        Ok(text_deltas(
            response.bytes_stream(),
            model,
            Some(self.settings.stream_idle_timeout),
        ))
    }

    async fn complete(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(self.endpoint(model, "generateContent"))
            .header(API_KEY_HEADER, &self.settings.api_key)
            .timeout(self.settings.timeout)
            .json(&generate_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_upstream(model, status.as_u16(), &text));
        }

        let parsed: CompleteResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("generation response: {}", e)))?;
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("generation response has no candidates".to_string()))?;

        Ok(candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    fn model_name(&self) -> &str {
        &self.settings.embedding_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text).await?)
    }
}

// ============ Wire types ============

#[derive(Serialize)]
struct EmbedBody<'a> {
    model: String,
    content: ContentBody<'a>,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ContentBody<'a>>,
    contents: Vec<ContentBody<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfigBody,
}

#[derive(Serialize)]
struct ContentBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<ProviderRole>,
    parts: Vec<PartBody<'a>>,
}

#[derive(Serialize)]
struct PartBody<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfigBody {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct CompleteResponse {
    #[serde(default)]
    candidates: Vec<CandidateResponse>,
}

#[derive(Deserialize)]
struct CandidateResponse {
    #[serde(default)]
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    #[serde(default)]
    text: Option<String>,
}
