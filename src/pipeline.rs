//! The retrieval-augmented answer pipeline.
//!
//! One chat request runs these steps in order, each awaiting the previous:
//!
//! 1. **Rewrite** the message into a standalone query when history exists
//!    (best-effort, see [`QueryRewriter`]).
//! 2. **Embed** the query. Failure is fatal for the request.
//! 3. **Search** the knowledge store. Failure degrades to zero results.
//! 4. **Build context** from the results, or the no-information marker.
//! 5. **Generate** a streamed answer with the primary model; on a quota error
//!    retry once with the fallback model.
//!
//! The returned [`TextStream`] is lazy: nothing beyond the first provider
//! response is read until the caller polls it.

use std::sync::Arc;

use anyhow::Result;
use folio_chat_core::context::{build_context, grounded_question};
use folio_chat_core::embedding::Embedder;
use folio_chat_core::models::ConversationTurn;
use folio_chat_core::store::KnowledgeStore;
use tracing::{error, info, warn};

use crate::config::{Config, Credentials};
use crate::error::{ChatError, QUOTA_RETRY_AFTER_SECS};
use crate::gemini::{GeminiClient, GeminiSettings};
use crate::generation::{GenerationRequest, Generator, Message, TextStream};
use crate::prompt::SYSTEM_PROMPT;
use crate::rewrite::QueryRewriter;
use crate::supabase::SupabaseStore;

/// A validated chat request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<ConversationTurn>,
}

/// Retrieval and generation parameters, fixed for the life of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub match_count: usize,
    pub match_threshold: f32,
    pub primary_model: String,
    pub fallback_model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub max_history: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            match_count: config.retrieval.match_count,
            match_threshold: config.retrieval.match_threshold,
            primary_model: config.generation.primary_model.clone(),
            fallback_model: config.generation.fallback_model.clone(),
            temperature: config.generation.temperature,
            max_output_tokens: config.generation.max_output_tokens,
            max_history: config.generation.max_history,
        }
    }
}

pub struct ChatPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn KnowledgeStore>,
    generator: Arc<dyn Generator>,
    rewriter: QueryRewriter,
    settings: PipelineSettings,
}

impl ChatPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn KnowledgeStore>,
        generator: Arc<dyn Generator>,
        config: &Config,
    ) -> Self {
        let rewriter = QueryRewriter::new(generator.clone(), &config.rewrite);
        Self {
            embedder,
            store,
            generator,
            rewriter,
            settings: PipelineSettings::from_config(config),
        }
    }

    /// Wire the pipeline to Gemini and Supabase.
    pub fn connect(config: &Config, credentials: &Credentials) -> Result<Self> {
        let gemini = Arc::new(GeminiClient::new(GeminiSettings::from_config(
            config,
            credentials,
        ))?);
        let store = Arc::new(SupabaseStore::from_config(config, credentials)?);
        Ok(Self::new(gemini.clone(), store, gemini, config))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Embed `query` and return the context block for it.
    pub async fn retrieve_context(&self, query: &str) -> Result<String, ChatError> {
        let vector = self.embedder.embed(query).await.map_err(|e| {
            error!(error = %format!("{:#}", e), "query embedding failed");
            ChatError::Embedding(e)
        })?;

        let results = match self
            .store
            .search(&vector, self.settings.match_threshold, self.settings.match_count)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "knowledge search failed, continuing without context");
                Vec::new()
            }
        };

        info!(results = results.len(), "retrieved knowledge");
        Ok(build_context(&results))
    }

    /// The provider request for `request` given an already-built context.
    pub fn generation_request(&self, context: &str, request: &ChatRequest) -> GenerationRequest {
        let mut messages: Vec<Message> = request.history.iter().map(Message::from).collect();
        messages.push(Message::user(grounded_question(context, &request.message)));

        GenerationRequest {
            system_instruction: Some(SYSTEM_PROMPT.to_string()),
            messages,
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_output_tokens,
        }
    }

    /// Answer one question as a stream of text deltas.
    pub async fn answer(&self, request: &ChatRequest) -> Result<TextStream, ChatError> {
        if request.message.trim().is_empty() {
            return Err(ChatError::Validation("Message is required".to_string()));
        }

        let query = self
            .rewriter
            .rewrite(&request.message, &request.history)
            .await;
        let context = self.retrieve_context(&query).await?;
        let generation = self.generation_request(&context, request);

        self.generate(&generation).await
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<TextStream, ChatError> {
        let primary = &self.settings.primary_model;
        let fallback = &self.settings.fallback_model;

        match self.generator.stream(primary, request).await {
            Ok(stream) => Ok(stream),
            Err(e) if e.is_quota() => {
                info!(primary = %primary, fallback = %fallback, "primary model over quota, trying fallback");
                match self.generator.stream(fallback, request).await {
                    Ok(stream) => Ok(stream),
                    Err(e) if e.is_quota() => {
                        warn!(error = %e, "fallback model over quota");
                        Err(ChatError::QuotaExhausted {
                            retry_after_secs: QUOTA_RETRY_AFTER_SECS,
                        })
                    }
                    Err(e) => {
                        error!(model = %fallback, error = %e, "generation failed");
                        Err(e.into())
                    }
                }
            }
            Err(e) => {
                error!(model = %primary, error = %e, "generation failed");
                Err(e.into())
            }
        }
    }
}
