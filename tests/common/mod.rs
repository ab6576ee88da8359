//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::Router;
use folio_chat::error::ProviderError;
use folio_chat::generation::{GenerationRequest, Generator, TextStream};
use folio_chat_core::embedding::Embedder;
use folio_chat_core::models::{EmbeddedChunk, RetrievalResult, StoredChunk};
use folio_chat_core::store::memory::InMemoryStore;
use folio_chat_core::store::KnowledgeStore;
use futures_util::stream;

/// Serve `app` on an ephemeral local port.
pub async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ─── Embedder ───────────────────────────────────────────────────────

const VOCABULARY: &[&str] = &[
    "rust", "music", "games", "family", "brisket", "sd-wan", "project", "contact",
];

/// Bag-of-keywords embedder: one dimension per vocabulary word plus a small
/// constant so no vector is all zeros.
pub struct KeywordEmbedder {
    fail_on: Option<String>,
    pub calls: AtomicUsize,
    pub inputs: Mutex<Vec<String>>,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            fail_on: None,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Fail every text containing `marker`.
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_on: Some(marker.to_string()),
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v: Vec<f32> = VOCABULARY
        .iter()
        .map(|w| if lower.contains(w) { 1.0 } else { 0.0 })
        .collect();
    v.push(0.05);
    v
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(text.to_string());
        if let Some(marker) = &self.fail_on {
            if text.contains(marker.as_str()) {
                bail!("embedding provider rejected the text");
            }
        }
        Ok(keyword_vector(text))
    }
}

// ─── Store ──────────────────────────────────────────────────────────

/// [`InMemoryStore`] with switchable failures.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    pub fail_search: bool,
    pub fail_clear: bool,
    pub fail_insert_on: Option<String>,
    pub searches: AtomicUsize,
}

#[async_trait]
impl KnowledgeStore for FlakyStore {
    async fn search(
        &self,
        query: &[f32],
        match_threshold: f32,
        match_count: usize,
    ) -> Result<Vec<RetrievalResult>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_search {
            bail!("search function does not exist");
        }
        self.inner.search(query, match_threshold, match_count).await
    }

    async fn clear(&self) -> Result<()> {
        if self.fail_clear {
            bail!("permission denied for table knowledge_chunks");
        }
        self.inner.clear().await
    }

    async fn insert(&self, chunk: &EmbeddedChunk) -> Result<()> {
        if let Some(marker) = &self.fail_insert_on {
            if chunk.content.contains(marker.as_str()) {
                bail!("insert rejected");
            }
        }
        self.inner.insert(chunk).await
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn sample(&self, limit: usize) -> Result<Vec<StoredChunk>> {
        self.inner.sample(limit).await
    }
}

// ─── Generator ──────────────────────────────────────────────────────

#[derive(Clone)]
pub enum Reply {
    Text(Vec<&'static str>),
    Quota,
    Fail(u16),
}

/// Generator that answers per model from a script and records every call.
pub struct ScriptedGenerator {
    replies: HashMap<String, Reply>,
    rewrite: Option<String>,
    pub streams: Mutex<Vec<(String, GenerationRequest)>>,
    pub completions: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            rewrite: None,
            streams: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(mut self, model: &str, reply: Reply) -> Self {
        self.replies.insert(model.to_string(), reply);
        self
    }

    pub fn rewrite_to(mut self, text: &str) -> Self {
        self.rewrite = Some(text.to_string());
        self
    }

    pub fn stream_models(&self) -> Vec<String> {
        self.streams
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub fn last_request(&self) -> GenerationRequest {
        self.streams.lock().unwrap().last().unwrap().1.clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn stream(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<TextStream, ProviderError> {
        self.streams
            .lock()
            .unwrap()
            .push((model.to_string(), request.clone()));
        match self.replies.get(model).cloned() {
            Some(Reply::Text(parts)) => {
                let items: Vec<Result<String, ProviderError>> =
                    parts.into_iter().map(|p| Ok(p.to_string())).collect();
                Ok(Box::pin(stream::iter(items)))
            }
            Some(Reply::Quota) => Err(ProviderError::QuotaExceeded {
                model: model.to_string(),
                message: "Resource has been exhausted".to_string(),
            }),
            Some(Reply::Fail(status)) => Err(ProviderError::Upstream {
                status,
                message: "upstream exploded".to_string(),
            }),
            None => Err(ProviderError::Malformed(format!("no script for {}", model))),
        }
    }

    async fn complete(
        &self,
        _model: &str,
        request: &GenerationRequest,
    ) -> Result<String, ProviderError> {
        self.completions.lock().unwrap().push(request.clone());
        match &self.rewrite {
            Some(text) => Ok(text.clone()),
            None => Err(ProviderError::Upstream {
                status: 500,
                message: "rewrite unavailable".to_string(),
            }),
        }
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
