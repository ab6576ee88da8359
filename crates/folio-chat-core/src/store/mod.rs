//! Storage abstraction for the knowledge base.
//!
//! The [`KnowledgeStore`] trait covers everything the chat pipeline and the
//! seeding job need from a vector database, so the hosted backend and the
//! in-memory one are interchangeable.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EmbeddedChunk, RetrievalResult, StoredChunk};

/// Abstract knowledge base backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`search`](KnowledgeStore::search) | Nearest-neighbour search above a similarity threshold |
/// | [`clear`](KnowledgeStore::clear) | Delete every stored chunk |
/// | [`insert`](KnowledgeStore::insert) | Store one embedded chunk |
/// | [`count`](KnowledgeStore::count) | Number of stored chunks |
/// | [`sample`](KnowledgeStore::sample) | First few stored chunks, for inspection |
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Return at most `match_count` chunks whose similarity to `query` is at
    /// least `match_threshold`, most similar first.
    async fn search(
        &self,
        query: &[f32],
        match_threshold: f32,
        match_count: usize,
    ) -> Result<Vec<RetrievalResult>>;

    /// Remove all chunks.
    async fn clear(&self) -> Result<()>;

    async fn insert(&self, chunk: &EmbeddedChunk) -> Result<()>;

    async fn count(&self) -> Result<u64>;

    async fn sample(&self, limit: usize) -> Result<Vec<StoredChunk>>;
}
