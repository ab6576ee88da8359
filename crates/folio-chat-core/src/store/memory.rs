//! In-memory [`KnowledgeStore`] implementation for tests and local runs.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`. Search is brute-force
//! cosine similarity over every stored vector.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::embedding::cosine_similarity;
use crate::models::{EmbeddedChunk, RetrievalResult, StoredChunk};

use super::KnowledgeStore;

struct Row {
    id: Uuid,
    chunk: EmbeddedChunk,
}

/// In-memory knowledge store.
pub struct InMemoryStore {
    rows: RwLock<Vec<Row>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn search(
        &self,
        query: &[f32],
        match_threshold: f32,
        match_count: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let rows = self.rows.read().map_err(poisoned)?;
        let mut results: Vec<RetrievalResult> = rows
            .iter()
            .filter_map(|row| {
                let similarity = cosine_similarity(query, &row.chunk.embedding);
                if similarity < match_threshold {
                    return None;
                }
                Some(RetrievalResult {
                    content: row.chunk.content.clone(),
                    metadata: serde_json::to_value(&row.chunk.metadata).ok()?,
                    similarity,
                })
            })
            .collect();
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(match_count);
        Ok(results)
    }

    async fn clear(&self) -> Result<()> {
        self.rows.write().map_err(poisoned)?.clear();
        Ok(())
    }

    async fn insert(&self, chunk: &EmbeddedChunk) -> Result<()> {
        self.rows.write().map_err(poisoned)?.push(Row {
            id: Uuid::new_v4(),
            chunk: chunk.clone(),
        });
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.rows.read().map_err(poisoned)?.len() as u64)
    }

    async fn sample(&self, limit: usize) -> Result<Vec<StoredChunk>> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows
            .iter()
            .take(limit)
            .map(|row| StoredChunk {
                id: row.id,
                content: row.chunk.content.clone(),
                metadata: serde_json::to_value(&row.chunk.metadata)
                    .unwrap_or(serde_json::Value::Null),
            })
            .collect())
    }
}
