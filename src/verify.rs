//! Knowledge base inspection (`folio verify`).

use anyhow::{Context, Result};
use folio_chat_core::models::StoredChunk;
use folio_chat_core::store::KnowledgeStore;

use crate::config::{Config, Credentials};
use crate::supabase::SupabaseStore;

const PREVIEW_CHARS: usize = 100;

/// What `folio verify` found.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub count: u64,
    pub samples: Vec<StoredChunk>,
}

pub async fn inspect(store: &dyn KnowledgeStore, limit: usize) -> Result<VerifyReport> {
    let count = store.count().await.context("Failed to count knowledge chunks")?;
    let samples = store
        .sample(limit)
        .await
        .context("Failed to fetch sample chunks")?;
    Ok(VerifyReport { count, samples })
}

/// First [`PREVIEW_CHARS`] characters of `content`, with an ellipsis when
/// truncated.
pub fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

fn describe(chunk: &StoredChunk) -> String {
    let kind = chunk.chunk_type().unwrap_or("unknown");
    match chunk.title() {
        Some(title) => format!("{} - {}", kind, title),
        None => kind.to_string(),
    }
}

pub fn print_report(report: &VerifyReport) {
    println!("Total chunks in database: {}", report.count);
    if report.samples.is_empty() {
        return;
    }
    println!();
    println!("Sample chunks:");
    println!();
    for (i, chunk) in report.samples.iter().enumerate() {
        println!("{}. Type: {}", i + 1, describe(chunk));
        println!("   Id: {}", chunk.id);
        println!("   Content preview: {}", preview(&chunk.content));
        println!();
    }
}

/// Entry point for `folio verify`.
pub async fn run_verify(config: &Config, limit: usize) -> Result<()> {
    let credentials = Credentials::from_env(config)?;
    let store = SupabaseStore::from_config(config, &credentials)?;
    let report = inspect(&store, limit).await?;
    print_report(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_chat_core::models::{ChunkMetadata, ChunkType, EmbeddedChunk};
    use folio_chat_core::store::memory::InMemoryStore;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
        assert_eq!(preview(&"a".repeat(100)), "a".repeat(100));
    }

    #[tokio::test]
    async fn test_inspect_counts_and_samples() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            let mut metadata = ChunkMetadata::new("profile", ChunkType::Work);
            metadata.title = Some(format!("Role {}", i));
            store
                .insert(&EmbeddedChunk {
                    content: format!("chunk {}", i),
                    metadata,
                    embedding: vec![1.0, 0.0],
                })
                .await
                .unwrap();
        }

        let report = inspect(&store, 3).await.unwrap();
        assert_eq!(report.count, 5);
        assert_eq!(report.samples.len(), 3);
        assert_eq!(describe(&report.samples[0]), "work - Role 0");
    }
}
