//! Knowledge base seeding (`folio seed`).
//!
//! Replaces the store's contents with chunks built from two sources:
//!
//! 1. the structured profile blocks ([`crate::profile`]), required;
//! 2. the free-text notes document (`seed.notes_path`), optional. An
//!    unreadable notes file is logged and the run continues without it.
//!
//! # Order of operations
//!
//! ```text
//! build chunks ─▶ embed each ─▶ clear store ─▶ insert each ─▶ count
//! ```
//!
//! Embedding runs before the store is cleared, so readers only see an empty
//! or partial store for the duration of the inserts. Per-chunk embedding and
//! insert failures are reported and skipped. A failed clear aborts the run,
//! since inserting on top of old rows would duplicate them.

use std::time::Duration;

use anyhow::{Context, Result};
use folio_chat_core::embedding::Embedder;
use folio_chat_core::models::{ChunkMetadata, EmbeddedChunk, KnowledgeChunk};
use folio_chat_core::notes::{parse_notes, NotesOptions, NOTES_SOURCE};
use folio_chat_core::store::KnowledgeStore;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::{Config, Credentials};
use crate::gemini::{GeminiClient, GeminiSettings};
use crate::profile::{load_profile, PROFILE_SOURCE};
use crate::progress::{SeedEvent, SeedProgress, StdoutProgress};
use crate::supabase::SupabaseStore;

/// Outcome of a seeding run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    /// Chunks built from the sources.
    pub planned: u64,
    /// Chunks that received an embedding.
    pub embedded: u64,
    /// Chunks written to the store.
    pub inserted: u64,
    /// Chunks skipped after an embedding or insert failure.
    pub failed: u64,
    /// Rows in the store after the run.
    pub stored: u64,
    /// SHA-256 over the planned chunk contents, hex-encoded.
    pub digest: String,
}

/// Build the full chunk list: profile blocks first, then notes.
pub fn collect_chunks(config: &Config, progress: &dyn SeedProgress) -> Result<Vec<KnowledgeChunk>> {
    let mut chunks = load_profile(config.seed.profile_path.as_deref())?;
    progress.report(SeedEvent::SourceLoaded {
        source: PROFILE_SOURCE.to_string(),
        chunks: chunks.len(),
    });

    let notes_path = &config.seed.notes_path;
    match std::fs::read_to_string(notes_path) {
        Ok(text) => {
            let options = NotesOptions {
                owner_name: config.seed.owner_name.clone(),
            };
            let notes = parse_notes(&text, &options);
            progress.report(SeedEvent::SourceLoaded {
                source: NOTES_SOURCE.to_string(),
                chunks: notes.len(),
            });
            chunks.extend(notes);
        }
        Err(e) => {
            warn!(path = %notes_path.display(), error = %e, "could not read notes, continuing with profile only");
            progress.report(SeedEvent::SourceSkipped {
                source: NOTES_SOURCE.to_string(),
                reason: format!("{}: {}", notes_path.display(), e),
            });
        }
    }

    Ok(chunks)
}

/// Hex SHA-256 over chunk contents, in order.
pub fn content_digest(chunks: &[KnowledgeChunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.content.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

fn chunk_label(meta: &ChunkMetadata) -> String {
    match meta.title.as_deref().or(meta.section.as_deref()) {
        Some(title) => format!("{} - {}", meta.chunk_type, title),
        None => meta.chunk_type.to_string(),
    }
}

/// Embed `chunks` and replace the store's contents with them.
pub async fn seed_knowledge(
    embedder: &dyn Embedder,
    store: &dyn KnowledgeStore,
    chunks: Vec<KnowledgeChunk>,
    delay: Duration,
    progress: &dyn SeedProgress,
) -> Result<SeedReport> {
    let digest = content_digest(&chunks);
    let planned = chunks.len() as u64;
    let mut failed = 0u64;

    let mut embedded = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.into_iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match embedder.embed(&chunk.content).await {
            Ok(embedding) => embedded.push(EmbeddedChunk {
                content: chunk.content,
                metadata: chunk.metadata,
                embedding,
            }),
            Err(e) => {
                let title = chunk_label(&chunk.metadata);
                warn!(chunk = %title, error = %format!("{:#}", e), "embedding failed, skipping chunk");
                failed += 1;
                progress.report(SeedEvent::ChunkFailed {
                    title,
                    reason: format!("{:#}", e),
                });
            }
        }
        progress.report(SeedEvent::Embedding {
            n: i as u64 + 1,
            total: planned,
        });
    }

    store
        .clear()
        .await
        .context("Failed to clear existing knowledge chunks (the table may not exist yet)")?;
    progress.report(SeedEvent::Cleared);

    let total = embedded.len() as u64;
    let mut inserted = 0u64;
    for (i, chunk) in embedded.iter().enumerate() {
        match store.insert(chunk).await {
            Ok(()) => inserted += 1,
            Err(e) => {
                let title = chunk_label(&chunk.metadata);
                warn!(chunk = %title, error = %format!("{:#}", e), "insert failed, skipping chunk");
                failed += 1;
                progress.report(SeedEvent::ChunkFailed {
                    title,
                    reason: format!("{:#}", e),
                });
            }
        }
        progress.report(SeedEvent::Inserting {
            n: i as u64 + 1,
            total,
        });
    }

    let stored = store
        .count()
        .await
        .context("Failed to count knowledge chunks")?;
    progress.report(SeedEvent::Finished { stored });

    Ok(SeedReport {
        planned,
        embedded: total,
        inserted,
        failed,
        stored,
        digest,
    })
}

/// Entry point for `folio seed`.
pub async fn run_seed(config: &Config) -> Result<SeedReport> {
    let credentials = Credentials::from_env(config)?;
    let embedder = GeminiClient::new(GeminiSettings::from_config(config, &credentials))?;
    let store = SupabaseStore::from_config(config, &credentials)?;

    let progress = StdoutProgress;
    let chunks = collect_chunks(config, &progress)?;
    println!("Total chunks to process: {}", chunks.len());

    let report = seed_knowledge(
        &embedder,
        &store,
        chunks,
        Duration::from_millis(config.seed.delay_ms),
        &progress,
    )
    .await?;

    println!(
        "Done! {} chunks stored ({} inserted, {} failed). digest {}",
        report.stored, report.inserted, report.failed, report.digest
    );
    Ok(report)
}
