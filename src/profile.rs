//! Structured profile blocks: the hand-authored half of the knowledge base.
//!
//! Blocks live in a TOML file of `[[blocks]]` tables. The copy in
//! `data/profile.toml` is compiled into the binary; `seed.profile_path`
//! replaces it at runtime.

use std::path::Path;

use anyhow::{bail, Context, Result};
use folio_chat_core::models::{ChunkMetadata, ChunkType, KnowledgeChunk};
use serde::Deserialize;

/// Provenance tag for profile chunks.
pub const PROFILE_SOURCE: &str = "profile";

const BUILTIN_PROFILE: &str = include_str!("../data/profile.toml");

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    blocks: Vec<ProfileBlock>,
}

#[derive(Debug, Deserialize)]
struct ProfileBlock {
    content: String,
    #[serde(rename = "type")]
    chunk_type: ChunkType,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    period: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

impl ProfileBlock {
    fn into_chunk(self) -> KnowledgeChunk {
        let mut metadata = ChunkMetadata::new(PROFILE_SOURCE, self.chunk_type);
        metadata.title = self.title;
        metadata.company = self.company;
        metadata.period = self.period;
        metadata.topics = self.topics;
        KnowledgeChunk {
            content: self.content.trim().to_string(),
            metadata,
        }
    }
}

/// Parse profile TOML into chunks, in file order.
pub fn parse_profile(text: &str) -> Result<Vec<KnowledgeChunk>> {
    let file: ProfileFile = toml::from_str(text).context("Failed to parse profile blocks")?;

    let mut chunks = Vec::with_capacity(file.blocks.len());
    for (i, block) in file.blocks.into_iter().enumerate() {
        if block.content.trim().is_empty() {
            bail!("profile block {} has empty content", i + 1);
        }
        chunks.push(block.into_chunk());
    }
    Ok(chunks)
}

/// Load profile chunks from `path`, or the built-in profile when `None`.
pub fn load_profile(path: Option<&Path>) -> Result<Vec<KnowledgeChunk>> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read profile file: {}", path.display()))?;
            parse_profile(&text)
        }
        None => parse_profile(BUILTIN_PROFILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profile_parses() {
        let chunks = load_profile(None).unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.metadata.source == PROFILE_SOURCE));
        assert!(chunks
            .iter()
            .any(|c| c.metadata.chunk_type == ChunkType::Contact));
        assert!(chunks.iter().all(|c| !c.content.is_empty()));
    }

    #[test]
    fn test_block_fields_carried_into_metadata() {
        let chunks = parse_profile(
            r#"
[[blocks]]
type = "work"
title = "Engineer"
company = "Acme"
period = "2020 - 2022"
topics = ["rust"]
content = "  Built things.  "
"#,
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        let meta = &chunks[0].metadata;
        assert_eq!(chunks[0].content, "Built things.");
        assert_eq!(meta.chunk_type, ChunkType::Work);
        assert_eq!(meta.title.as_deref(), Some("Engineer"));
        assert_eq!(meta.company.as_deref(), Some("Acme"));
        assert_eq!(meta.period.as_deref(), Some("2020 - 2022"));
        assert_eq!(meta.topics, vec!["rust"]);
        assert!(meta.section.is_none());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = parse_profile("[[blocks]]\ntype = \"gossip\"\ncontent = \"x\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_empty_content_rejected() {
        assert!(parse_profile("[[blocks]]\ntype = \"summary\"\ncontent = \" \"\n").is_err());
    }

    #[test]
    fn test_profile_file_override() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("profile.toml");
        std::fs::write(&path, "[[blocks]]\ntype = \"summary\"\ncontent = \"Hi\"\n").unwrap();
        let chunks = load_profile(Some(&path)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.chunk_type, ChunkType::Summary);
    }
}
