//! Core data models shared by the chat pipeline and the seeding job.
//!
//! These types describe the knowledge chunks held in the vector store, the
//! rows a similarity search returns, and the conversation turns a visitor
//! exchanges with the assistant.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a knowledge chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Summary,
    Work,
    Project,
    UseCase,
    Contact,
    Personal,
    Family,
    Hobbies,
    Values,
    Preferences,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Summary => "summary",
            ChunkType::Work => "work",
            ChunkType::Project => "project",
            ChunkType::UseCase => "use_case",
            ChunkType::Contact => "contact",
            ChunkType::Personal => "personal",
            ChunkType::Family => "family",
            ChunkType::Hobbies => "hobbies",
            ChunkType::Values => "values",
            ChunkType::Preferences => "preferences",
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata stored alongside every chunk.
///
/// `source` and `type` are always present; the remaining fields are omitted
/// from the serialized form when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Provenance tag, e.g. `"profile"` or `"personal-notes"`.
    pub source: String,
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
}

impl ChunkMetadata {
    pub fn new(source: impl Into<String>, chunk_type: ChunkType) -> Self {
        Self {
            source: source.into(),
            chunk_type,
            title: None,
            company: None,
            period: None,
            section: None,
            topics: Vec::new(),
        }
    }
}

/// A unit of retrievable text, before it has been embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A chunk as written to the store: content, metadata, and its vector.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddedChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// A chunk read back from the store without its vector.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredChunk {
    /// Row id assigned by the store on insert.
    pub id: Uuid,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl StoredChunk {
    /// The `type` tag from the stored metadata, if it is a string.
    pub fn chunk_type(&self) -> Option<&str> {
        self.metadata.get("type").and_then(|v| v.as_str())
    }

    /// The `title` tag from the stored metadata, if it is a string.
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(|v| v.as_str())
    }
}

/// One row of a similarity search.
///
/// Metadata is kept as raw JSON: rows written by other tools may carry tags
/// this crate does not know, and the pipeline only consumes `content`.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalResult {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub similarity: f32,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A prior turn of the conversation, as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_serializes_type_and_skips_unset_fields() {
        let mut meta = ChunkMetadata::new("profile", ChunkType::UseCase);
        meta.title = Some("Unified Access Pilot".to_string());
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            value,
            json!({"source": "profile", "type": "use_case", "title": "Unified Access Pilot"})
        );
    }

    #[test]
    fn test_metadata_topics_roundtrip() {
        let raw = json!({
            "source": "personal-notes",
            "type": "hobbies",
            "section": "Hobbies",
            "topics": ["games", "music"]
        });
        let meta: ChunkMetadata = serde_json::from_value(raw).unwrap();
        assert_eq!(meta.chunk_type, ChunkType::Hobbies);
        assert_eq!(meta.topics, vec!["games", "music"]);
        assert!(meta.title.is_none());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("assistant"), Some(Role::Assistant));
        assert_eq!(Role::parse("system"), None);
        assert_eq!(Role::parse("User"), None);
    }

    #[test]
    fn test_stored_chunk_accessors() {
        let stored: StoredChunk = serde_json::from_value(json!({
            "id": "0b9a3c0e-54c7-4c55-9e0e-3f4f6a1d2b7c",
            "content": "hello",
            "metadata": {"type": "work", "title": "Architect"}
        }))
        .unwrap();
        assert_eq!(stored.chunk_type(), Some("work"));
        assert_eq!(stored.title(), Some("Architect"));
        assert_eq!(stored.id.to_string(), "0b9a3c0e-54c7-4c55-9e0e-3f4f6a1d2b7c");
    }
}
