//! Generation provider abstraction.
//!
//! A [`Generator`] produces text for a [`GenerationRequest`] against a named
//! model, either as a lazy stream of deltas ([`Generator::stream`]) or as one
//! complete string ([`Generator::complete`]).
//!
//! A [`TextStream`] is finite and cannot be restarted. It ends when the
//! provider closes the response; a read failure is delivered as a final
//! `Err` item, after which nothing more is produced.

use std::pin::Pin;

use async_trait::async_trait;
use folio_chat_core::models::{ConversationTurn, Role};
use futures_util::Stream;
use serde::Serialize;

use crate::error::ProviderError;

/// Stream of assistant text deltas.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Provider-side speaker label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    User,
    Model,
}

impl From<Role> for ProviderRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ProviderRole::User,
            Role::Assistant => ProviderRole::Model,
        }
    }
}

/// One message of the provider conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: ProviderRole,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ProviderRole::User,
            text: text.into(),
        }
    }
}

impl From<&ConversationTurn> for Message {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role.into(),
            text: turn.content.clone(),
        }
    }
}

/// Everything a provider needs for one generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_instruction: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Start a streamed generation.
    ///
    /// Errors returned here (including [`ProviderError::QuotaExceeded`]) mean
    /// no stream was opened; errors after that arrive inside the stream.
    async fn stream(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<TextStream, ProviderError>;

    /// Run a generation to completion and return the concatenated text.
    async fn complete(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<String, ProviderError>;
}
