//! Conversational query rewriting.
//!
//! Follow-ups such as "what about that project?" embed poorly on their own.
//! [`QueryRewriter`] asks the generation provider for a standalone version of
//! the question and uses it as the retrieval query. The step is best-effort:
//! every failure path returns the original message.

use std::sync::Arc;

use folio_chat_core::models::ConversationTurn;
use tracing::{debug, warn};

use crate::config::RewriteConfig;
use crate::generation::{GenerationRequest, Generator, Message};
use crate::prompt::{rewrite_input, REWRITE_INSTRUCTION};

pub struct QueryRewriter {
    generator: Arc<dyn Generator>,
    model: String,
    max_output_tokens: u32,
    enabled: bool,
}

impl QueryRewriter {
    pub fn new(generator: Arc<dyn Generator>, config: &RewriteConfig) -> Self {
        Self {
            generator,
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            enabled: config.enabled,
        }
    }

    /// Produce the query used for retrieval.
    ///
    /// Returns `message` unchanged when there is no history, rewriting is
    /// disabled, the provider call fails, or the rewrite is blank.
    pub async fn rewrite(&self, message: &str, history: &[ConversationTurn]) -> String {
        if !self.enabled || history.is_empty() {
            return message.to_string();
        }

        let request = GenerationRequest {
            system_instruction: Some(REWRITE_INSTRUCTION.to_string()),
            messages: vec![Message::user(rewrite_input(history, message))],
            temperature: 0.0,
            max_output_tokens: self.max_output_tokens,
        };

        match self.generator.complete(&self.model, &request).await {
            Ok(text) => {
                let rewritten = text.trim();
                if rewritten.is_empty() {
                    return message.to_string();
                }
                debug!(original = message, rewritten, "rewrote follow-up query");
                rewritten.to_string()
            }
            Err(e) => {
                warn!(error = %e, "query rewrite failed, using original message");
                message.to_string()
            }
        }
    }
}
