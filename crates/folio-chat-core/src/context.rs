//! Context assembly for the generation step.
//!
//! The generation prompt is built only from retrieved chunk contents. When
//! retrieval comes back empty, a fixed marker takes the place of the context
//! so the model can acknowledge the gap instead of inventing an answer.

use crate::models::RetrievalResult;

/// Context used when no chunk met the similarity threshold.
pub const NO_CONTEXT_MARKER: &str = "(No relevant information found.)";

/// Separator placed between retrieved chunks.
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Join retrieved chunk contents in the order the store returned them.
pub fn build_context(results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return NO_CONTEXT_MARKER.to_string();
    }
    results
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join(CHUNK_SEPARATOR)
}

/// The final user turn: the context block followed by the visitor's question.
pub fn grounded_question(context: &str, question: &str) -> String {
    format!(
        "Here's what I know that might be relevant:\n\n{}\n\n{}",
        context, question
    )
}
