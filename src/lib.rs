//! # Folio Chat
//!
//! A retrieval-augmented chat assistant for a personal portfolio site.
//!
//! Visitors ask questions over HTTP; each question is embedded, matched
//! against a small curated knowledge base, and answered by a hosted LLM that
//! is instructed to speak only from the retrieved text. The answer streams
//! back as plain text.
//!
//! ## Architecture
//!
//! ```text
//!  visitor ──▶ POST /api/chat
//!                  │
//!                  ▼
//!          ┌───────────────┐   rewrite    ┌───────────┐
//!          │ ChatPipeline  │─────────────▶│  Gemini   │
//!          │               │   embed      │ (embed +  │
//!          │               │─────────────▶│ generate) │
//!          │               │   search     └───────────┘
//!          │               │─────────────▶┌───────────┐
//!          │               │              │ Supabase  │◀── folio seed
//!          └───────┬───────┘              └───────────┘
//!                  │ text deltas
//!                  ▼
//!            text/plain stream
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credentials |
//! | [`pipeline`] | Rewrite, embed, retrieve, generate |
//! | [`rewrite`] | Standalone query rewriting |
//! | [`gemini`] | Embedding and generation client |
//! | [`stream`] | SSE bytes to text deltas |
//! | [`supabase`] | PostgREST knowledge store |
//! | [`server`] | HTTP endpoint |
//! | [`seed`] | Knowledge base rebuild |
//! | [`session`] | Terminal chat client |

pub mod config;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod logging;
pub mod pipeline;
pub mod profile;
pub mod progress;
pub mod prompt;
pub mod rewrite;
pub mod seed;
pub mod server;
pub mod session;
pub mod stream;
pub mod supabase;
pub mod verify;
