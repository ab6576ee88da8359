//! # folio-chat core
//!
//! Network-free building blocks for the portfolio assistant: knowledge
//! models, the notes chunker, conversation history validation, context
//! assembly, server-sent-event frame decoding, and the storage and
//! embedding traits the application crate implements.
//!
//! This crate contains no tokio, HTTP client, or filesystem I/O.

pub mod context;
pub mod embedding;
pub mod history;
pub mod models;
pub mod notes;
pub mod sse;
pub mod store;
