//! Seeding progress reporting.
//!
//! `folio seed` reports what it is doing as it goes: which sources were read,
//! how many chunks have been embedded and stored, and which ones failed.
//! The CLI prints to **stdout**; tests use [`NoProgress`].

use std::io::Write;

/// A single progress event for a seeding run.
#[derive(Clone, Debug, PartialEq)]
pub enum SeedEvent {
    /// A source produced `chunks` chunks.
    SourceLoaded { source: String, chunks: usize },
    /// A source could not be read; the run continues without it.
    SourceSkipped { source: String, reason: String },
    /// `n` of `total` chunks have been embedded.
    Embedding { n: u64, total: u64 },
    /// The store was emptied.
    Cleared,
    /// `n` of `total` embedded chunks have been written.
    Inserting { n: u64, total: u64 },
    /// A chunk was skipped after an embedding or insert failure.
    ChunkFailed { title: String, reason: String },
    /// The store holds `stored` rows after the run.
    Finished { stored: u64 },
}

/// Receives seeding progress. Called from [`crate::seed::seed_knowledge`].
pub trait SeedProgress: Send + Sync {
    fn report(&self, event: SeedEvent);
}

/// Human-friendly progress on stdout: "embedding  12 / 40 chunks".
pub struct StdoutProgress;

impl SeedProgress for StdoutProgress {
    fn report(&self, event: SeedEvent) {
        let line = match &event {
            SeedEvent::SourceLoaded { source, chunks } => {
                format!("source {}  {} chunks", source, format_number(*chunks as u64))
            }
            SeedEvent::SourceSkipped { source, reason } => {
                format!("source {}  skipped: {}", source, reason)
            }
            SeedEvent::Embedding { n, total } => format!(
                "embedding  {} / {} chunks",
                format_number(*n),
                format_number(*total)
            ),
            SeedEvent::Cleared => "cleared existing chunks".to_string(),
            SeedEvent::Inserting { n, total } => format!(
                "inserting  {} / {} chunks",
                format_number(*n),
                format_number(*total)
            ),
            SeedEvent::ChunkFailed { title, reason } => {
                format!("  failed {}: {}", title, reason)
            }
            SeedEvent::Finished { stored } => {
                format!("Knowledge base now holds {} chunks", format_number(*stored))
            }
        };
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

/// No-op reporter.
pub struct NoProgress;

impl SeedProgress for NoProgress {
    fn report(&self, _event: SeedEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
