//! Heading-based chunker for the free-text notes document.
//!
//! The notes file is Markdown organised by headings:
//!
//! ```text
//! # Owner Name            <- introduction, always skipped
//! intro text...
//!
//! ## Hobbies              <- top-level section
//! preamble text...        <- becomes its own chunk when non-empty
//!
//! ### Games               <- subsection, one chunk each
//! ...
//! ```
//!
//! Sections without subsections become a single chunk. Every chunk is
//! classified by looking its title up in [`CLASSIFICATIONS`]; subsections
//! fall back to their parent section's title, and unmatched titles get
//! [`FALLBACK`].

use crate::models::{ChunkMetadata, ChunkType, KnowledgeChunk};

/// Provenance tag for chunks produced from the notes document.
pub const NOTES_SOURCE: &str = "personal-notes";

const SECTION_PREFIX: &str = "## ";
const SUBSECTION_PREFIX: &str = "### ";

/// Type and topic tags assigned to a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub chunk_type: ChunkType,
    pub topics: &'static [&'static str],
}

/// Ordered title keyword table. The first keyword found (case-insensitive
/// substring) in a title wins.
pub const CLASSIFICATIONS: &[(&str, Classification)] = &[
    ("home life", class(ChunkType::Family, &["family", "home"])),
    ("family", class(ChunkType::Family, &["family"])),
    ("hobbies", class(ChunkType::Hobbies, &["hobbies"])),
    ("interests", class(ChunkType::Hobbies, &["interests"])),
    ("games", class(ChunkType::Hobbies, &["games"])),
    ("media", class(ChunkType::Hobbies, &["media", "entertainment"])),
    ("music", class(ChunkType::Hobbies, &["music"])),
    ("sports", class(ChunkType::Hobbies, &["sports"])),
    ("travel", class(ChunkType::Hobbies, &["travel"])),
    ("values", class(ChunkType::Values, &["values"])),
    ("principles", class(ChunkType::Values, &["values", "principles"])),
    ("personality", class(ChunkType::Values, &["personality"])),
    ("preferences", class(ChunkType::Preferences, &["preferences"])),
    ("routine", class(ChunkType::Preferences, &["routine"])),
    ("habits", class(ChunkType::Preferences, &["habits"])),
    ("food", class(ChunkType::Preferences, &["food"])),
    ("work style", class(ChunkType::Work, &["work style"])),
    ("career", class(ChunkType::Work, &["career"])),
    ("education", class(ChunkType::Personal, &["education"])),
    ("background", class(ChunkType::Personal, &["background"])),
];

/// Classification for titles that match nothing in the table.
pub const FALLBACK: Classification = class(ChunkType::Personal, &["general"]);

const fn class(chunk_type: ChunkType, topics: &'static [&'static str]) -> Classification {
    Classification { chunk_type, topics }
}

/// Look a title up in [`CLASSIFICATIONS`].
pub fn classify_title(title: &str) -> Option<Classification> {
    let lower = title.to_lowercase();
    CLASSIFICATIONS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, c)| *c)
}

/// Options controlling which sections are skipped.
#[derive(Debug, Clone, Default)]
pub struct NotesOptions {
    /// Sections whose title starts with this (the owner's own name, typically
    /// used for a header block) are skipped.
    pub owner_name: Option<String>,
}

#[derive(Debug, Default)]
struct Section {
    title: String,
    preamble: Vec<String>,
    subsections: Vec<(String, Vec<String>)>,
}

impl Section {
    fn push_line(&mut self, line: &str) {
        match self.subsections.last_mut() {
            Some((_, lines)) => lines.push(line.to_string()),
            None => self.preamble.push(line.to_string()),
        }
    }
}

/// Split a notes document into classified knowledge chunks.
///
/// Chunk order follows document order. Empty sections and subsections are
/// dropped.
pub fn parse_notes(text: &str, options: &NotesOptions) -> Vec<KnowledgeChunk> {
    let mut sections: Vec<Section> = Vec::new();

    for line in text.lines() {
        if let Some(title) = line.strip_prefix(SECTION_PREFIX) {
            sections.push(Section {
                title: title.trim().to_string(),
                ..Section::default()
            });
            continue;
        }
        // Anything before the first section heading is the introduction.
        let Some(current) = sections.last_mut() else {
            continue;
        };
        if let Some(title) = line.strip_prefix(SUBSECTION_PREFIX) {
            current
                .subsections
                .push((title.trim().to_string(), Vec::new()));
        } else {
            current.push_line(line);
        }
    }

    let mut chunks = Vec::new();
    for section in sections {
        if is_skipped(&section.title, options) {
            continue;
        }
        let section_class = classify_title(&section.title);

        let preamble = join_trimmed(&section.preamble);
        if !preamble.is_empty() {
            let classification = section_class.unwrap_or(FALLBACK);
            chunks.push(make_chunk(
                format!("{}\n\n{}", section.title, preamble),
                &section.title,
                None,
                classification,
            ));
        }

        for (sub_title, lines) in &section.subsections {
            let body = join_trimmed(lines);
            if body.is_empty() {
                continue;
            }
            let classification = classify_title(sub_title)
                .or(section_class)
                .unwrap_or(FALLBACK);
            chunks.push(make_chunk(
                format!("{}: {}\n\n{}", section.title, sub_title, body),
                &section.title,
                Some(sub_title),
                classification,
            ));
        }
    }

    chunks
}

fn is_skipped(title: &str, options: &NotesOptions) -> bool {
    if title.is_empty() || title.contains("---") {
        return true;
    }
    match &options.owner_name {
        Some(owner) if !owner.is_empty() => title.starts_with(owner.as_str()),
        _ => false,
    }
}

fn join_trimmed(lines: &[String]) -> String {
    lines.join("\n").trim().to_string()
}

fn make_chunk(
    content: String,
    section: &str,
    title: Option<&str>,
    classification: Classification,
) -> KnowledgeChunk {
    let mut metadata = ChunkMetadata::new(NOTES_SOURCE, classification.chunk_type);
    metadata.section = Some(section.to_string());
    metadata.title = title.map(str::to_string);
    metadata.topics = classification.topics.iter().map(|t| t.to_string()).collect();
    KnowledgeChunk { content, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> NotesOptions {
        NotesOptions::default()
    }

    #[test]
    fn test_one_section_two_subsections_with_preamble() {
        let doc = "# Jane Doe\n\nIntro that is never indexed.\n\n\
                   ## Hobbies & Interests\n\nI keep busy.\n\n\
                   ### Board Games\nCatan every Friday.\n\n\
                   ### Woodworking\nBuilt a dining table.\n";
        let chunks = parse_notes(doc, &opts());
        assert_eq!(chunks.len(), 3);

        assert_eq!(chunks[0].content, "Hobbies & Interests\n\nI keep busy.");
        assert_eq!(chunks[0].metadata.title, None);

        assert_eq!(
            chunks[1].content,
            "Hobbies & Interests: Board Games\n\nCatan every Friday."
        );
        assert_eq!(chunks[1].metadata.title.as_deref(), Some("Board Games"));
        assert_eq!(chunks[1].metadata.chunk_type, ChunkType::Hobbies);
        assert_eq!(chunks[1].metadata.topics, vec!["games"]);

        // "Woodworking" is unmapped and inherits the parent section's class.
        assert_eq!(chunks[2].metadata.chunk_type, ChunkType::Hobbies);
        assert_eq!(chunks[2].metadata.topics, vec!["hobbies"]);
        for c in &chunks {
            assert_eq!(c.metadata.source, NOTES_SOURCE);
            assert_eq!(c.metadata.section.as_deref(), Some("Hobbies & Interests"));
        }
    }

    #[test]
    fn test_subsections_without_preamble() {
        let doc = "## Misc\n### First\none\n### Second\ntwo\n";
        let chunks = parse_notes(doc, &opts());
        assert_eq!(chunks.len(), 2);
        for c in &chunks {
            assert_eq!(c.metadata.chunk_type, FALLBACK.chunk_type);
            assert_eq!(c.metadata.topics, vec!["general"]);
        }
    }

    #[test]
    fn test_unmapped_section_gets_fallback() {
        let chunks = parse_notes("## Odds and Ends\nSomething.\n", &opts());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.chunk_type, ChunkType::Personal);
        assert_eq!(chunks[0].metadata.topics, vec!["general"]);
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        let c = classify_title("MY FAMILY").unwrap();
        assert_eq!(c.chunk_type, ChunkType::Family);
        let c = classify_title("Daily Routine").unwrap();
        assert_eq!(c.chunk_type, ChunkType::Preferences);
        assert!(classify_title("Unrelated").is_none());
    }

    #[test]
    fn test_empty_sections_dropped() {
        let doc = "## Values\n\n\n## Family\n### Kids\n\n### Pets\nA dog named Rex.\n";
        let chunks = parse_notes(doc, &opts());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.title.as_deref(), Some("Pets"));
        assert_eq!(chunks[0].metadata.chunk_type, ChunkType::Family);
    }

    #[test]
    fn test_intro_and_owner_sections_skipped() {
        let doc = "# Jane Doe\nIntro.\n### Stray\nnot in a section\n\
                   ## Jane Doe - Personal Notes\nheader block\n\
                   ## --- \nrule\n\
                   ## Values\nHonesty.\n";
        let options = NotesOptions {
            owner_name: Some("Jane Doe".to_string()),
        };
        let chunks = parse_notes(doc, &options);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Values\n\nHonesty.");
    }

    #[test]
    fn test_deeper_headings_stay_in_body() {
        let doc = "## Travel\n### Japan\n#### Kyoto\nTemples.\n";
        let chunks = parse_notes(doc, &opts());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("#### Kyoto\nTemples."));
    }

    #[test]
    fn test_deterministic() {
        let doc = "## Family\nA.\n### Kids\nB.\n## Values\nC.\n";
        let a = parse_notes(doc, &opts());
        let b = parse_notes(doc, &opts());
        assert_eq!(a, b);
    }
}
