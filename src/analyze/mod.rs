// src/analyze/mod.rs
//! External capabilities used by the humanize and fact-check stages, plus the
//! local quote extractor.

pub mod ai_adapter;
pub mod quotes;
pub mod similarity;

pub use ai_adapter::{
    build_capabilities, AiCapabilities, GeneratedContent, GenerationRequest, TextGenerator,
    Verifier,
};
pub use quotes::extract_quotes;
pub use similarity::{LexicalSimilarity, SimilarityScorer};

/// Cut `text` to at most `limit` chars on a char boundary. Returns the slice
/// and whether anything was dropped.
pub fn truncate_chars(text: &str, limit: usize) -> (&str, bool) {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
