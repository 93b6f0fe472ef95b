// src/analyze/similarity.rs
use anyhow::bail;
use async_trait::async_trait;

use crate::analyze::truncate_chars;

/// Advisory similarity between two texts, 0..=100. Callers fall back to a
/// default score on error.
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    async fn score(&self, a: &str, b: &str) -> anyhow::Result<u8>;
}

/// Bigram (Sørensen-Dice) similarity on lowercased, whitespace-collapsed text.
#[derive(Debug, Clone, Copy)]
pub struct LexicalSimilarity {
    pub char_limit: usize,
}

impl Default for LexicalSimilarity {
    fn default() -> Self {
        Self { char_limit: 8_000 }
    }
}

#[async_trait]
impl SimilarityScorer for LexicalSimilarity {
    async fn score(&self, a: &str, b: &str) -> anyhow::Result<u8> {
        let a = prepare(a, self.char_limit);
        let b = prepare(b, self.char_limit);
        if a.is_empty() || b.is_empty() {
            bail!("similarity needs two non-empty texts");
        }
        let dice = strsim::sorensen_dice(&a, &b);
        Ok((dice * 100.0).round().clamp(0.0, 100.0) as u8)
    }
}

fn prepare(s: &str, limit: usize) -> String {
    let (head, _) = truncate_chars(s, limit);
    head.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
