// src/ingest/mod.rs
pub mod feed;
pub mod slug;

use once_cell::sync::Lazy;
use regex::Regex;

pub use feed::{parse_feed, FeedEntry};
pub use slug::{base36, slugify};

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Single-line normalization for feed titles and teasers:
/// decode entities, strip tags, straighten typographic quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // Decode first: feeds often double-escape markup inside <description>.
    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    let decoded = html_escape::decode_html_entities(&stripped);

    let straightened = decoded
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");

    RE_WS.replace_all(&straightened, " ").trim().to_string()
}
