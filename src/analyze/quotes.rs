// src/analyze/quotes.rs
use once_cell::sync::Lazy;
use regex::Regex;

const MIN_QUOTE_CHARS: usize = 10;

static RE_CURLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\u{201C}([^\u{201C}\u{201D}]+)\u{201D}").expect("curly quote regex")
});

/// Quoted passages (10+ chars between double quotes) in document order,
/// deduplicated, at most `max`.
pub fn extract_quotes(text: &str, max: usize) -> Vec<String> {
    let mut spans = straight_quoted(text);
    spans.extend(
        RE_CURLY
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| (m.start(), m.as_str())),
    );
    spans.sort_by_key(|(start, _)| *start);

    let mut out: Vec<String> = Vec::new();
    for (_, raw) in spans {
        if out.len() >= max {
            break;
        }
        let q = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if q.chars().count() >= MIN_QUOTE_CHARS && !out.contains(&q) {
            out.push(q);
        }
    }
    out
}

/// Straight quotes pair up in order: 1st opens, 2nd closes, and so on.
/// An unmatched trailing quote is ignored.
fn straight_quoted(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut open: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        if ch != '"' {
            continue;
        }
        match open.take() {
            None => open = Some(i + 1),
            Some(start) => out.push((start, &text[start..i])),
        }
    }
    out
}
