// src/html.rs
//! Markup-to-text extraction for article pages.
//!
//! Order of operations:
//! 1) drop script/style/noscript blocks and comments
//! 2) try semantic content containers in priority order, longest match wins
//! 3) otherwise take the body minus navigation, header, footer, sidebar and ad regions
//! 4) convert to plain text: breaks become newlines, entities decoded, whitespace collapsed

use once_cell::sync::Lazy;
use regex::Regex;

static RE_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<noscript\b[^>]*>.*?</noscript\s*>|<!--.*?-->")
        .expect("noise regex")
});

/// Any start or end tag; group 1 is the slash, group 2 the tag name.
static RE_ANY_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(/?)([a-z][a-z0-9]*)\b[^>]*?(/?)>").expect("tag regex"));

/// Content containers in priority order. Group 1 is the tag name.
static CONTENT_SELECTORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)<(article)\b[^>]*>",
        r#"(?i)<([a-z][a-z0-9]*)\b[^>]*\brole\s*=\s*["']main["'][^>]*>"#,
        r"(?i)<(main)\b[^>]*>",
        r#"(?i)<([a-z][a-z0-9]*)\b[^>]*\b(?:class|id)\s*=\s*["'][^"']*\b(?:article-body|article-content|article__body|entry-content|post-content|post-body|story-body|story-content)\b[^"']*["'][^>]*>"#,
        r#"(?i)<([a-z][a-z0-9]*)\b[^>]*\b(?:class|id)\s*=\s*["'](?:[^"']*\s)?content(?:\s[^"']*)?["'][^>]*>"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("content selector regex"))
    .collect()
});

/// Regions removed in the body fallback. Group 1 is the tag name.
static BOILERPLATE_SELECTORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)<(nav|header|footer|aside|form)\b[^>]*>",
        r#"(?i)<([a-z][a-z0-9]*)\b[^>]*\brole\s*=\s*["'](?:navigation|banner|contentinfo|complementary)["'][^>]*>"#,
        r#"(?i)<([a-z][a-z0-9]*)\b[^>]*\b(?:class|id)\s*=\s*["'][^"']*\b(?:sidebar|side-bar|nav|menu|advert|advertisement|ad|ads|ad-slot|banner|promo|cookie|newsletter|share|social|related|comments?)\b[^"']*["'][^>]*>"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("boilerplate selector regex"))
    .collect()
});

static RE_BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<(body)\b[^>]*>").expect("body regex"));

static RE_LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("br regex"));
static RE_BLOCK_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</(?:p|div|section|h[1-6]|li|blockquote|pre|tr|table|ul|ol|figure)\s*>|<(?:p|h[1-6]|li|blockquote)\b[^>]*>")
        .expect("block regex")
});
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("strip regex"));
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\x0B\x0C\r\u{00A0}]+").expect("space regex"));
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("blank regex"));

static RE_EVENT_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).expect("event attr regex")
});
static RE_JS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(href|src)\s*=\s*(["'])\s*javascript:[^"']*(["'])"#).expect("js url regex")
});
static RE_DANGEROUS_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(iframe|object|embed)\b[^>]*>.*?</(iframe|object|embed)\s*>|<(iframe|object|embed|link|meta)\b[^>]*/?>")
        .expect("dangerous block regex")
});

/// Full pipeline: markup in, plain article text out (possibly empty).
pub fn extract_text(html: &str) -> String {
    let cleaned = RE_NOISE.replace_all(html, "");

    if let Some(text) = extract_from_containers(&cleaned) {
        return text;
    }

    let body = element_spans(&cleaned, &RE_BODY)
        .into_iter()
        .next()
        .map(|(_, inner, _)| &cleaned[inner.0..inner.1])
        .unwrap_or(&*cleaned);

    let mut stripped = body.to_string();
    for sel in BOILERPLATE_SELECTORS.iter() {
        stripped = remove_elements(&stripped, sel);
    }
    to_plain_text(&stripped)
}

/// Walk the selectors in priority order; the first one with any non-empty
/// match returns its longest match.
fn extract_from_containers(html: &str) -> Option<String> {
    for sel in CONTENT_SELECTORS.iter() {
        let best = element_spans(html, sel)
            .into_iter()
            .map(|(_, inner, _)| to_plain_text(&html[inner.0..inner.1]))
            .filter(|t| !t.is_empty())
            .max_by_key(|t| t.chars().count());
        if best.is_some() {
            return best;
        }
    }
    None
}

type Span = (usize, usize);

/// For every opening tag matched by `open`, return (outer span, inner span, tag name).
/// The closing tag is found by counting nested tags of the same name; an
/// unclosed element runs to the end of the document.
fn element_spans(html: &str, open: &Regex) -> Vec<(Span, Span, String)> {
    let mut out = Vec::new();
    for caps in open.captures_iter(html) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let tag = name.as_str().to_ascii_lowercase();
        if whole.as_str().ends_with("/>") {
            continue;
        }
        let inner_start = whole.end();
        let (inner_end, outer_end) =
            find_close(html, &tag, inner_start).unwrap_or((html.len(), html.len()));
        out.push(((whole.start(), outer_end), (inner_start, inner_end), tag));
    }
    out
}

/// Returns (start of closing tag, end of closing tag).
fn find_close(html: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    for caps in RE_ANY_TAG.captures_iter(&html[from..]) {
        let (Some(m), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if !name.as_str().eq_ignore_ascii_case(tag) {
            continue;
        }
        let closing = caps.get(1).is_some_and(|s| !s.as_str().is_empty());
        let self_closing = caps.get(3).is_some_and(|s| !s.as_str().is_empty());
        if closing {
            depth -= 1;
            if depth == 0 {
                return Some((from + m.start(), from + m.end()));
            }
        } else if !self_closing {
            depth += 1;
        }
    }
    None
}

/// Remove every element whose opening tag matches `open`, including its content.
fn remove_elements(html: &str, open: &Regex) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0usize;
    for ((start, end), _, _) in element_spans(html, open) {
        // Nested matches fall inside a span already removed.
        if start < cursor {
            continue;
        }
        out.push_str(&html[cursor..start]);
        cursor = end;
    }
    out.push_str(&html[cursor.min(html.len())..]);
    out
}

/// Strip remaining markup, keeping paragraph structure as newlines.
pub fn to_plain_text(fragment: &str) -> String {
    let s = RE_LINE_BREAK.replace_all(fragment, "\n");
    let s = RE_BLOCK_END.replace_all(&s, "\n\n");
    let s = RE_TAG.replace_all(&s, " ");
    let s = html_escape::decode_html_entities(&s);
    let s = RE_SPACES.replace_all(&s, " ");

    let lines: Vec<&str> = s.split('\n').map(str::trim).collect();
    let joined = lines.join("\n");
    RE_BLANK_LINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

/// Make a generated HTML fragment safe to render: no scripts, styles,
/// frames, event handlers or `javascript:` URLs.
pub fn sanitize_fragment(html: &str) -> String {
    let s = RE_NOISE.replace_all(html, "");
    let s = RE_DANGEROUS_BLOCK.replace_all(&s, "");
    let s = RE_EVENT_ATTR.replace_all(&s, "");
    RE_JS_URL.replace_all(&s, "$1=$2#$3").trim().to_string()
}
