// src/ingest/slug.rs
//! URL-safe slugs: lowercase hyphenated title (max 100 chars) plus a base-36
//! suffix taken from the creation time, so equal titles still get distinct slugs.

use chrono::{DateTime, Utc};

pub const MAX_SLUG_BASE_CHARS: usize = 100;

/// Lowercase ASCII alphanumerics joined by single hyphens, at most 100 chars.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len().min(MAX_SLUG_BASE_CHARS));
    let mut pending_hyphen = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
        if out.len() >= MAX_SLUG_BASE_CHARS {
            break;
        }
    }
    out.truncate(MAX_SLUG_BASE_CHARS);
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("article");
    }
    out
}

pub fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

/// `slugify(title)` + `-` + base-36 of the creation time in milliseconds.
/// `bump` separates candidates created within the same millisecond.
pub fn slug_candidate(title: &str, at: DateTime<Utc>, bump: u32) -> String {
    let millis = u64::try_from(at.timestamp_millis()).unwrap_or_default();
    let suffix = base36(millis + u64::from(bump));
    format!("{}-{}", slugify(title), suffix)
}
