// src/ingest/feed.rs
//! RSS 2.0 and Atom parsing into a bounded, newest-first list of entries.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::normalize_text;

pub const DEFAULT_ENTRY_CAP: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub description: Option<String>,
    pub authors: Vec<String>,
}

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Text>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
    #[serde(rename = "dc:creator", default)]
    creators: Vec<String>,
}

// --- Atom ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    id: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<Text>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

/// Element text that may carry attributes (`<title type="html">`, `<guid isPermaLink="true">`).
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Parse an RSS or Atom document. Entries without a title or link are dropped;
/// a missing date falls back to `fetched_at`. Keeps the `cap` newest entries.
pub fn parse_feed(xml: &str, fetched_at: DateTime<Utc>, cap: usize) -> Result<Vec<FeedEntry>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);

    let mut entries = if is_atom(&xml_clean) {
        let feed: AtomFeed = from_str(&xml_clean).context("parsing atom xml")?;
        feed.entry
            .into_iter()
            .filter_map(|e| atom_entry(e, fetched_at))
            .collect::<Vec<_>>()
    } else if xml_clean.contains("<rss") || xml_clean.contains("<channel") {
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;
        rss.channel
            .item
            .into_iter()
            .filter_map(|it| rss_entry(it, fetched_at))
            .collect::<Vec<_>>()
    } else {
        bail!("document is neither RSS nor Atom");
    };

    // Stable sort keeps feed order among equal timestamps.
    entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    entries.truncate(cap);

    histogram!("pipeline_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(entries)
}

fn is_atom(xml: &str) -> bool {
    match (xml.find("<feed"), xml.find("<rss")) {
        (Some(f), Some(r)) => f < r,
        (Some(_), None) => true,
        _ => false,
    }
}

fn rss_entry(it: Item, fetched_at: DateTime<Utc>) -> Option<FeedEntry> {
    let title = clean_title(it.title.as_deref()?)?;
    let url = it
        .link
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .or_else(|| {
            it.guid
                .map(|g| g.value.trim().to_string())
                .filter(|g| g.starts_with("http"))
        })?;

    let mut authors: Vec<String> = it.creators.iter().map(|c| c.trim().to_string()).collect();
    if let Some(a) = it.author {
        authors.push(a.trim().to_string());
    }
    authors.retain(|a| !a.is_empty());
    authors.dedup();

    Some(FeedEntry {
        title,
        url,
        published_at: it
            .pub_date
            .as_deref()
            .and_then(parse_rfc2822)
            .unwrap_or(fetched_at),
        description: it
            .description
            .as_deref()
            .map(normalize_text)
            .filter(|d| !d.is_empty()),
        authors,
    })
}

fn atom_entry(e: AtomEntry, fetched_at: DateTime<Utc>) -> Option<FeedEntry> {
    let title = clean_title(&e.title?.value)?;
    let alternate = e
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
        .or_else(|| e.links.first())
        .and_then(|l| l.href.clone());
    let url = alternate
        .or_else(|| e.id.filter(|id| id.starts_with("http")))
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())?;

    let published_at = e
        .published
        .as_deref()
        .or(e.updated.as_deref())
        .and_then(parse_rfc3339)
        .unwrap_or(fetched_at);

    Some(FeedEntry {
        title,
        url,
        published_at,
        description: e
            .summary
            .map(|s| normalize_text(&s.value))
            .filter(|d| !d.is_empty()),
        authors: e
            .authors
            .into_iter()
            .filter_map(|a| a.name.map(|n| n.trim().to_string()))
            .filter(|n| !n.is_empty())
            .collect(),
    })
}

fn clean_title(raw: &str) -> Option<String> {
    let t = normalize_text(raw);
    (!t.is_empty()).then_some(t)
}

fn from_offset(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    // Legacy zone names are common in the wild; map them to a numeric offset.
    let ts = match ts.rsplit_once(' ') {
        Some((head, "GMT" | "UT" | "UTC" | "Z")) => format!("{head} +0000"),
        _ => ts.to_string(),
    };
    OffsetDateTime::parse(&ts, &Rfc2822)
        .ok()
        .and_then(from_offset)
}

fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .ok()
        .and_then(from_offset)
}

/// Feeds routinely carry HTML entities that XML does not define.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example</title>
    <item>
      <title>Older &amp; wiser</title>
      <link>https://example.com/older</link>
      <pubDate>Mon, 01 Sep 2025 08:00:00 GMT</pubDate>
      <dc:creator>Jane Roe</dc:creator>
    </item>
    <item>
      <title>Newer&nbsp;story</title>
      <link>https://example.com/newer</link>
      <pubDate>Tue, 02 Sep 2025 08:00:00 GMT</pubDate>
      <description>&lt;p&gt;Short teaser&lt;/p&gt;</description>
    </item>
    <item>
      <title>No link here</title>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom example</title>
  <entry>
    <title type="html">Atom entry</title>
    <link rel="alternate" href="https://example.org/a"/>
    <id>urn:uuid:1</id>
    <updated>2025-09-03T10:00:00Z</updated>
    <author><name>John Doe</name></author>
    <summary>Summary text</summary>
  </entry>
</feed>"#;

    fn fetched() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn rss_items_newest_first_and_linkless_dropped() {
        let out = parse_feed(RSS, fetched(), DEFAULT_ENTRY_CAP).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "https://example.com/newer");
        assert_eq!(out[0].title, "Newer story");
        assert_eq!(out[0].description.as_deref(), Some("Short teaser"));
        assert_eq!(out[1].title, "Older & wiser");
        assert_eq!(out[1].authors, vec!["Jane Roe".to_string()]);
    }

    #[test]
    fn atom_entries_parse() {
        let out = parse_feed(ATOM, fetched(), DEFAULT_ENTRY_CAP).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "https://example.org/a");
        assert_eq!(
            out[0].published_at,
            Utc.with_ymd_and_hms(2025, 9, 3, 10, 0, 0).unwrap()
        );
        assert_eq!(out[0].authors, vec!["John Doe".to_string()]);
    }

    #[test]
    fn missing_date_defaults_to_fetch_time_and_cap_applies() {
        let mut xml = String::from("<rss><channel>");
        for i in 0..30 {
            xml.push_str(&format!(
                "<item><title>T{i}</title><link>https://e.com/{i}</link></item>"
            ));
        }
        xml.push_str("</channel></rss>");
        let out = parse_feed(&xml, fetched(), DEFAULT_ENTRY_CAP).unwrap();
        assert_eq!(out.len(), 20);
        assert!(out.iter().all(|e| e.published_at == fetched()));
        assert_eq!(out[0].url, "https://e.com/0");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_feed("<html><body>nope</body></html>", fetched(), 20).is_err());
    }
}
