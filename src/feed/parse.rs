// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::FeedError;

/// A retrieved feed: title plus its entries in feed-supplied order.
#[derive(Debug, Clone)]
pub struct Feed {
    pub title: String,
    pub entries: Vec<FeedEntry>,
}

/// One item from a retrieved feed.
///
/// Transient: rebuilt from the feed on every sync, never persisted. Entries
/// whose item had no enclosure keep `enclosure = None` so the reconciler can
/// report them instead of silently dropping them.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    /// Feed-provided GUID if present, else a deterministic content-derived id
    pub id: String,
    pub title: String,
    pub enclosure: Option<Enclosure>,
    /// Entries without a date are unorderable and keep feed-supplied order
    pub published_at: Option<DateTime<FixedOffset>>,
}

/// The media file attached to an entry
#[derive(Debug, Clone)]
pub struct Enclosure {
    pub url: Url,
    pub length: Option<u64>,
    pub mime_type: Option<String>,
}

/// Parse RSS feed XML bytes into a [`Feed`].
pub fn parse_feed(xml_bytes: &[u8]) -> Result<Feed, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;

    let entries = channel.items().iter().map(parse_entry).collect();

    Ok(Feed {
        title: decode_title(channel.title()),
        entries,
    })
}

fn parse_entry(item: &rss::Item) -> FeedEntry {
    let title = item
        .title()
        .map(decode_title)
        .unwrap_or_else(|| "Untitled Entry".to_string());

    let enclosure = item.enclosure().and_then(|enc| {
        Url::parse(enc.url()).ok().map(|url| Enclosure {
            url,
            length: enc.length().parse().ok(),
            mime_type: Some(enc.mime_type().to_string()).filter(|s| !s.is_empty()),
        })
    });

    let published_at = item.pub_date().and_then(|date_str| {
        DateTime::parse_from_rfc2822(date_str)
            .or_else(|_| parse_relaxed_date(date_str))
            .ok()
    });

    let id = item
        .guid()
        .map(|g| g.value().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback_entry_id(enclosure.as_ref().map(|e| &e.url), &title));

    FeedEntry {
        id,
        title,
        enclosure,
        published_at,
    }
}

/// Titles frequently arrive entity-encoded ("Q&amp;A"); decode for display
/// and for title-based filenames.
fn decode_title(raw: &str) -> String {
    html_escape::decode_html_entities(raw.trim()).into_owned()
}

/// Deterministic id for entries without a GUID, derived from the enclosure
/// URL and title so the same item maps to the same id on every sync.
fn fallback_entry_id(enclosure_url: Option<&Url>, title: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(url) = enclosure_url {
        hasher.update(url.as_str().as_bytes());
    }
    hasher.update(b"\n");
    hasher.update(title.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    for format in formats {
        if let Ok(dt) = DateTime::parse_from_str(date_str, format) {
            return Ok(dt);
        }
    }

    Err(chrono::DateTime::parse_from_rfc2822("invalid").unwrap_err())
}
