// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{Feed, parse_feed};

/// A parsed feed plus where it actually came from.
pub struct FetchedFeed {
    pub feed: Feed,
    /// Set when the server redirected away from the configured URL; the
    /// subscription keeps working, but the configuration deserves an update.
    pub moved_to: Option<String>,
}

/// Fetch and parse a feed. `file://` URLs are read from the local
/// filesystem, everything else goes through the HTTP client.
pub async fn fetch_feed<C: HttpClient>(client: &C, url: &Url) -> Result<FetchedFeed, FeedError> {
    if url.scheme() == "file" {
        let path = url
            .to_file_path()
            .map_err(|_| FeedError::InvalidUrl(url::ParseError::RelativeUrlWithoutBase))?;
        return Ok(FetchedFeed {
            feed: parse_feed_file(&path)?,
            moved_to: None,
        });
    }

    let fetched = client.get_bytes(url.as_str()).await.map_err(|e| {
        if e.status() == Some(reqwest::StatusCode::GONE) {
            FeedError::FeedGone {
                url: url.to_string(),
            }
        } else {
            FeedError::FetchFailed {
                url: url.to_string(),
                source: e,
            }
        }
    })?;

    Ok(FetchedFeed {
        feed: parse_feed(&fetched.body)?,
        moved_to: fetched.final_url,
    })
}

/// Read raw feed bytes from a local file (without parsing)
pub fn read_feed_file(path: &Path) -> Result<Vec<u8>, FeedError> {
    std::fs::read(path).map_err(|e| FeedError::FileReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Parse a feed from a local file
pub fn parse_feed_file(path: &Path) -> Result<Feed, FeedError> {
    let bytes = read_feed_file(path)?;
    parse_feed(&bytes)
}
