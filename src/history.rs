// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::HistoryError;
use crate::filename::sanitize_name;

/// One successfully completed download.
///
/// Presence of a record means the entry is permanently satisfied and is never
/// downloaded again, even if the media file is later deleted by the user:
/// history, not filesystem presence, is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub entry_id: String,
    pub title: String,
    pub downloaded_at: DateTime<Utc>,
    pub final_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// Durable download history, one JSON file per subscription.
///
/// Separate files keep concurrent syncs of different subscriptions from
/// touching each other's records. Writes go through a temp file and an atomic
/// rename, so a crash mid-commit leaves the previous file intact.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    directory: PathBuf,
}

impl HistoryStore {
    /// Open (creating if necessary) a history store rooted at `directory`.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| HistoryError::CreateDirectoryFailed {
            path: directory.clone(),
            source: e,
        })?;
        Ok(Self { directory })
    }

    fn file_for(&self, subscription: &str) -> PathBuf {
        let sanitized = sanitize_name(subscription);

        // Distinct names can sanitize to the same string ("a/b" and "a:b"
        // both become "a-b"). Whenever sanitization changed the name, a short
        // hash of the raw name keeps such subscriptions on separate files.
        let filename = if sanitized == subscription {
            format!("{}.json", sanitized)
        } else {
            let digest = format!("{:x}", Sha256::digest(subscription.as_bytes()));
            format!("{}-{}.json", sanitized, &digest[..8])
        };

        self.directory.join(filename)
    }

    /// Load one subscription's history. A missing file is an empty history.
    pub fn load(&self, subscription: &str) -> Result<SubscriptionHistory, HistoryError> {
        let path = self.file_for(subscription);

        let records = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let records: Vec<DownloadRecord> = serde_json::from_str(&contents)
                    .map_err(|e| HistoryError::JsonParseFailed {
                        path: path.clone(),
                        source: e,
                    })?;
                records.into_iter().map(|r| (r.entry_id.clone(), r)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(HistoryError::ReadFailed {
                    path,
                    source: e,
                });
            }
        };

        debug!(subscription, records = records.len(), "loaded history");

        Ok(SubscriptionHistory { path, records })
    }
}

/// In-memory view of one subscription's records, at most one per entry id.
#[derive(Debug)]
pub struct SubscriptionHistory {
    path: PathBuf,
    records: BTreeMap<String, DownloadRecord>,
}

impl SubscriptionHistory {
    /// Whether an entry has already been downloaded.
    pub fn has(&self, entry_id: &str) -> bool {
        self.records.contains_key(entry_id)
    }

    /// Ids of all downloaded entries, for the reconciler.
    pub fn downloaded_ids(&self) -> HashSet<String> {
        self.records.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert a record and durably commit the file.
    ///
    /// Call only after the downloaded file has been renamed to its final
    /// path; committing first would mark an undownloaded entry as done if the
    /// process dies in between.
    pub fn record(&mut self, record: DownloadRecord) -> Result<(), HistoryError> {
        self.records.insert(record.entry_id.clone(), record);
        self.save()
    }

    fn save(&self) -> Result<(), HistoryError> {
        let records: Vec<&DownloadRecord> = self.records.values().collect();
        let json = serde_json::to_string_pretty(&records)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| HistoryError::WriteFailed {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| HistoryError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })
    }
}
