// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::download::{DownloadContext, clean_partial_files, download_enclosure};
use crate::error::{ConfigError, SyncError};
use crate::feed::{FetchedFeed, fetch_feed};
use crate::filename::{resolve_filename, resolve_unique_path};
use crate::history::{DownloadRecord, HistoryStore};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::reconcile::{Action, SkipReason, reconcile};
use crate::subscription::Subscription;

/// One failed step of a subscription sync
#[derive(Debug, Clone)]
pub struct SyncFailure {
    /// Entry title, or the subscription name for feed-level failures
    pub subject: String,
    pub reason: String,
}

/// Per-subscription outcome of a sync run. Transient, never persisted.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub downloaded: usize,
    pub skipped_already_downloaded: usize,
    pub skipped_backlog_limit: usize,
    pub skipped_malformed: usize,
    pub failed: usize,
    pub failures: Vec<SyncFailure>,
    /// Set when the feed URL permanently redirected; the configuration still
    /// works but points at a stale address
    pub feed_moved_to: Option<String>,
}

impl SyncResult {
    /// Result representing a subscription whose sync could not start or
    /// finish (feed unreachable, bad directory).
    fn from_error(subscription: &str, reason: String) -> Self {
        Self {
            failed: 1,
            failures: vec![SyncFailure {
                subject: subscription.to_string(),
                reason,
            }],
            ..Self::default()
        }
    }

    /// Total entries skipped for any reason
    pub fn skipped(&self) -> usize {
        self.skipped_already_downloaded + self.skipped_backlog_limit + self.skipped_malformed
    }
}

/// Drives subscription synchronization: fetch, reconcile, download, commit.
///
/// Holds a per-subscription lock so two concurrent syncs of the same
/// subscription cannot race past each other's history checks; different
/// subscriptions proceed independently.
pub struct Syncer<C: HttpClient> {
    config: Config,
    client: C,
    history: HistoryStore,
    reporter: SharedProgressReporter,
    locks: HashMap<String, Arc<Mutex<()>>>,
}

impl<C: HttpClient> Syncer<C> {
    /// Create a syncer for a loaded configuration, opening the history store.
    pub fn new(
        config: Config,
        client: C,
        reporter: SharedProgressReporter,
    ) -> Result<Self, SyncError> {
        let history = HistoryStore::open(&config.history_directory)?;

        let locks = config
            .subscriptions
            .iter()
            .map(|s| (s.name.clone(), Arc::new(Mutex::new(()))))
            .collect();

        Ok(Self {
            config,
            client,
            history,
            reporter,
            locks,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Synchronize a single subscription by name.
    pub async fn sync(&self, name: &str) -> Result<SyncResult, SyncError> {
        let subscription = self
            .config
            .subscription(name)
            .ok_or_else(|| ConfigError::UnknownSubscription(name.to_string()))?;

        let lock = self
            .locks
            .get(name)
            .ok_or_else(|| ConfigError::UnknownSubscription(name.to_string()))?
            .clone();
        let _guard = lock.lock().await;

        self.sync_subscription(subscription).await
    }

    /// Synchronize every configured subscription.
    ///
    /// Per-subscription failures (unreachable feed, unusable directory) are
    /// folded into that subscription's [`SyncResult`]; only history storage
    /// failures abort the run, since continuing without durable history risks
    /// duplicate downloads.
    pub async fn sync_all(&self) -> Result<BTreeMap<String, SyncResult>, SyncError> {
        let mut results = BTreeMap::new();

        for subscription in &self.config.subscriptions {
            let name = subscription.name.clone();
            match self.sync(&name).await {
                Ok(result) => {
                    results.insert(name, result);
                }
                Err(SyncError::History(e)) => return Err(SyncError::History(e)),
                Err(e) => {
                    warn!(subscription = %name, error = %e, "subscription sync failed");
                    results.insert(name.clone(), SyncResult::from_error(&name, e.to_string()));
                }
            }
        }

        Ok(results)
    }

    async fn sync_subscription(&self, sub: &Subscription) -> Result<SyncResult, SyncError> {
        let directory = sub.resolve_directory(&self.config.directory)?;

        self.reporter.report(ProgressEvent::FetchingFeed {
            subscription: sub.name.clone(),
            url: sub.url.to_string(),
        });
        info!(subscription = %sub.name, url = %sub.url, "fetching feed");

        let FetchedFeed { feed, moved_to } = fetch_feed(&self.client, &sub.url).await?;
        let mut history = self.history.load(&sub.name)?;

        let actions = reconcile(feed.entries, &history.downloaded_ids(), sub.backlog_limit);

        let mut result = SyncResult::default();
        if let Some(moved) = moved_to {
            warn!(
                subscription = %sub.name,
                moved_to = %moved,
                "feed URL redirected, configuration points at a stale address"
            );
            result.feed_moved_to = Some(moved);
        }
        let mut to_download = Vec::new();
        let total_entries = actions.len();

        for action in actions {
            match action {
                Action::Download(entry) => to_download.push(entry),
                Action::Skip { entry, reason } => match reason {
                    SkipReason::AlreadyDownloaded => result.skipped_already_downloaded += 1,
                    SkipReason::BacklogLimit => result.skipped_backlog_limit += 1,
                    SkipReason::Malformed => {
                        warn!(
                            subscription = %sub.name,
                            entry = %entry.title,
                            "entry has no enclosure, skipping"
                        );
                        result.skipped_malformed += 1;
                    }
                },
            }
        }

        self.reporter.report(ProgressEvent::PlanReady {
            subscription: sub.name.clone(),
            feed_title: feed.title.clone(),
            total_entries,
            to_download: to_download.len(),
            already_downloaded: result.skipped_already_downloaded,
            backlog_limited: result.skipped_backlog_limit,
            malformed: result.skipped_malformed,
        });

        // Interrupted runs may have left partial files behind; sweep them
        // even when nothing is due, since the interrupted entry may have
        // fallen out of the backlog window by now.
        let cleaned = clean_partial_files(&directory);
        if cleaned > 0 {
            self.reporter.report(ProgressEvent::PartialFilesCleanedUp {
                subscription: sub.name.clone(),
                count: cleaned,
            });
        }

        if !to_download.is_empty() {
            std::fs::create_dir_all(&directory).map_err(|e| SyncError::CreateDirectoryFailed {
                path: directory.clone(),
                source: e,
            })?;

            let total_to_download = to_download.len();
            for (entry_index, entry) in to_download.into_iter().enumerate() {
                // The reconciler only emits Download for entries with an enclosure.
                let Some(enclosure) = entry.enclosure.clone() else {
                    continue;
                };

                let filename = resolve_filename(&entry, &enclosure, sub.use_title_as_filename);
                let final_path = resolve_unique_path(&directory, &filename);

                let context = DownloadContext {
                    subscription: sub.name.clone(),
                    entry_title: entry.title.clone(),
                    entry_index,
                    total_to_download,
                };

                match download_enclosure(
                    &self.client,
                    &enclosure.url,
                    &final_path,
                    &context,
                    &self.reporter,
                )
                .await
                {
                    Ok(outcome) => {
                        // Commit only after the file sits under its final name.
                        history.record(DownloadRecord {
                            entry_id: entry.id.clone(),
                            title: entry.title.clone(),
                            downloaded_at: Utc::now(),
                            final_path: final_path.clone(),
                            content_hash: Some(outcome.content_hash),
                        })?;
                        result.downloaded += 1;
                    }
                    Err(e) => {
                        warn!(
                            subscription = %sub.name,
                            entry = %entry.title,
                            error = %e,
                            "download failed, continuing with remaining entries"
                        );
                        self.reporter.report(ProgressEvent::DownloadFailed {
                            entry_title: entry.title.clone(),
                            error: e.to_string(),
                        });
                        result.failed += 1;
                        result.failures.push(SyncFailure {
                            subject: entry.title.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            subscription = %sub.name,
            downloaded = result.downloaded,
            skipped = result.skipped(),
            failed = result.failed,
            "subscription sync finished"
        );
        self.reporter.report(ProgressEvent::SubscriptionCompleted {
            subscription: sub.name.clone(),
            downloaded: result.downloaded,
            skipped: result.skipped(),
            failed: result.failed,
        });

        Ok(result)
    }
}
