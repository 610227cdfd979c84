use std::sync::Arc;

/// Events emitted during subscription synchronization for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A subscription's feed is being fetched
    FetchingFeed { subscription: String, url: String },

    /// Reconciliation finished; the plan for this subscription is known
    PlanReady {
        subscription: String,
        feed_title: String,
        total_entries: usize,
        to_download: usize,
        already_downloaded: usize,
        backlog_limited: usize,
        malformed: usize,
    },

    /// Stale partial files were cleaned up before downloading
    PartialFilesCleanedUp { subscription: String, count: usize },

    /// An entry's enclosure download is starting
    DownloadStarting {
        subscription: String,
        entry_title: String,
        /// Zero-based position in this subscription's download queue
        entry_index: usize,
        total_to_download: usize,
        /// Expected size in bytes, when the server announced one
        content_length: Option<u64>,
    },

    /// Bytes arrived for the entry currently downloading
    DownloadProgress {
        entry_title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// The entry's file has been renamed into place
    DownloadCompleted {
        entry_title: String,
        bytes_downloaded: u64,
    },

    /// A download failed; the run continues with the next entry
    DownloadFailed { entry_title: String, error: String },

    /// One subscription's sync finished
    SubscriptionCompleted {
        subscription: String,
        downloaded: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Sink for sync progress. The engine emits events and never prints; the
/// caller decides whether they become progress bars, log lines or nothing.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// Reporter that discards every event, for tests and quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reporter_accepts_every_event_shape() {
        let reporter = NoopReporter;

        reporter.report(ProgressEvent::FetchingFeed {
            subscription: "testcast".to_string(),
            url: "https://example.com/feed.xml".to_string(),
        });

        reporter.report(ProgressEvent::PlanReady {
            subscription: "testcast".to_string(),
            feed_title: "Test Podcast".to_string(),
            total_entries: 10,
            to_download: 3,
            already_downloaded: 5,
            backlog_limited: 2,
            malformed: 0,
        });

        reporter.report(ProgressEvent::PartialFilesCleanedUp {
            subscription: "testcast".to_string(),
            count: 1,
        });

        reporter.report(ProgressEvent::DownloadStarting {
            subscription: "testcast".to_string(),
            entry_title: "Entry 1".to_string(),
            entry_index: 0,
            total_to_download: 3,
            content_length: Some(1024),
        });

        reporter.report(ProgressEvent::DownloadProgress {
            entry_title: "Entry 1".to_string(),
            bytes_downloaded: 512,
            total_bytes: Some(1024),
        });

        reporter.report(ProgressEvent::DownloadCompleted {
            entry_title: "Entry 1".to_string(),
            bytes_downloaded: 1024,
        });

        reporter.report(ProgressEvent::DownloadFailed {
            entry_title: "Entry 2".to_string(),
            error: "Connection timeout".to_string(),
        });

        reporter.report(ProgressEvent::SubscriptionCompleted {
            subscription: "testcast".to_string(),
            downloaded: 2,
            skipped: 7,
            failed: 1,
        });
    }
}
