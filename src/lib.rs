pub mod backlog;
pub mod config;
pub mod download;
pub mod error;
pub mod feed;
pub mod filename;
pub mod history;
pub mod http;
pub mod progress;
pub mod reconcile;
pub mod subscription;
pub mod sync;

// Re-export main types for convenience
pub use backlog::BacklogLimit;
pub use config::Config;
pub use error::{ConfigError, DownloadError, FeedError, HistoryError, SyncError};
pub use feed::{Enclosure, Feed, FeedEntry, FetchedFeed, fetch_feed, parse_feed};
pub use history::{DownloadRecord, HistoryStore};
pub use http::{FetchedBytes, HttpClient, HttpResponse, ReqwestClient};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use reconcile::{Action, SkipReason, reconcile};
pub use subscription::{DirectorySpec, Subscription};
pub use sync::{SyncFailure, SyncResult, Syncer};
