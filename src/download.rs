use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Suffix for in-flight downloads; the final name only ever holds a complete file.
const PARTIAL_SUFFIX: &str = ".partial";

/// Position of one download within a subscription's run, for progress output
#[derive(Debug, Clone)]
pub struct DownloadContext {
    pub subscription: String,
    pub entry_title: String,
    pub entry_index: usize,
    pub total_to_download: usize,
}

/// Result of a completed download
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub bytes_downloaded: u64,
    /// Hex SHA-256 of the downloaded bytes
    pub content_hash: String,
}

fn partial_path(final_path: &Path) -> PathBuf {
    let mut os: OsString = final_path.as_os_str().to_owned();
    os.push(PARTIAL_SUFFIX);
    PathBuf::from(os)
}

/// Download an enclosure to `final_path`.
///
/// Streams the body to `<final_path>.partial`, hashing as it goes, and only
/// renames into place once the full body is flushed. On any failure the
/// partial file is removed, so an interrupted download never leaves a corrupt
/// file under the final name.
pub async fn download_enclosure<C: HttpClient>(
    client: &C,
    url: &url::Url,
    final_path: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<DownloadOutcome, DownloadError> {
    let partial = partial_path(final_path);

    let result = stream_to_partial(client, url, final_path, &partial, context, reporter).await;

    if result.is_err()
        && let Err(e) = tokio::fs::remove_file(&partial).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %partial.display(), error = %e, "failed to remove partial file");
    }

    result
}

async fn stream_to_partial<C: HttpClient>(
    client: &C,
    url: &url::Url,
    final_path: &Path,
    partial: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<DownloadOutcome, DownloadError> {
    let response = client
        .get_stream(url.as_str())
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        subscription: context.subscription.clone(),
        entry_title: context.entry_title.clone(),
        entry_index: context.entry_index,
        total_to_download: context.total_to_download,
        content_length: response.content_length,
    });

    let mut file = File::create(partial)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: partial.to_path_buf(),
            source: e,
        })?;

    let mut hasher = Sha256::new();
    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: partial.to_path_buf(),
                source: e,
            })?;

        hasher.update(&chunk);
        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            entry_title: context.entry_title.clone(),
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: partial.to_path_buf(),
            source: e,
        })?;
    drop(file);

    tokio::fs::rename(partial, final_path)
        .await
        .map_err(|e| DownloadError::FinalizeFailed {
            path: final_path.to_path_buf(),
            source: e,
        })?;

    let content_hash = format!("{:x}", hasher.finalize());
    debug!(path = %final_path.display(), bytes = bytes_downloaded, "download finalized");

    reporter.report(ProgressEvent::DownloadCompleted {
        entry_title: context.entry_title.clone(),
        bytes_downloaded,
    });

    Ok(DownloadOutcome {
        bytes_downloaded,
        content_hash,
    })
}

/// Remove stale `.partial` files left by an interrupted run.
///
/// Returns how many were removed. Errors here are non-fatal; the files will
/// simply be retried next time.
pub fn clean_partial_files(directory: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(directory) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_partial = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX));

        if is_partial && std::fs::remove_file(&path).is_ok() {
            debug!(path = %path.display(), "removed stale partial file");
            removed += 1;
        }
    }

    removed
}
