// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use url::Url;

use crate::backlog::BacklogLimit;
use crate::error::ConfigError;

/// Where a subscription's downloads go, decided once at config load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorySpec {
    /// No override: `<global directory>/<subscription name>`
    Default,
    /// Absolute override, used verbatim
    Absolute(PathBuf),
    /// Relative override, joined onto the global directory
    Relative(PathBuf),
}

impl DirectorySpec {
    /// Classify an optional user-provided override into an explicit decision.
    pub fn from_override(dir: Option<PathBuf>) -> Self {
        match dir {
            None => DirectorySpec::Default,
            Some(path) if path.is_absolute() => DirectorySpec::Absolute(path),
            Some(path) => DirectorySpec::Relative(path),
        }
    }
}

/// A named feed subscription, immutable for the duration of a sync run.
///
/// Built from configuration at startup with global defaults already merged in;
/// never persisted.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub name: String,
    pub url: Url,
    pub directory: DirectorySpec,
    pub backlog_limit: BacklogLimit,
    pub use_title_as_filename: bool,
}

impl Subscription {
    /// Compute the absolute download directory for this subscription.
    ///
    /// Performs no filesystem operations; the orchestrator creates the
    /// directory right before the first write.
    pub fn resolve_directory(&self, global_directory: &Path) -> Result<PathBuf, ConfigError> {
        let resolved = match &self.directory {
            DirectorySpec::Default => global_directory.join(&self.name),
            DirectorySpec::Absolute(path) => path.clone(),
            DirectorySpec::Relative(path) => global_directory.join(path),
        };

        if resolved.as_os_str().is_empty() {
            return Err(ConfigError::InvalidDirectory {
                name: self.name.clone(),
                reason: "resolved path is empty".to_string(),
            });
        }

        // A path without a parent is a filesystem root.
        if resolved.parent().is_none() {
            return Err(ConfigError::InvalidDirectory {
                name: self.name.clone(),
                reason: format!("resolved path '{}' is a filesystem root", resolved.display()),
            });
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_subscription(directory: DirectorySpec) -> Subscription {
        Subscription {
            name: "testcast".to_string(),
            url: Url::parse("https://example.com/feed.xml").unwrap(),
            directory,
            backlog_limit: BacklogLimit::Unbounded,
            use_title_as_filename: false,
        }
    }

    #[test]
    fn default_appends_name_to_global_directory() {
        let sub = make_subscription(DirectorySpec::Default);
        let dir = sub.resolve_directory(Path::new("/data")).unwrap();
        assert_eq!(dir, PathBuf::from("/data/testcast"));
    }

    #[test]
    fn relative_override_joins_global_directory() {
        let sub = make_subscription(DirectorySpec::from_override(Some(PathBuf::from("foo/bar"))));
        let dir = sub.resolve_directory(Path::new("/data")).unwrap();
        assert_eq!(dir, PathBuf::from("/data/foo/bar"));
    }

    #[test]
    fn absolute_override_ignores_global_directory() {
        let sub = make_subscription(DirectorySpec::from_override(Some(PathBuf::from("/foo/bar"))));
        let dir = sub.resolve_directory(Path::new("/data")).unwrap();
        assert_eq!(dir, PathBuf::from("/foo/bar"));
    }

    #[test]
    fn from_override_classifies_paths() {
        assert_eq!(DirectorySpec::from_override(None), DirectorySpec::Default);
        assert_eq!(
            DirectorySpec::from_override(Some(PathBuf::from("/abs"))),
            DirectorySpec::Absolute(PathBuf::from("/abs"))
        );
        assert_eq!(
            DirectorySpec::from_override(Some(PathBuf::from("rel"))),
            DirectorySpec::Relative(PathBuf::from("rel"))
        );
    }

    #[test]
    fn root_directory_is_rejected() {
        let sub = make_subscription(DirectorySpec::Absolute(PathBuf::from("/")));
        let result = sub.resolve_directory(Path::new("/data"));
        assert!(matches!(result, Err(ConfigError::InvalidDirectory { .. })));
    }

    #[test]
    fn empty_directory_is_rejected() {
        let sub = make_subscription(DirectorySpec::Relative(PathBuf::new()));
        // Joining an empty relative path yields the global directory itself,
        // which is non-empty, so force the degenerate case directly.
        let result = sub.resolve_directory(Path::new(""));
        assert!(matches!(result, Err(ConfigError::InvalidDirectory { .. })));
    }
}
