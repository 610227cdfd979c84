// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::backlog::BacklogLimit;
use crate::error::ConfigError;
use crate::subscription::{DirectorySpec, Subscription};

/// History files live here unless the config says otherwise.
const DEFAULT_HISTORY_DIR: &str = ".podsync";

fn default_backlog_limit() -> BacklogLimit {
    BacklogLimit::Finite(1)
}

/// On-disk YAML shape: global defaults plus the subscription list.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    directory: PathBuf,
    #[serde(default = "default_backlog_limit")]
    backlog_limit: BacklogLimit,
    #[serde(default)]
    use_title_as_filename: bool,
    #[serde(default)]
    history_directory: Option<PathBuf>,
    #[serde(default)]
    subscriptions: Vec<RawSubscription>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSubscription {
    name: String,
    url: String,
    #[serde(default)]
    directory: Option<PathBuf>,
    #[serde(default)]
    backlog_limit: Option<BacklogLimit>,
    #[serde(default)]
    use_title_as_filename: Option<bool>,
}

/// Immutable configuration for a sync run, constructed once at startup.
///
/// Global defaults are already folded into each [`Subscription`], so the rest
/// of the crate never consults them.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory all default and relative subscription directories hang off
    pub directory: PathBuf,
    /// Where per-subscription history files are kept
    pub history_directory: PathBuf,
    pub subscriptions: Vec<Subscription>,
}

impl Config {
    /// Load and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "loading config file");
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let raw: RawConfig =
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        Self::from_raw(raw)
    }

    /// Parse config from a YAML string. `load` with the file reading lifted out.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseFailed {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut subscriptions = Vec::with_capacity(raw.subscriptions.len());

        for sub in raw.subscriptions {
            if sub.name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !seen.insert(sub.name.clone()) {
                return Err(ConfigError::DuplicateName(sub.name));
            }

            let url = Url::parse(&sub.url).map_err(|e| ConfigError::InvalidFeedUrl {
                name: sub.name.clone(),
                source: e,
            })?;

            subscriptions.push(Subscription {
                name: sub.name,
                url,
                directory: DirectorySpec::from_override(sub.directory),
                backlog_limit: sub.backlog_limit.unwrap_or(raw.backlog_limit),
                use_title_as_filename: sub
                    .use_title_as_filename
                    .unwrap_or(raw.use_title_as_filename),
            });
        }

        debug!(count = subscriptions.len(), "configuration loaded");

        let history_directory = raw
            .history_directory
            .unwrap_or_else(|| raw.directory.join(DEFAULT_HISTORY_DIR));

        Ok(Config {
            directory: raw.directory,
            history_directory,
            subscriptions,
        })
    }

    /// Look up a subscription by name.
    pub fn subscription(&self, name: &str) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| s.name == name)
    }
}
