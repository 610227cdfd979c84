// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::backlog::BacklogLimit;
use crate::feed::FeedEntry;

/// Why an entry is not being downloaded this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A history record exists for this entry
    AlreadyDownloaded,
    /// Outside the backlog window: intentionally not fetched
    BacklogLimit,
    /// Entry has no enclosure URL
    Malformed,
}

/// One concrete step of a sync plan
#[derive(Debug, Clone)]
pub enum Action {
    Download(FeedEntry),
    Skip { entry: FeedEntry, reason: SkipReason },
}

/// Merge feed entries, download history and the backlog limit into an ordered
/// action list.
///
/// Pure: identical inputs always yield the identical list, which is what makes
/// repeated runs idempotent. Download actions come first, oldest eligible
/// entry leading, so a backlog catch-up proceeds chronologically; skip actions
/// follow in no guaranteed order.
pub fn reconcile(
    entries: Vec<FeedEntry>,
    downloaded: &HashSet<String>,
    limit: BacklogLimit,
) -> Vec<Action> {
    // Feeds occasionally list the same enclosure twice; keep the first
    // occurrence in feed order.
    let mut seen = HashSet::new();
    let mut deduped: Vec<FeedEntry> = entries
        .into_iter()
        .filter(|entry| seen.insert(entry.id.clone()))
        .collect();

    // Newest first. Undated entries sort after all dated ones and the sort is
    // stable, so they stay in feed-supplied order among themselves.
    deduped.sort_by(|a, b| match (&a.published_at, &b.published_at) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let window = limit.window(deduped.len());

    let mut downloads = Vec::new();
    let mut skips = Vec::new();

    for (index, entry) in deduped.into_iter().enumerate() {
        if downloaded.contains(&entry.id) {
            skips.push(Action::Skip {
                entry,
                reason: SkipReason::AlreadyDownloaded,
            });
        } else if index >= window {
            skips.push(Action::Skip {
                entry,
                reason: SkipReason::BacklogLimit,
            });
        } else if entry.enclosure.is_none() {
            skips.push(Action::Skip {
                entry,
                reason: SkipReason::Malformed,
            });
        } else {
            downloads.push(entry);
        }
    }

    // Oldest eligible entry downloads first.
    downloads.reverse();

    let mut actions: Vec<Action> = downloads.into_iter().map(Action::Download).collect();
    actions.extend(skips);
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset};

    fn dated_entry(id: &str, rfc3339: &str) -> FeedEntry {
        FeedEntry {
            id: id.to_string(),
            title: format!("Entry {}", id),
            enclosure: Some(crate::feed::Enclosure {
                url: url::Url::parse(&format!("https://example.com/{}.mp3", id)).unwrap(),
                length: None,
                mime_type: Some("audio/mpeg".to_string()),
            }),
            published_at: Some(DateTime::<FixedOffset>::parse_from_rfc3339(rfc3339).unwrap()),
        }
    }

    fn undated_entry(id: &str) -> FeedEntry {
        let mut entry = dated_entry(id, "2024-01-01T00:00:00+00:00");
        entry.published_at = None;
        entry
    }

    fn malformed_entry(id: &str) -> FeedEntry {
        let mut entry = dated_entry(id, "2024-06-01T00:00:00+00:00");
        entry.enclosure = None;
        entry
    }

    /// Ten entries, e10 newest down to e1 oldest.
    fn descending_feed() -> Vec<FeedEntry> {
        (1..=10)
            .rev()
            .map(|i| dated_entry(&format!("e{}", i), &format!("2024-01-{:02}T00:00:00+00:00", i)))
            .collect()
    }

    fn downloads(actions: &[Action]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Download(e) => Some(e.id.as_str()),
                _ => None,
            })
            .collect()
    }

    fn skips_with(actions: &[Action], reason: SkipReason) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Skip { entry, reason: r } if *r == reason => Some(entry.id.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn backlog_n_downloads_newest_n_oldest_first() {
        let actions = reconcile(descending_feed(), &HashSet::new(), BacklogLimit::Finite(3));

        assert_eq!(downloads(&actions), vec!["e8", "e9", "e10"]);
        assert_eq!(skips_with(&actions, SkipReason::BacklogLimit).len(), 7);
    }

    #[test]
    fn backlog_zero_downloads_nothing_even_on_first_sync() {
        let actions = reconcile(descending_feed(), &HashSet::new(), BacklogLimit::Finite(0));

        assert!(downloads(&actions).is_empty());
        assert_eq!(skips_with(&actions, SkipReason::BacklogLimit).len(), 10);
    }

    #[test]
    fn unbounded_downloads_everything_chronologically() {
        let actions = reconcile(descending_feed(), &HashSet::new(), BacklogLimit::Unbounded);

        assert_eq!(
            downloads(&actions),
            vec!["e1", "e2", "e3", "e4", "e5", "e6", "e7", "e8", "e9", "e10"]
        );
    }

    #[test]
    fn history_inside_window_does_not_extend_it() {
        let mut history = HashSet::new();
        history.insert("e10".to_string());

        let actions = reconcile(descending_feed(), &history, BacklogLimit::Finite(3));

        // The window is the 3 newest entries regardless of history; e10's
        // slot is not handed down to e7.
        assert_eq!(downloads(&actions), vec!["e8", "e9"]);
        assert_eq!(
            skips_with(&actions, SkipReason::AlreadyDownloaded),
            vec!["e10"]
        );
        assert_eq!(skips_with(&actions, SkipReason::BacklogLimit).len(), 7);
    }

    #[test]
    fn history_outside_window_is_reported_as_already_downloaded() {
        let mut history = HashSet::new();
        history.insert("e1".to_string());

        let actions = reconcile(descending_feed(), &history, BacklogLimit::Finite(2));

        assert_eq!(
            skips_with(&actions, SkipReason::AlreadyDownloaded),
            vec!["e1"]
        );
        assert_eq!(skips_with(&actions, SkipReason::BacklogLimit).len(), 7);
    }

    #[test]
    fn duplicate_entry_ids_collapse_to_one_action() {
        let mut entries = descending_feed();
        entries.push(dated_entry("e10", "2024-01-10T00:00:00+00:00"));

        let actions = reconcile(entries, &HashSet::new(), BacklogLimit::Unbounded);

        assert_eq!(actions.len(), 10);
        assert_eq!(downloads(&actions).iter().filter(|id| **id == "e10").count(), 1);
    }

    #[test]
    fn malformed_entries_are_skipped_not_downloaded() {
        let entries = vec![
            malformed_entry("broken"),
            dated_entry("ok", "2024-05-01T00:00:00+00:00"),
        ];

        let actions = reconcile(entries, &HashSet::new(), BacklogLimit::Unbounded);

        assert_eq!(downloads(&actions), vec!["ok"]);
        assert_eq!(skips_with(&actions, SkipReason::Malformed), vec!["broken"]);
    }

    #[test]
    fn undated_entries_sort_older_than_dated_in_feed_order() {
        let entries = vec![
            undated_entry("u1"),
            dated_entry("d1", "2024-01-05T00:00:00+00:00"),
            undated_entry("u2"),
            dated_entry("d2", "2024-01-09T00:00:00+00:00"),
        ];

        let actions = reconcile(entries, &HashSet::new(), BacklogLimit::Unbounded);

        // Oldest first: undated entries come before dated ones, preserving
        // their relative feed order.
        assert_eq!(downloads(&actions), vec!["u2", "u1", "d1", "d2"]);
    }

    #[test]
    fn identical_inputs_yield_identical_action_lists() {
        let history: HashSet<String> = ["e3".to_string(), "e7".to_string()].into();

        let first = reconcile(descending_feed(), &history, BacklogLimit::Finite(5));
        let second = reconcile(descending_feed(), &history, BacklogLimit::Finite(5));

        assert_eq!(downloads(&first), downloads(&second));
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn empty_feed_yields_no_actions() {
        let actions = reconcile(Vec::new(), &HashSet::new(), BacklogLimit::Unbounded);
        assert!(actions.is_empty());
    }
}
