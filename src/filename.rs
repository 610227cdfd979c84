use std::path::{Path, PathBuf};

use crate::feed::{Enclosure, FeedEntry};

/// Cap on the stem portion of a generated filename
const MAX_NAME_LENGTH: usize = 100;

fn is_valid_filename_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ')
}

/// Sanitize an arbitrary string into a filesystem-safe name using a
/// whitelist: path separators, control characters and anything else outside
/// the whitelist become dashes, runs of separators collapse, length is capped.
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if is_valid_filename_char(c) { c } else { '-' })
        .collect();

    let collapsed = collapse_separators(&sanitized);
    let trimmed = collapsed.trim_matches(|c: char| c == '-' || c.is_whitespace());

    if trimmed.len() > MAX_NAME_LENGTH {
        truncate_at_boundary(trimmed, MAX_NAME_LENGTH)
    } else {
        trimmed.to_string()
    }
}

/// Derive the on-disk filename for an entry's enclosure.
///
/// With `use_title_as_filename` the sanitized entry title plus an inferred
/// media extension is used; otherwise the enclosure URL's trailing path
/// segment. Either way the result is a bare filename, never a path.
pub fn resolve_filename(entry: &FeedEntry, enclosure: &Enclosure, use_title: bool) -> String {
    if use_title {
        let stem = sanitize_name(&entry.title);
        let stem = if stem.is_empty() { entry.id.clone() } else { stem };
        return format!("{}.{}", stem, media_extension(enclosure));
    }

    match trailing_segment(enclosure) {
        Some(segment) => segment,
        // URLs like "https://cdn.example.com/" carry no usable segment.
        None => format!("{}.{}", sanitize_name(&entry.id), media_extension(enclosure)),
    }
}

/// Pick a path under `directory` that does not collide with an existing file.
///
/// The reconciler has already filtered out entries recorded in history, so an
/// existing file under the candidate name belongs to a different entry; a
/// numeric suffix keeps both.
pub fn resolve_unique_path(directory: &Path, filename: &str) -> PathBuf {
    let candidate = directory.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = split_extension(filename);
    for n in 1.. {
        let disambiguated = match ext {
            Some(ext) => directory.join(format!("{}-{}.{}", stem, n, ext)),
            None => directory.join(format!("{}-{}", stem, n)),
        };
        if !disambiguated.exists() {
            return disambiguated;
        }
    }
    unreachable!("suffix search is unbounded");
}

/// Media file extension for an enclosure, from URL path or MIME type,
/// defaulting to "mp3"
pub fn media_extension(enclosure: &Enclosure) -> String {
    if let Some(ext) = enclosure
        .url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|filename| filename.rsplit('.').next())
        .filter(|ext| is_known_media_extension(ext))
    {
        return ext.to_lowercase();
    }

    if let Some(ref mime) = enclosure.mime_type
        && let Some(ext) = mime_to_extension(mime)
    {
        return ext.to_string();
    }

    "mp3".to_string()
}

/// Last path segment of the enclosure URL, sanitized but with its own
/// extension preserved
fn trailing_segment(enclosure: &Enclosure) -> Option<String> {
    let segment = enclosure
        .url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())?;

    let (stem, ext) = split_extension(segment);
    let stem = sanitize_name(stem);
    if stem.is_empty() {
        return None;
    }

    Some(match ext {
        Some(ext) => format!("{}.{}", stem, ext.to_lowercase()),
        None => stem,
    })
}

fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    }
}

/// Runs of whitespace and dashes become a single dash.
fn collapse_separators(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last_was_separator = false;

    for c in s.chars() {
        if c == '-' || c.is_whitespace() {
            if !last_was_separator {
                result.push('-');
                last_was_separator = true;
            }
        } else {
            result.push(c);
            last_was_separator = false;
        }
    }

    result
}

/// Cut at a dash boundary when one falls in the second half, so truncation
/// does not end mid-word.
fn truncate_at_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let truncated: String = s.chars().take(max_len).collect();
    if let Some(pos) = truncated.rfind('-')
        && pos > max_len / 2
    {
        return truncated[..pos].to_string();
    }

    truncated.trim_end_matches('-').to_string()
}

fn is_known_media_extension(ext: &str) -> bool {
    matches!(
        ext.to_lowercase().as_str(),
        "mp3" | "m4a" | "mp4" | "aac" | "ogg" | "opus" | "wav" | "flac"
    )
}

fn mime_to_extension(mime: &str) -> Option<&'static str> {
    match mime.to_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "audio/ogg" => Some("ogg"),
        "audio/opus" => Some("opus"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn make_entry(title: &str, url: &str, mime: Option<&str>) -> (FeedEntry, Enclosure) {
        let enclosure = Enclosure {
            url: Url::parse(url).unwrap(),
            length: None,
            mime_type: mime.map(String::from),
        };
        let entry = FeedEntry {
            id: "test-id".to_string(),
            title: title.to_string(),
            enclosure: Some(enclosure.clone()),
            published_at: None,
        };
        (entry, enclosure)
    }

    // === Sanitization ===

    #[test]
    fn sanitize_preserves_alphanumeric() {
        assert_eq!(sanitize_name("Hello123World"), "Hello123World");
    }

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize_name("a:b/c\\d"), "a-b-c-d");
    }

    #[test]
    fn sanitize_collapses_separator_runs() {
        assert_eq!(sanitize_name("a:::b///c"), "a-b-c");
        assert_eq!(sanitize_name("a - - - b"), "a-b");
    }

    #[test]
    fn sanitize_trims_leading_trailing_separators() {
        assert_eq!(sanitize_name("  --hello--  "), "hello");
    }

    #[test]
    fn sanitize_replaces_control_characters() {
        assert_eq!(sanitize_name("tab\there"), "tab-here");
        assert_eq!(sanitize_name("null\0byte"), "null-byte");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "word-".repeat(50);
        let sanitized = sanitize_name(&long);
        assert!(sanitized.len() <= MAX_NAME_LENGTH);
    }

    // === Title-based filenames ===

    #[test]
    fn title_filename_uses_sanitized_title_and_url_extension() {
        let (entry, enclosure) =
            make_entry("Episode 42: The Answer", "https://example.com/ep42.mp3", None);
        assert_eq!(
            resolve_filename(&entry, &enclosure, true),
            "Episode-42-The-Answer.mp3"
        );
    }

    #[test]
    fn title_filename_falls_back_to_mime_extension() {
        let (entry, enclosure) = make_entry(
            "Episode",
            "https://example.com/stream?id=9",
            Some("audio/ogg"),
        );
        assert_eq!(resolve_filename(&entry, &enclosure, true), "Episode.ogg");
    }

    #[test]
    fn unsanitizable_title_falls_back_to_entry_id() {
        let (entry, enclosure) = make_entry(":::///", "https://example.com/x.mp3", None);
        assert_eq!(resolve_filename(&entry, &enclosure, true), "test-id.mp3");
    }

    // === URL-based filenames ===

    #[test]
    fn url_filename_uses_trailing_segment() {
        let (entry, enclosure) =
            make_entry("Whatever", "https://example.com/feeds/episode-042.mp3", None);
        assert_eq!(resolve_filename(&entry, &enclosure, false), "episode-042.mp3");
    }

    #[test]
    fn url_filename_sanitizes_odd_segments() {
        let (entry, enclosure) =
            make_entry("Whatever", "https://example.com/ep%2042.mp3", None);
        let filename = resolve_filename(&entry, &enclosure, false);
        assert!(filename.ends_with(".mp3"));
        assert!(!filename.contains('/'));
    }

    #[test]
    fn url_without_segment_falls_back_to_entry_id() {
        let (entry, enclosure) = make_entry("Whatever", "https://example.com/", Some("audio/mpeg"));
        assert_eq!(resolve_filename(&entry, &enclosure, false), "test-id.mp3");
    }

    // === Extension inference ===

    #[test]
    fn extension_prefers_url_path() {
        let (_, enclosure) = make_entry("T", "https://example.com/ep.OGG", Some("audio/mpeg"));
        assert_eq!(media_extension(&enclosure), "ogg");
    }

    #[test]
    fn extension_defaults_to_mp3() {
        let (_, enclosure) = make_entry("T", "https://example.com/stream", None);
        assert_eq!(media_extension(&enclosure), "mp3");
    }

    // === Collision handling ===

    #[test]
    fn unique_path_returns_candidate_when_free() {
        let dir = tempfile::tempdir().unwrap();
        let path = resolve_unique_path(dir.path(), "ep.mp3");
        assert_eq!(path, dir.path().join("ep.mp3"));
    }

    #[test]
    fn unique_path_appends_numeric_suffix_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ep.mp3"), b"existing").unwrap();

        let path = resolve_unique_path(dir.path(), "ep.mp3");
        assert_eq!(path, dir.path().join("ep-1.mp3"));
    }

    #[test]
    fn unique_path_skips_taken_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ep.mp3"), b"a").unwrap();
        std::fs::write(dir.path().join("ep-1.mp3"), b"b").unwrap();
        std::fs::write(dir.path().join("ep-2.mp3"), b"c").unwrap();

        let path = resolve_unique_path(dir.path(), "ep.mp3");
        assert_eq!(path, dir.path().join("ep-3.mp3"));
    }

    #[test]
    fn unique_path_handles_extensionless_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("episode"), b"a").unwrap();

        let path = resolve_unique_path(dir.path(), "episode");
        assert_eq!(path, dir.path().join("episode-1"));
    }
}
