mod fetch;
mod parse;

pub use fetch::{FetchedFeed, fetch_feed, parse_feed_file, read_feed_file};
pub use parse::{Enclosure, Feed, FeedEntry, parse_feed};
