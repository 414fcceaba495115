mod enrichment;
mod feed;
mod link;
mod user;

pub use enrichment::{EnrichmentOutcome, SkipReason};
pub use feed::{Feed, FeedItem, NewFeed, NewFeedItem};
pub use link::{Link, NewLink};
pub use user::{ApiKey, Tag, UserCookie, UserSettings};

/// Row identifier shared by every table.
pub type RecordId = i64;
