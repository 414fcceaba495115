mod fetcher;
mod poller;

pub use fetcher::{find_feed_link, FeedFetcher, FeedLoad, LoadedFeed};
pub(crate) use poller::parse_user_url;
pub use poller::{FeedPoller, PollSummary, RefreshOutcome};
