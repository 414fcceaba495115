mod article;
mod http_fetcher;
mod link_saver;
mod singlefile;

pub use article::{read_time, ArticleExtractor, ExtractedArticle, ReadabilityExtractor};
pub use http_fetcher::{
    cookie_header, ConditionalHeaders, FetchOutcome, FetchedPage, Fetcher, HttpFetcher,
};
pub use link_saver::LinkSaver;
pub use singlefile::{cookies_to_json, Archiver, SingleFileArchiver};
