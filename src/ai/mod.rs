mod providers;
mod summarizer;
mod tagger;

pub use providers::{ChatClient, Provider, ProviderUrls};
pub use summarizer::{LlmSummarizer, Summarizer};
pub use tagger::{LlmTagger, Tagger};
