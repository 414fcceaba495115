//! Read-it-later ingestion: feed polling, article extraction and background
//! enrichment (archives, summaries, tag suggestions) of saved links.

pub mod ai;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod pipeline;
pub mod services;

pub use app::{App, Capabilities};
pub use config::Config;
pub use error::{AppError, Result};
