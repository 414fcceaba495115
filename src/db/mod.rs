mod repository;
mod schema;
pub mod storage;

pub use repository::{format_datetime, Repository};
pub use storage::FileStore;
