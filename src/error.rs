use thiserror::Error;

/// Failure of an outbound GET against a user-supplied URL.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("the requested URL was not found: {url}")]
    NotFound { url: String },

    #[error("client error: HTTP {status}")]
    ClientError { status: u16 },

    #[error("server error: HTTP {status}")]
    ServerError { status: u16 },

    #[error("unexpected status code: HTTP {status}")]
    Unexpected { status: u16 },

    #[error("connection failed: {0}")]
    Connection(String),
}

impl FetchError {
    /// Classify a non-2xx, non-304 status.
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            404 => FetchError::NotFound {
                url: url.to_string(),
            },
            400..=499 => FetchError::ClientError { status },
            500..=599 => FetchError::ServerError { status },
            _ => FetchError::Unexpected { status },
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            FetchError::NotFound { .. } => 404,
            FetchError::ClientError { .. } => 400,
            FetchError::ServerError { .. }
            | FetchError::Unexpected { .. }
            | FetchError::Connection(_) => 502,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Connection(format!("request timed out: {}", err))
        } else {
            FetchError::Connection(err.to_string())
        }
    }
}

/// Failure inside an archiver, summarizer or tagger job.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("empty input text")]
    EmptyInput,

    #[error("API request failed with status code {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("unexpected response format: {0}")]
    MalformedResponse(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),

    #[error("failed to parse feed: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),

    #[error("failed to parse URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Status code the HTTP layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Input(_) | AppError::Feed(_) | AppError::Url(_) => 400,
            AppError::Forbidden(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Fetch(err) => err.status_code(),
            AppError::Enrichment(EnrichmentError::EmptyInput) => 400,
            AppError::Enrichment(_) => 502,
            AppError::Database(_)
            | AppError::Sqlite(_)
            | AppError::Io(_)
            | AppError::Json(_)
            | AppError::TomlDe(_)
            | AppError::Config(_) => 500,
        }
    }
}

impl AppError {
    /// True when a write was rejected by a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        let sqlite = match self {
            AppError::Database(tokio_rusqlite::Error::Rusqlite(e)) | AppError::Sqlite(e) => e,
            _ => return false,
        };
        matches!(
            sqlite,
            rusqlite::Error::SqliteFailure(err, _)
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_status_classification() {
        assert!(matches!(
            FetchError::from_status(404, "https://a.test"),
            FetchError::NotFound { .. }
        ));
        assert!(matches!(
            FetchError::from_status(403, "https://a.test"),
            FetchError::ClientError { status: 403 }
        ));
        assert!(matches!(
            FetchError::from_status(503, "https://a.test"),
            FetchError::ServerError { status: 503 }
        ));
        assert!(matches!(
            FetchError::from_status(302, "https://a.test"),
            FetchError::Unexpected { status: 302 }
        ));
    }

    #[test]
    fn empty_enrichment_input_is_a_client_error() {
        assert_eq!(AppError::from(EnrichmentError::EmptyInput).status_code(), 400);
        assert_eq!(
            AppError::from(EnrichmentError::Upstream {
                status: 500,
                body: String::new()
            })
            .status_code(),
            502
        );
    }

    #[test]
    fn app_error_status_codes() {
        assert_eq!(AppError::Input("missing url".into()).status_code(), 400);
        assert_eq!(AppError::NotFound("link".into()).status_code(), 404);
        assert_eq!(
            AppError::from(FetchError::ClientError { status: 401 }).status_code(),
            400
        );
        assert_eq!(
            AppError::from(FetchError::ServerError { status: 500 }).status_code(),
            502
        );
        assert_eq!(
            AppError::from(FetchError::NotFound {
                url: "https://a.test".into()
            })
            .status_code(),
            404
        );
    }
}
