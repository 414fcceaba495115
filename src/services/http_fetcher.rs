use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, COOKIE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
    USER_AGENT,
};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{AppError, FetchError, Result};
use crate::models::UserCookie;

const USER_AGENT_STRING: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Validators from a previous response, sent back to let the server answer 304.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalHeaders {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl ConditionalHeaders {
    pub fn new(etag: Option<String>, last_modified: Option<String>) -> Self {
        Self {
            etag,
            last_modified,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after following redirects.
    pub final_url: Url,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn etag(&self) -> Option<String> {
        self.header_str(ETAG)
    }

    pub fn last_modified(&self) -> Option<String> {
        self.header_str(LAST_MODIFIED)
    }

    pub fn content_type(&self) -> Option<String> {
        self.header_str(reqwest::header::CONTENT_TYPE)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn header_str(&self, name: reqwest::header::HeaderName) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched(FetchedPage),
    NotModified,
}

impl FetchOutcome {
    /// For callers that never send validators, a 304 is just another bad status.
    pub fn into_page(self) -> Result<FetchedPage> {
        match self {
            FetchOutcome::Fetched(page) => Ok(page),
            FetchOutcome::NotModified => Err(AppError::Fetch(FetchError::Unexpected {
                status: StatusCode::NOT_MODIFIED.as_u16(),
            })),
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &Url,
        cookies: &[UserCookie],
        conditional: &ConditionalHeaders,
    ) -> std::result::Result<FetchOutcome, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(FetchError::from)?;
        Ok(Self { client })
    }

    fn build_headers(cookies: &[UserCookie], conditional: &ConditionalHeaders) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));

        if let Some(cookie_header) = cookie_header(cookies) {
            if let Ok(value) = HeaderValue::from_str(&cookie_header) {
                headers.insert(COOKIE, value);
            }
        }

        if let Some(etag) = conditional.etag.as_deref().filter(|e| !e.is_empty()) {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert(IF_NONE_MATCH, value);
            }
        }

        if let Some(modified) = conditional.last_modified.as_deref().filter(|m| !m.is_empty()) {
            if let Ok(value) = HeaderValue::from_str(modified) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        headers
    }
}

/// `name=value; name=value`, or `None` when there is nothing to send.
pub fn cookie_header(cookies: &[UserCookie]) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &Url,
        cookies: &[UserCookie],
        conditional: &ConditionalHeaders,
    ) -> std::result::Result<FetchOutcome, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .headers(Self::build_headers(cookies, conditional))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            tracing::debug!(url = %url, "Not modified");
            return Ok(FetchOutcome::NotModified);
        }

        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Fetch failed");
            return Err(FetchError::from_status(status.as_u16(), url.as_str()));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(FetchOutcome::Fetched(FetchedPage {
            final_url,
            headers,
            body,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, value: &str) -> UserCookie {
        UserCookie {
            user_id: 1,
            domain: "example.com".to_string(),
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn cookie_header_joins_pairs() {
        assert_eq!(cookie_header(&[]), None);
        assert_eq!(
            cookie_header(&[cookie("session", "abc"), cookie("pref", "dark")]).as_deref(),
            Some("session=abc; pref=dark")
        );
    }

    #[test]
    fn empty_validators_are_not_sent() {
        let headers = HttpFetcher::build_headers(
            &[],
            &ConditionalHeaders::new(Some(String::new()), None),
        );
        assert!(headers.get(IF_NONE_MATCH).is_none());
        assert!(headers.get(IF_MODIFIED_SINCE).is_none());
        assert!(headers.get(COOKIE).is_none());

        let headers = HttpFetcher::build_headers(
            &[cookie("a", "1")],
            &ConditionalHeaders::new(
                Some("\"v1\"".to_string()),
                Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
            ),
        );
        assert_eq!(headers.get(IF_NONE_MATCH).unwrap(), "\"v1\"");
        assert_eq!(
            headers.get(IF_MODIFIED_SINCE).unwrap(),
            "Wed, 21 Oct 2015 07:28:00 GMT"
        );
        assert_eq!(headers.get(COOKIE).unwrap(), "a=1");
    }
}
