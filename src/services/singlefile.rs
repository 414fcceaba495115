//! Offline archives through a single-file snapshot service.
//!
//! The service receives the link's URL (plus the owner's cookies for that
//! host) and answers with one self-contained HTML document, which is stored
//! as an attachment on the link.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use tracing::{error, info};
use url::Url;

use crate::db::{FileStore, Repository};
use crate::error::{AppError, EnrichmentError, FetchError, Result};
use crate::models::{EnrichmentOutcome, RecordId, SkipReason, UserCookie};

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 10;

#[async_trait]
pub trait Archiver: Send + Sync {
    async fn maybe_archive(&self, link_id: RecordId) -> Result<EnrichmentOutcome>;
}

pub struct SingleFileArchiver {
    client: Client,
    repository: Repository,
    files: FileStore,
    service_url: Option<String>,
}

impl SingleFileArchiver {
    pub fn new(
        repository: Repository,
        files: FileStore,
        service_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::from)?;
        Ok(Self {
            client,
            repository,
            files,
            service_url: service_url.filter(|u| !u.trim().is_empty()),
        })
    }

    async fn cookies_json(&self, user_id: RecordId, url: &str) -> Result<Option<String>> {
        let parsed = Url::parse(url)?;
        let host = parsed.host_str().unwrap_or_default();
        let cookies = self.repository.get_user_cookies(user_id, host).await?;
        if cookies.is_empty() {
            return Ok(None);
        }
        Ok(Some(cookies_to_json(&cookies)?))
    }
}

/// `["name,value,domain", ...]`, the format the snapshot service expects.
pub fn cookies_to_json(cookies: &[UserCookie]) -> Result<String> {
    let entries: Vec<String> = cookies
        .iter()
        .map(|c| format!("{},{},{}", c.name, c.value, c.domain))
        .collect();
    Ok(serde_json::to_string(&entries)?)
}

fn archive_file_key() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();
    format!("archive_{}.html", suffix)
}

#[async_trait]
impl Archiver for SingleFileArchiver {
    async fn maybe_archive(&self, link_id: RecordId) -> Result<EnrichmentOutcome> {
        let Some(link) = self.repository.get_link(link_id).await? else {
            return Err(AppError::NotFound(format!("link {}", link_id)));
        };

        if link.has_archive() {
            info!(link_id, "Link already archived, skipping");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::AlreadyDone));
        }

        let Some(service_url) = self.service_url.as_deref() else {
            info!(link_id, "SINGLEFILE_URL not set, skipping archive creation");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::NotConfigured));
        };

        if link.original_url.is_empty() {
            error!(link_id, "Link has no original_url");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::MissingUrl));
        }

        let file_key = archive_file_key();
        if self.files.exists(link_id, &file_key).await.unwrap_or(true) {
            info!(link_id, file = %file_key, "Skipping archive creation, file already exists");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::FileExists));
        }

        let cookies = match self.cookies_json(link.user_id, &link.original_url).await {
            Ok(json) => json,
            Err(e) => {
                error!(link_id, error = %e, "Failed to get user cookies, continuing without them");
                None
            }
        };

        let mut form = vec![("url", link.original_url.clone())];
        if let Some(cookies) = cookies {
            form.push(("cookies", cookies));
        }

        let response = self
            .client
            .post(service_url)
            .form(&form)
            .send()
            .await
            .map_err(EnrichmentError::from)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Upstream {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body = response.bytes().await.map_err(EnrichmentError::from)?;
        if body.is_empty() {
            return Err(EnrichmentError::MalformedResponse(
                "received empty response from singlefile service".to_string(),
            )
            .into());
        }

        self.files.put(link_id, &file_key, &body).await?;

        let key = file_key.clone();
        self.repository
            .update_link(link_id, move |link| link.archive = Some(key))
            .await?;

        info!(link_id, file = %file_key, bytes = body.len(), "Successfully created archive for link");
        Ok(EnrichmentOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_json_uses_name_value_domain_triples() {
        let cookies = vec![
            UserCookie {
                user_id: 1,
                domain: "example.com".to_string(),
                name: "session".to_string(),
                value: "abc".to_string(),
            },
            UserCookie {
                user_id: 1,
                domain: "example.com".to_string(),
                name: "theme".to_string(),
                value: "dark".to_string(),
            },
        ];
        assert_eq!(
            cookies_to_json(&cookies).unwrap(),
            r#"["session,abc,example.com","theme,dark,example.com"]"#
        );
        assert_eq!(cookies_to_json(&[]).unwrap(), "[]");
    }

    #[test]
    fn file_keys_are_random_and_well_formed() {
        let a = archive_file_key();
        let b = archive_file_key();
        assert_ne!(a, b);
        assert!(a.starts_with("archive_") && a.ends_with(".html"));
        let suffix = &a["archive_".len()..a.len() - ".html".len()];
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
