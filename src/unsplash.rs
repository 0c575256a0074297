use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use url::Url;

pub const UNSPLASH_API_BASE: &str = "https://api.unsplash.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub access_key: String,
    pub user_agent: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub urls: PhotoUrls,
    #[serde(default)]
    pub alt_description: Option<String>,
}

impl Photo {
    pub fn alt_text(&self) -> &str {
        self.alt_description.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoUrls {
    pub small: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<Photo>,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("unsplash: request failed with status {0}")]
    Status(reqwest::StatusCode),
    #[error("unsplash: malformed response: {0}")]
    Payload(#[source] reqwest::Error),
}

pub struct Client {
    http: HttpClient,
    access_key: String,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.access_key.trim().is_empty() {
            bail!("unsplash client access key required");
        }
        if config.user_agent.trim().is_empty() {
            bail!("unsplash client user agent required");
        }
        let mut base = config
            .base_url
            .unwrap_or_else(|| UNSPLASH_API_BASE.to_string());
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).with_context(|| format!("unsplash: invalid base url {base}"))?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(DEFAULT_TIMEOUT))
                .build()
                .context("unsplash: build http client")?,
        };

        Ok(Client {
            http,
            access_key: config.access_key,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn search_url(&self, query: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join("search/photos")
            .context("unsplash: build search url")?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("client_id", &self.access_key);
        Ok(url)
    }

    /// One page of search results. Any failure discards the whole response.
    pub fn search_photos(&self, query: &str) -> Result<Vec<Photo>> {
        let url = self.search_url(query)?;
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .context("unsplash: send search request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status).into());
        }

        let payload: SearchResponse = response.json().map_err(SearchError::Payload)?;
        Ok(payload.results)
    }
}
