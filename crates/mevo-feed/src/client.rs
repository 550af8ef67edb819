//! HTTP client for the Mevo public feeds.
//!
//! One GET per feed type per cycle, no retries. The request timeout is set on
//! the underlying `reqwest` client so every request carries it.

use std::time::Duration;

use mevo_types::FeedType;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::error::{ClientError, FetchError};

/// Raw body of a successful feed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    /// The feed the payload belongs to.
    pub feed: FeedType,
    /// The URL that was fetched.
    pub url: String,
    /// The response body.
    pub body: String,
}

/// Client that fetches feed payloads.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    base_url: Url,
}

impl FeedClient {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] if `base_url` does not parse
    /// as a hierarchical URL, or [`ClientError::Build`] if the HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url).map_err(|e| ClientError::InvalidBaseUrl {
            url: base_url.to_owned(),
            message: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl {
                url: base_url.to_owned(),
                message: "URL cannot carry path segments".to_owned(),
            });
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// Build the URL of `feed` for `area`.
    ///
    /// The area is appended as a single percent-encoded path segment, so
    /// `"Wellington"` yields `{base}/vehicles/Wellington`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] for a blank area.
    pub fn feed_url(&self, feed: FeedType, area: &str) -> Result<Url, FetchError> {
        let area = area.trim();
        if area.is_empty() {
            return Err(FetchError::InvalidUrl {
                message: "area must not be empty".to_owned(),
            });
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FetchError::InvalidUrl {
                message: format!("{} cannot carry path segments", self.base_url),
            })?
            .pop_if_empty()
            .push(feed.path_segment())
            .push(area);
        Ok(url)
    }

    /// Fetch the raw payload of `feed` for `area`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Transport`] on connection failure or timeout
    /// - [`FetchError::Http`] on a non-2xx status
    /// - [`FetchError::EmptyBody`] when the body is empty or whitespace
    /// - [`FetchError::InvalidUrl`] when the URL cannot be built
    pub async fn fetch(&self, feed: FeedType, area: &str) -> Result<RawPayload, FetchError> {
        let url = self.feed_url(feed, area)?;
        let url_text = url.to_string();
        debug!(feed = %feed, url = url_text, "fetching feed");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&url_text, &e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(feed = %feed, url = url_text, status = status.as_u16(), "feed request failed");
            return Err(FetchError::Http {
                url: url_text,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&url_text, &e))?;

        if body.trim().is_empty() {
            warn!(feed = %feed, url = url_text, "feed returned an empty body");
            return Err(FetchError::EmptyBody { url: url_text });
        }

        info!(feed = %feed, url = url_text, bytes = body.len(), "feed fetched");
        Ok(RawPayload {
            feed,
            url: url_text,
            body,
        })
    }
}

fn transport_error(url: &str, error: &reqwest::Error) -> FetchError {
    let message = if error.is_timeout() {
        format!("request timed out: {error}")
    } else {
        error.to_string()
    };
    FetchError::Transport {
        url: url.to_owned(),
        message,
    }
}
