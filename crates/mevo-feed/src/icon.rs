//! Icon retrieval and decoding.
//!
//! Every failure mode -- transport, status, oversized body, undecodable bytes
//! -- ends in `None`. The reason is logged here and goes no further; the
//! absence of an icon is the only signal callers get.

use std::time::Duration;

use futures::StreamExt;
use mevo_types::{Icon, IconDataError, IconLoader};
use tracing::{debug, warn};

use crate::error::ClientError;

/// Default upper bound on an icon response body.
pub const DEFAULT_MAX_ICON_BYTES: usize = 1024 * 1024;

/// Why an icon could not be produced.
#[derive(Debug, thiserror::Error)]
enum IconFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("bad pixel buffer: {0}")]
    Pixels(#[from] IconDataError),
}

/// Fetches icon images over HTTP and decodes them to RGBA bitmaps.
#[derive(Debug, Clone)]
pub struct IconFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl IconFetcher {
    /// Create a fetcher with a per-request timeout and a body size limit.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Build`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, max_bytes })
    }

    /// Fetch and decode the icon at `url`, or `None` on any failure.
    pub async fn fetch_icon(&self, url: &str) -> Option<Icon> {
        match self.try_fetch(url).await {
            Ok(icon) => {
                debug!(
                    url = url,
                    width = icon.width(),
                    height = icon.height(),
                    "icon decoded"
                );
                Some(icon)
            }
            Err(e) => {
                warn!(url = url, error = %e, "icon unavailable");
                None
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<Icon, IconFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IconFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IconFailure::Status(status.as_u16()));
        }

        let limit = self.max_bytes;
        if response
            .content_length()
            .is_some_and(|len| usize::try_from(len).map_or(true, |len| len > limit))
        {
            return Err(IconFailure::TooLarge { limit });
        }

        // Stream the body so a lying or missing Content-Length cannot make
        // us buffer more than the limit.
        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| IconFailure::Transport(e.to_string()))?;
            if body.len().saturating_add(chunk.len()) > limit {
                return Err(IconFailure::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        decode_icon(&body)
    }
}

impl IconLoader for IconFetcher {
    async fn load(&self, url: &str) -> Option<Icon> {
        self.fetch_icon(url).await
    }
}

/// Decode image bytes of any supported format into an RGBA icon.
fn decode_icon(bytes: &[u8]) -> Result<Icon, IconFailure> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Icon::new(width, height, rgba.into_raw())?)
}
