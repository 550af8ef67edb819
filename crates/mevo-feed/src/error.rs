//! Error types for feed retrieval and envelope parsing.
//!
//! Icon failures have no error type here on purpose: the icon fetcher
//! collapses them into `None` at its own boundary.

/// A feed request failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Connection, TLS, timeout, or body-read failure.
    #[error("transport error fetching {url}: {message}")]
    Transport {
        /// The requested URL.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http {
        /// The requested URL.
        url: String,
        /// The status code.
        status: u16,
    },

    /// The server answered 2xx with no content.
    #[error("empty response body from {url}")]
    EmptyBody {
        /// The requested URL.
        url: String,
    },

    /// The feed URL could not be built from the base URL and area.
    #[error("invalid feed URL: {message}")]
    InvalidUrl {
        /// Description of the problem.
        message: String,
    },
}

/// A feed payload could not be turned into a feature collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The payload is not valid JSON.
    #[error("malformed JSON: {message}")]
    MalformedJson {
        /// The JSON parser's message.
        message: String,
    },

    /// The payload is not an object with a top-level `data` member.
    #[error("envelope has no `data` field")]
    MissingDataField,

    /// `data` is not a structurally valid GeoJSON feature collection.
    #[error("invalid GeoJSON: {message}")]
    InvalidGeoJson {
        /// The deserializer's message.
        message: String,
    },
}

/// An HTTP client could not be constructed.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The configured base URL does not parse or cannot carry path segments.
    #[error("invalid base URL {url}: {message}")]
    InvalidBaseUrl {
        /// The configured URL.
        url: String,
        /// Description of the problem.
        message: String,
    },

    /// The underlying `reqwest` client failed to build.
    #[error("failed to build HTTP client: {source}")]
    Build {
        /// The underlying error.
        #[from]
        source: reqwest::Error,
    },
}
