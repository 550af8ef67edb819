//! Network side of the Mevo map sync.
//!
//! - [`client`] -- one GET per feed type, with success and non-empty checks
//! - [`envelope`] -- unwraps `{ "data": <FeatureCollection> }`
//! - [`icon`] -- fetches and decodes per-entity icons, failing to `None`
//!
//! Nothing here touches the render surface. Results are handed back to the
//! caller, which routes them through the render command queue.

pub mod client;
pub mod envelope;
pub mod error;
pub mod icon;

pub use client::{FeedClient, RawPayload};
pub use envelope::{parse, parse_envelope};
pub use error::{ClientError, FetchError, ParseError};
pub use icon::{DEFAULT_MAX_ICON_BYTES, IconFetcher};
