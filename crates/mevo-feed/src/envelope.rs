//! Parsing of the service envelope `{ "data": <FeatureCollection> }`.
//!
//! Three results are kept distinct: a structurally broken payload
//! ([`ParseError`]), an explicitly empty collection, and an absent collection
//! (`data: null`, or a collection without `features`). Only the first is an
//! error.

use mevo_types::FeatureCollection;
use serde_json::Value;

use crate::client::RawPayload;
use crate::error::ParseError;

/// Name of the envelope member holding the GeoJSON payload.
pub const DATA_FIELD: &str = "data";

/// Parse a raw envelope string into a feature collection.
///
/// # Errors
///
/// - [`ParseError::MalformedJson`] if `raw` is not JSON
/// - [`ParseError::MissingDataField`] if it is not an object with `data`
/// - [`ParseError::InvalidGeoJson`] if `data` is not a feature collection
pub fn parse_envelope(raw: &str) -> Result<FeatureCollection, ParseError> {
    let mut root: Value = serde_json::from_str(raw).map_err(|e| ParseError::MalformedJson {
        message: e.to_string(),
    })?;

    let data = root
        .as_object_mut()
        .and_then(|envelope| envelope.remove(DATA_FIELD))
        .ok_or(ParseError::MissingDataField)?;

    if data.is_null() {
        return Ok(FeatureCollection::absent());
    }

    serde_json::from_value(data).map_err(|e| ParseError::InvalidGeoJson {
        message: e.to_string(),
    })
}

/// Parse a fetched payload.
///
/// # Errors
///
/// See [`parse_envelope`].
pub fn parse(payload: &RawPayload) -> Result<FeatureCollection, ParseError> {
    parse_envelope(&payload.body)
}
