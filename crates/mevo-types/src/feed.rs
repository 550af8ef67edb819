//! Feed types served by the Mevo public API.

use serde::{Deserialize, Serialize};

/// Kind of entity feed.
///
/// Each feed type maps to one API path segment and one family of render
/// primitive id prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    /// Shared vehicles (point features with icons).
    Vehicle,
    /// Parking zones (polygon or line features).
    Parking,
}

impl FeedType {
    /// All feed types in the order a cycle runs them by default.
    pub const ALL: [Self; 2] = [Self::Vehicle, Self::Parking];

    /// Path segment under the API base URL.
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Vehicle => "vehicles",
            Self::Parking => "parking",
        }
    }

    /// Lowercase name used in logs and as the geometry source prefix.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vehicle => "vehicle",
            Self::Parking => "parking",
        }
    }

    /// Prefix of geometry source ids.
    pub const fn source_prefix(self) -> &'static str {
        self.as_str()
    }

    /// Prefix of icon image ids.
    pub const fn image_prefix(self) -> &'static str {
        match self {
            Self::Vehicle => "icon",
            Self::Parking => "parking_icon",
        }
    }

    /// Prefix of symbol layer ids.
    pub const fn symbol_layer_prefix(self) -> &'static str {
        match self {
            Self::Vehicle => "circle",
            Self::Parking => "parking_circle",
        }
    }
}

impl core::fmt::Display for FeedType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segments_match_api() {
        assert_eq!(FeedType::Vehicle.path_segment(), "vehicles");
        assert_eq!(FeedType::Parking.path_segment(), "parking");
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&FeedType::ALL).unwrap_or_default();
        assert_eq!(json, r#"["vehicle","parking"]"#);
        let parsed: Result<FeedType, _> = serde_json::from_str(r#""parking""#);
        assert_eq!(parsed.ok(), Some(FeedType::Parking));
    }
}
