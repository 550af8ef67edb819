//! Identifiers for sync cycles, entities, and render primitives.
//!
//! Cycle identifiers are UUID v7 (time-ordered) so that event streams from
//! consecutive cycles sort naturally. Entity keys and primitive ids are plain
//! strings because the render surface namespaces everything by string id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::feed::FeedType;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_id! {
    /// Unique identifier for one orchestrated sync cycle (all feeds).
    CycleId
}

/// Per-feed key of one entity within a cycle.
///
/// Keys are restricted to `[A-Za-z0-9_-]` so they can be embedded in
/// primitive ids. `-` only appears as the start of a `-XX` byte escape.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey(String);

impl EntityKey {
    /// Key derived from the entity's ordinal position in the feed.
    pub fn positional(index: usize) -> Self {
        Self(index.to_string())
    }

    /// Key derived from a feed-provided value. Every byte outside
    /// `[A-Za-z0-9_]` is written as `-` plus two uppercase hex digits, so
    /// distinct values give distinct keys. Returns `None` for a blank value.
    pub fn escaped(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        let mut key = String::with_capacity(raw.len());
        for byte in raw.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'_' {
                key.push(char::from(byte));
            } else {
                key.push_str(&format!("-{byte:02X}"));
            }
        }
        Some(Self(key))
    }

    /// Fallback key for a feature that lacks its feature key.
    ///
    /// The `pos` prefix keeps these out of the way of escaped feed keys
    /// that happen to be plain numbers.
    pub fn fallback(index: usize) -> Self {
        Self(format!("pos{index}"))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every render primitive id an entity may own.
///
/// An entity only ever has one of the two layer kinds registered at a time,
/// but both ids are derived so the stale one can be torn down when the
/// entity's geometry class changes between cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveIds {
    /// Geometry source id (e.g. `vehicle_3`).
    pub source: String,
    /// Icon image id (e.g. `icon_3`).
    pub image: String,
    /// Symbol layer id (e.g. `circle_3`).
    pub symbol_layer: String,
    /// Line layer id (e.g. `parking_outline_3`).
    pub line_layer: String,
}

impl PrimitiveIds {
    /// Derive the primitive ids for an entity of the given feed.
    pub fn for_entity(feed: FeedType, key: &EntityKey) -> Self {
        let source_prefix = feed.source_prefix();
        Self {
            source: format!("{source_prefix}_{key}"),
            image: format!("{}_{key}", feed.image_prefix()),
            symbol_layer: format!("{}_{key}", feed.symbol_layer_prefix()),
            line_layer: format!("{source_prefix}_outline_{key}"),
        }
    }
}
