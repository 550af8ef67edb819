//! Shared type definitions for the Mevo map sync.
//!
//! This crate is the single source of truth for the data model that flows
//! through the pipeline: feed kinds, the GeoJSON feature model produced by the
//! envelope parser, icon bitmaps, and the identifiers used for sync cycles and
//! render primitives.
//!
//! # Modules
//!
//! - [`feed`] -- Feed types and their API path segments
//! - [`geojson`] -- Feature collections, features, and geometry validation
//! - [`icon`] -- Decoded icon bitmaps and the `IconLoader` seam
//! - [`ids`] -- Cycle ids, entity keys, and render primitive ids

pub mod feed;
pub mod geojson;
pub mod icon;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use feed::FeedType;
pub use geojson::{
    CollectionContents, Feature, FeatureCollection, FeatureId, Geometry, GeometryClass,
    GeometryError, ICON_URL_PROPERTY, Position,
};
pub use icon::{Icon, IconDataError, IconLoader};
pub use ids::{CycleId, EntityKey, PrimitiveIds};
