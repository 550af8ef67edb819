//! The render surface capability consumed by the sync.
//!
//! The concrete map engine is external. All it has to offer is this set of
//! synchronous registration calls, each of which either succeeds or reports a
//! [`SurfaceError`]. Calls are only ever made from the render queue task
//! (see [`crate::queue`]), so implementations need not be thread-safe beyond
//! `Send`.

use mevo_types::{FeatureCollection, Icon};
use serde::{Deserialize, Serialize};

/// Rejection reported by the render surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SurfaceError {
    /// What the surface reported.
    pub message: String,
}

impl SurfaceError {
    /// Create an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Which part of an icon sits on the feature's coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconAnchor {
    /// Icon centre on the point.
    Center,
    /// Bottom-centre of the icon on the point (pin style).
    #[default]
    Bottom,
    /// Top-centre of the icon on the point.
    Top,
}

/// Stroke style of an outline layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineStyle {
    /// CSS colour string.
    pub color: String,
    /// Stroke width in pixels.
    pub width: f64,
    /// Opacity between 0 and 1.
    pub opacity: f64,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: "#2e7d32".to_owned(),
            width: 2.0,
            opacity: 0.9,
        }
    }
}

/// A symbol layer drawing one image at a source's geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolLayer {
    /// Layer id.
    pub id: String,
    /// Geometry source the layer draws.
    pub source_id: String,
    /// Registered image the layer uses.
    pub image_id: String,
    /// Icon anchor.
    pub anchor: IconAnchor,
}

/// A line layer outlining a source's geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineLayer {
    /// Layer id.
    pub id: String,
    /// Geometry source the layer draws.
    pub source_id: String,
    /// Stroke style.
    pub style: LineStyle,
}

/// Capability interface of the external rendering engine.
pub trait RenderSurface: Send + 'static {
    /// Register a new GeoJSON geometry source.
    fn add_geometry_source(
        &mut self,
        id: &str,
        data: &FeatureCollection,
    ) -> Result<(), SurfaceError>;

    /// Replace the data of an existing geometry source.
    fn update_geometry_source(
        &mut self,
        id: &str,
        data: &FeatureCollection,
    ) -> Result<(), SurfaceError>;

    /// Remove a geometry source.
    fn remove_geometry_source(&mut self, id: &str) -> Result<(), SurfaceError>;

    /// Register an image.
    fn add_image(&mut self, id: &str, icon: &Icon) -> Result<(), SurfaceError>;

    /// Remove an image.
    fn remove_image(&mut self, id: &str) -> Result<(), SurfaceError>;

    /// Add a symbol layer.
    fn add_symbol_layer(&mut self, layer: &SymbolLayer) -> Result<(), SurfaceError>;

    /// Add a line layer.
    fn add_line_layer(&mut self, layer: &LineLayer) -> Result<(), SurfaceError>;

    /// Remove a layer of either kind.
    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;
}
