//! Bookkeeping of registered render primitives.
//!
//! [`PrimitiveRegistry`] is the render queue's view of what the surface
//! holds. Every mutation goes through it so the ordering invariant holds at
//! all times: a layer is only registered while its source (and image, for
//! symbol layers) is registered. Removing a source or image first removes
//! the layers that reference it.

use std::collections::BTreeMap;

use mevo_types::{FeatureCollection, Icon};
use serde::Serialize;
use tracing::trace;

use crate::error::RenderError;
use crate::surface::{IconAnchor, LineLayer, LineStyle, RenderSurface, SurfaceError, SymbolLayer};

/// Whether a source upsert created or replaced the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceChange {
    /// The source was new.
    Added,
    /// An existing source's data was replaced.
    Updated,
}

/// Whether a layer request changed the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerChange {
    /// The layer was added (or re-added with a new definition).
    Added,
    /// An identical layer was already registered.
    Unchanged,
}

/// Kind-specific part of a registered layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
    /// Icon symbol layer.
    Symbol {
        /// Image drawn by the layer.
        image_id: String,
        /// Icon anchor.
        anchor: IconAnchor,
    },
    /// Outline layer.
    Line {
        /// Stroke style.
        style: LineStyle,
    },
}

/// A registered layer and its dependencies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerRecord {
    /// Source the layer draws.
    pub source_id: String,
    /// Kind-specific fields.
    pub kind: LayerKind,
}

impl LayerRecord {
    fn references_source(&self, id: &str) -> bool {
        self.source_id == id
    }

    fn references_image(&self, id: &str) -> bool {
        matches!(&self.kind, LayerKind::Symbol { image_id, .. } if image_id == id)
    }
}

/// Dimensions of a registered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Everything currently registered with the surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrimitiveRegistry {
    sources: BTreeMap<String, FeatureCollection>,
    images: BTreeMap<String, ImageRecord>,
    layers: BTreeMap<String, LayerRecord>,
}

impl PrimitiveRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered sources and their data.
    pub const fn sources(&self) -> &BTreeMap<String, FeatureCollection> {
        &self.sources
    }

    /// Registered images.
    pub const fn images(&self) -> &BTreeMap<String, ImageRecord> {
        &self.images
    }

    /// Registered layers.
    pub const fn layers(&self) -> &BTreeMap<String, LayerRecord> {
        &self.layers
    }

    /// Whether a source id is registered.
    pub fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Whether an image id is registered.
    pub fn has_image(&self, id: &str) -> bool {
        self.images.contains_key(id)
    }

    /// Whether a layer id is registered.
    pub fn has_layer(&self, id: &str) -> bool {
        self.layers.contains_key(id)
    }

    /// Register a source, or replace its data if already registered.
    pub fn upsert_source<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        id: &str,
        data: FeatureCollection,
    ) -> Result<SourceChange, RenderError> {
        let change = if self.sources.contains_key(id) {
            surface
                .update_geometry_source(id, &data)
                .map_err(|e| rejected("update_geometry_source", id, e))?;
            SourceChange::Updated
        } else {
            surface
                .add_geometry_source(id, &data)
                .map_err(|e| rejected("add_geometry_source", id, e))?;
            SourceChange::Added
        };
        trace!(source_id = id, change = ?change, "source registered");
        self.sources.insert(id.to_owned(), data);
        Ok(change)
    }

    /// Register an image, replacing (and unlinking) any previous one.
    pub fn replace_image<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        id: &str,
        icon: &Icon,
    ) -> Result<(), RenderError> {
        self.remove_image(surface, id)?;
        surface
            .add_image(id, icon)
            .map_err(|e| rejected("add_image", id, e))?;
        self.images.insert(
            id.to_owned(),
            ImageRecord {
                width: icon.width(),
                height: icon.height(),
            },
        );
        Ok(())
    }

    /// Register a symbol layer once its source and image exist.
    pub fn add_symbol_layer<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        layer: &SymbolLayer,
    ) -> Result<LayerChange, RenderError> {
        self.require(&layer.id, &layer.source_id, true)?;
        self.require(&layer.id, &layer.image_id, false)?;
        let record = LayerRecord {
            source_id: layer.source_id.clone(),
            kind: LayerKind::Symbol {
                image_id: layer.image_id.clone(),
                anchor: layer.anchor,
            },
        };
        if self.layers.get(&layer.id) == Some(&record) {
            return Ok(LayerChange::Unchanged);
        }
        self.remove_layer(surface, &layer.id)?;
        surface
            .add_symbol_layer(layer)
            .map_err(|e| rejected("add_symbol_layer", &layer.id, e))?;
        self.layers.insert(layer.id.clone(), record);
        Ok(LayerChange::Added)
    }

    /// Register a line layer once its source exists.
    pub fn add_line_layer<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        layer: &LineLayer,
    ) -> Result<LayerChange, RenderError> {
        self.require(&layer.id, &layer.source_id, true)?;
        let record = LayerRecord {
            source_id: layer.source_id.clone(),
            kind: LayerKind::Line {
                style: layer.style.clone(),
            },
        };
        if self.layers.get(&layer.id) == Some(&record) {
            return Ok(LayerChange::Unchanged);
        }
        self.remove_layer(surface, &layer.id)?;
        surface
            .add_line_layer(layer)
            .map_err(|e| rejected("add_line_layer", &layer.id, e))?;
        self.layers.insert(layer.id.clone(), record);
        Ok(LayerChange::Added)
    }

    /// Remove a layer. Returns whether it was registered.
    pub fn remove_layer<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        id: &str,
    ) -> Result<bool, RenderError> {
        if !self.layers.contains_key(id) {
            return Ok(false);
        }
        surface
            .remove_layer(id)
            .map_err(|e| rejected("remove_layer", id, e))?;
        self.layers.remove(id);
        Ok(true)
    }

    /// Remove an image and every layer using it. Returns whether it was
    /// registered.
    pub fn remove_image<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        id: &str,
    ) -> Result<bool, RenderError> {
        if !self.images.contains_key(id) {
            return Ok(false);
        }
        self.remove_dependents(surface, |record| record.references_image(id))?;
        surface
            .remove_image(id)
            .map_err(|e| rejected("remove_image", id, e))?;
        self.images.remove(id);
        Ok(true)
    }

    /// Remove a source and every layer drawing it. Returns whether it was
    /// registered.
    pub fn remove_source<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        id: &str,
    ) -> Result<bool, RenderError> {
        if !self.sources.contains_key(id) {
            return Ok(false);
        }
        self.remove_dependents(surface, |record| record.references_source(id))?;
        surface
            .remove_geometry_source(id)
            .map_err(|e| rejected("remove_geometry_source", id, e))?;
        self.sources.remove(id);
        Ok(true)
    }

    fn remove_dependents<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        depends: impl Fn(&LayerRecord) -> bool,
    ) -> Result<(), RenderError> {
        let dependents: Vec<String> = self
            .layers
            .iter()
            .filter(|(_, record)| depends(record))
            .map(|(layer_id, _)| layer_id.clone())
            .collect();
        for layer_id in dependents {
            self.remove_layer(surface, &layer_id)?;
        }
        Ok(())
    }

    fn require(&self, layer_id: &str, dependency: &str, is_source: bool) -> Result<(), RenderError> {
        let present = if is_source {
            self.has_source(dependency)
        } else {
            self.has_image(dependency)
        };
        if present {
            Ok(())
        } else {
            Err(RenderError::MissingDependency {
                layer_id: layer_id.to_owned(),
                dependency: dependency.to_owned(),
            })
        }
    }
}

fn rejected(operation: &'static str, id: &str, error: SurfaceError) -> RenderError {
    RenderError::SurfaceRejected {
        operation,
        id: id.to_owned(),
        message: error.message,
    }
}
