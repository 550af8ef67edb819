//! In-memory [`RenderSurface`] used by the engine binary and tests.
//!
//! Records every accepted call in order and enforces the same rules a real
//! map engine would: no duplicate ids, no removal of unknown ids, and no
//! layer referencing an unknown source or image.

use std::collections::BTreeSet;

use mevo_types::{FeatureCollection, Icon};
use tracing::debug;

use crate::surface::{LineLayer, RenderSurface, SurfaceError, SymbolLayer};

/// One accepted surface call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    /// `add_geometry_source`.
    AddSource(String),
    /// `update_geometry_source`.
    UpdateSource(String),
    /// `remove_geometry_source`.
    RemoveSource(String),
    /// `add_image`.
    AddImage(String),
    /// `remove_image`.
    RemoveImage(String),
    /// `add_symbol_layer`.
    AddSymbolLayer(String),
    /// `add_line_layer`.
    AddLineLayer(String),
    /// `remove_layer`.
    RemoveLayer(String),
}

/// A surface that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemorySurface {
    ops: Vec<SurfaceOp>,
    sources: BTreeSet<String>,
    images: BTreeSet<String>,
    layers: BTreeSet<String>,
    source_uses: Vec<(String, String)>,
    image_uses: Vec<(String, String)>,
    rejected: BTreeSet<String>,
}

impl InMemorySurface {
    /// Create an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every add or update targeting `id`.
    #[must_use]
    pub fn reject_id(mut self, id: impl Into<String>) -> Self {
        self.rejected.insert(id.into());
        self
    }

    /// Accepted calls, oldest first.
    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    /// Registered source ids.
    pub const fn sources(&self) -> &BTreeSet<String> {
        &self.sources
    }

    /// Registered image ids.
    pub const fn images(&self) -> &BTreeSet<String> {
        &self.images
    }

    /// Registered layer ids.
    pub const fn layers(&self) -> &BTreeSet<String> {
        &self.layers
    }

    fn check_rejected(&self, id: &str) -> Result<(), SurfaceError> {
        if self.rejected.contains(id) {
            Err(SurfaceError::new(format!("{id} refused by surface")))
        } else {
            Ok(())
        }
    }

    fn source_in_use(&self, id: &str) -> bool {
        self.source_uses.iter().any(|(_, source)| source == id)
    }

    fn image_in_use(&self, id: &str) -> bool {
        self.image_uses.iter().any(|(_, image)| image == id)
    }

    fn record(&mut self, op: SurfaceOp) {
        debug!(op = ?op, "surface op");
        self.ops.push(op);
    }
}

fn insert_new(set: &mut BTreeSet<String>, kind: &str, id: &str) -> Result<(), SurfaceError> {
    if set.insert(id.to_owned()) {
        Ok(())
    } else {
        Err(SurfaceError::new(format!("{kind} {id} already exists")))
    }
}

fn remove_known(set: &mut BTreeSet<String>, kind: &str, id: &str) -> Result<(), SurfaceError> {
    if set.remove(id) {
        Ok(())
    } else {
        Err(SurfaceError::new(format!("{kind} {id} does not exist")))
    }
}

impl RenderSurface for InMemorySurface {
    fn add_geometry_source(
        &mut self,
        id: &str,
        _data: &FeatureCollection,
    ) -> Result<(), SurfaceError> {
        self.check_rejected(id)?;
        insert_new(&mut self.sources, "source", id)?;
        self.record(SurfaceOp::AddSource(id.to_owned()));
        Ok(())
    }

    fn update_geometry_source(
        &mut self,
        id: &str,
        _data: &FeatureCollection,
    ) -> Result<(), SurfaceError> {
        self.check_rejected(id)?;
        if !self.sources.contains(id) {
            return Err(SurfaceError::new(format!("source {id} does not exist")));
        }
        self.record(SurfaceOp::UpdateSource(id.to_owned()));
        Ok(())
    }

    fn remove_geometry_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        if self.source_in_use(id) {
            return Err(SurfaceError::new(format!("source {id} is still in use")));
        }
        remove_known(&mut self.sources, "source", id)?;
        self.record(SurfaceOp::RemoveSource(id.to_owned()));
        Ok(())
    }

    fn add_image(&mut self, id: &str, _icon: &Icon) -> Result<(), SurfaceError> {
        self.check_rejected(id)?;
        insert_new(&mut self.images, "image", id)?;
        self.record(SurfaceOp::AddImage(id.to_owned()));
        Ok(())
    }

    fn remove_image(&mut self, id: &str) -> Result<(), SurfaceError> {
        if self.image_in_use(id) {
            return Err(SurfaceError::new(format!("image {id} is still in use")));
        }
        remove_known(&mut self.images, "image", id)?;
        self.record(SurfaceOp::RemoveImage(id.to_owned()));
        Ok(())
    }

    fn add_symbol_layer(&mut self, layer: &SymbolLayer) -> Result<(), SurfaceError> {
        self.check_rejected(&layer.id)?;
        if !self.sources.contains(&layer.source_id) {
            return Err(SurfaceError::new(format!(
                "layer {} references unknown source {}",
                layer.id, layer.source_id
            )));
        }
        if !self.images.contains(&layer.image_id) {
            return Err(SurfaceError::new(format!(
                "layer {} references unknown image {}",
                layer.id, layer.image_id
            )));
        }
        insert_new(&mut self.layers, "layer", &layer.id)?;
        self.source_uses
            .push((layer.id.clone(), layer.source_id.clone()));
        self.image_uses
            .push((layer.id.clone(), layer.image_id.clone()));
        self.record(SurfaceOp::AddSymbolLayer(layer.id.clone()));
        Ok(())
    }

    fn add_line_layer(&mut self, layer: &LineLayer) -> Result<(), SurfaceError> {
        self.check_rejected(&layer.id)?;
        if !self.sources.contains(&layer.source_id) {
            return Err(SurfaceError::new(format!(
                "layer {} references unknown source {}",
                layer.id, layer.source_id
            )));
        }
        insert_new(&mut self.layers, "layer", &layer.id)?;
        self.source_uses
            .push((layer.id.clone(), layer.source_id.clone()));
        self.record(SurfaceOp::AddLineLayer(layer.id.clone()));
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        remove_known(&mut self.layers, "layer", id)?;
        self.source_uses.retain(|(layer, _)| layer != id);
        self.image_uses.retain(|(layer, _)| layer != id);
        self.record(SurfaceOp::RemoveLayer(id.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn empty() -> FeatureCollection {
        FeatureCollection::from_features(Vec::new())
    }

    #[test]
    fn refuses_duplicates_and_unknown_removals() {
        let mut surface = InMemorySurface::new();
        surface.add_geometry_source("vehicle_0", &empty()).unwrap();
        assert!(surface.add_geometry_source("vehicle_0", &empty()).is_err());
        assert!(surface.remove_image("icon_0").is_err());
        assert!(surface.update_geometry_source("vehicle_9", &empty()).is_err());
        assert_eq!(surface.ops().len(), 1);
    }

    #[test]
    fn refuses_removing_source_in_use() {
        let mut surface = InMemorySurface::new();
        surface.add_geometry_source("parking_0", &empty()).unwrap();
        surface
            .add_line_layer(&LineLayer {
                id: "parking_outline_0".to_owned(),
                source_id: "parking_0".to_owned(),
                style: crate::surface::LineStyle::default(),
            })
            .unwrap();
        assert!(surface.remove_geometry_source("parking_0").is_err());
        surface.remove_layer("parking_outline_0").unwrap();
        surface.remove_geometry_source("parking_0").unwrap();
        assert!(surface.sources().is_empty());
        assert!(surface.layers().is_empty());
    }

    #[test]
    fn symbol_layer_needs_known_image() {
        let mut surface = InMemorySurface::new();
        surface.add_geometry_source("vehicle_0", &empty()).unwrap();
        let err = surface
            .add_symbol_layer(&SymbolLayer {
                id: "circle_0".to_owned(),
                source_id: "vehicle_0".to_owned(),
                image_id: "icon_0".to_owned(),
                anchor: crate::surface::IconAnchor::Bottom,
            })
            .err();
        assert!(err.is_some());
        assert!(surface.layers().is_empty());
    }

    #[test]
    fn source_and_image_ids_are_separate_namespaces() {
        let mut surface = InMemorySurface::new();
        surface.add_geometry_source("parking_icon_5", &empty()).unwrap();
        surface
            .add_image("parking_icon_5", &Icon::new(1, 1, vec![0, 0, 0, 255]).unwrap())
            .unwrap();
        surface
            .add_line_layer(&LineLayer {
                id: "parking_outline_icon_5".to_owned(),
                source_id: "parking_icon_5".to_owned(),
                style: crate::surface::LineStyle::default(),
            })
            .unwrap();
        surface.remove_image("parking_icon_5").unwrap();
        assert!(surface.remove_geometry_source("parking_icon_5").is_err());
    }
}
