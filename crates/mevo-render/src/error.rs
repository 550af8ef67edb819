//! Error types for render surface mutation.

use mevo_types::GeometryError;

/// A render primitive could not be registered or removed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The entity's geometry cannot be rendered.
    #[error("invalid geometry for {id}: {source}")]
    InvalidGeometry {
        /// Source id the entity would have used.
        id: String,
        /// What is wrong with the geometry.
        source: GeometryError,
    },

    /// The render surface refused an operation.
    #[error("surface rejected {operation} {id}: {message}")]
    SurfaceRejected {
        /// Operation name (e.g. `add_image`).
        operation: &'static str,
        /// Primitive id the operation targeted.
        id: String,
        /// What the surface reported.
        message: String,
    },

    /// A layer was requested before the source or image it references.
    #[error("layer {layer_id} references unregistered {dependency}")]
    MissingDependency {
        /// The layer that could not be added.
        layer_id: String,
        /// The missing source or image id.
        dependency: String,
    },

    /// Another entity already claimed this key in the current cycle.
    #[error("duplicate entity key {key}")]
    DuplicateKey {
        /// The repeated key.
        key: String,
    },

    /// The render queue task is gone; no further mutation is possible.
    #[error("render queue closed")]
    QueueClosed,
}
