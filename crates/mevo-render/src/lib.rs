//! Render side of the Mevo map sync.
//!
//! The map engine is abstracted as a [`RenderSurface`]. A single actor task
//! owns it ([`queue`]), keeping a [`PrimitiveRegistry`] that refuses layers
//! whose source or image is not registered yet. The [`Reconciler`] maps each
//! feed's feature collection onto sources, icon images, and layers through
//! that queue.
//!
//! # Modules
//!
//! - [`surface`] -- The capability trait and layer definitions
//! - [`registry`] -- Registered primitives and their dependency rules
//! - [`queue`] -- The render actor and its cloneable handle
//! - [`identity`] -- Entity key strategies
//! - [`reconciler`] -- Feature collection to primitive reconciliation
//! - [`memory`] -- An in-memory surface for the engine binary and tests

pub mod error;
pub mod identity;
pub mod memory;
pub mod queue;
pub mod reconciler;
pub mod registry;
pub mod surface;

pub use error::RenderError;
pub use identity::IdentityStrategy;
pub use memory::{InMemorySurface, SurfaceOp};
pub use queue::{
    DEFAULT_QUEUE_CAPACITY, IconAttachment, IconOutcome, Primitive, RenderHandle,
    spawn_render_queue,
};
pub use reconciler::{
    DEFAULT_MAX_CONCURRENT_ICONS, ReconcileReport, Reconciler, ReconcilerSettings, RejectedEntity,
};
pub use registry::{ImageRecord, LayerChange, LayerKind, LayerRecord, PrimitiveRegistry, SourceChange};
pub use surface::{IconAnchor, LineLayer, LineStyle, RenderSurface, SurfaceError, SymbolLayer};
