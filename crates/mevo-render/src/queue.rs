//! Serialized render command queue.
//!
//! One actor task owns the [`RenderSurface`] and its [`PrimitiveRegistry`].
//! Everything else (the reconciler, icon tasks) holds a cloneable
//! [`RenderHandle`] and sends commands over an `mpsc` channel, each command
//! carrying a `oneshot` reply. The surface is therefore only ever touched
//! from a single context, and per-feed generation numbers let the actor drop
//! icon results that arrive after their cycle was superseded.

use std::collections::BTreeMap;

use mevo_types::{FeatureCollection, FeedType, Icon};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::RenderError;
use crate::registry::{LayerChange, PrimitiveRegistry, SourceChange};
use crate::surface::{IconAnchor, LineLayer, RenderSurface, SymbolLayer};

/// Default command buffer size.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A primitive to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primitive {
    /// A layer of either kind.
    Layer(String),
    /// An image (its layers are removed first).
    Image(String),
    /// A geometry source (its layers are removed first).
    Source(String),
}

/// Where a fetched icon should be attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconAttachment {
    /// Feed the entity belongs to.
    pub feed: FeedType,
    /// Cycle generation the fetch was dispatched in.
    pub generation: u64,
    /// Entity geometry source.
    pub source_id: String,
    /// Image id to register.
    pub image_id: String,
    /// Symbol layer id to register.
    pub layer_id: String,
    /// Icon anchor.
    pub anchor: IconAnchor,
}

/// What the actor did with an icon result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconOutcome {
    /// Image and symbol layer are registered.
    Attached,
    /// The fetch failed; any previous image and layer were removed.
    Detached,
    /// The result belonged to a superseded generation and was dropped.
    Stale,
    /// The surface or registry refused the attachment.
    Rejected(RenderError),
}

enum RenderCommand {
    BeginGeneration {
        feed: FeedType,
        generation: u64,
        reply: oneshot::Sender<()>,
    },
    UpsertSource {
        id: String,
        data: FeatureCollection,
        reply: oneshot::Sender<Result<SourceChange, RenderError>>,
    },
    EnsureLineLayer {
        layer: LineLayer,
        reply: oneshot::Sender<Result<LayerChange, RenderError>>,
    },
    AttachIcon {
        attachment: IconAttachment,
        icon: Option<Icon>,
        reply: oneshot::Sender<IconOutcome>,
    },
    Remove {
        primitives: Vec<Primitive>,
        reply: oneshot::Sender<Result<usize, RenderError>>,
    },
    Snapshot {
        reply: oneshot::Sender<PrimitiveRegistry>,
    },
}

/// Spawn the render actor over `surface`.
///
/// The actor runs until every [`RenderHandle`] is dropped, then hands the
/// surface back through the returned join handle.
pub fn spawn_render_queue<S: RenderSurface>(
    surface: S,
    capacity: usize,
) -> (RenderHandle, JoinHandle<S>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let actor = RenderActor {
        surface,
        registry: PrimitiveRegistry::new(),
        generations: BTreeMap::new(),
        rx,
    };
    (RenderHandle { tx }, tokio::spawn(actor.run()))
}

/// Cloneable sender side of the render queue.
#[derive(Debug, Clone)]
pub struct RenderHandle {
    tx: mpsc::Sender<RenderCommand>,
}

impl core::fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::BeginGeneration { .. } => "BeginGeneration",
            Self::UpsertSource { .. } => "UpsertSource",
            Self::EnsureLineLayer { .. } => "EnsureLineLayer",
            Self::AttachIcon { .. } => "AttachIcon",
            Self::Remove { .. } => "Remove",
            Self::Snapshot { .. } => "Snapshot",
        };
        f.write_str(name)
    }
}

impl RenderHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RenderCommand,
    ) -> Result<T, RenderError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_send_err| RenderError::QueueClosed)?;
        rx.await.map_err(|_recv_err| RenderError::QueueClosed)
    }

    /// Make `generation` the current generation for `feed`. Icon results
    /// from any other generation are dropped from now on.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::QueueClosed`] if the actor is gone.
    pub async fn begin_generation(&self, feed: FeedType, generation: u64) -> Result<(), RenderError> {
        self.request(|reply| RenderCommand::BeginGeneration {
            feed,
            generation,
            reply,
        })
        .await
    }

    /// Register or update a geometry source.
    ///
    /// # Errors
    ///
    /// Returns the surface rejection, or [`RenderError::QueueClosed`].
    pub async fn upsert_source(
        &self,
        id: String,
        data: FeatureCollection,
    ) -> Result<SourceChange, RenderError> {
        self.request(|reply| RenderCommand::UpsertSource { id, data, reply })
            .await?
    }

    /// Register a line layer unless an identical one exists.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::MissingDependency`] if the source is not
    /// registered, the surface rejection, or [`RenderError::QueueClosed`].
    pub async fn ensure_line_layer(&self, layer: LineLayer) -> Result<LayerChange, RenderError> {
        self.request(|reply| RenderCommand::EnsureLineLayer { layer, reply })
            .await?
    }

    /// Deliver an icon fetch result.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::QueueClosed`] if the actor is gone. Every
    /// other outcome is reported through [`IconOutcome`].
    pub async fn attach_icon(
        &self,
        attachment: IconAttachment,
        icon: Option<Icon>,
    ) -> Result<IconOutcome, RenderError> {
        self.request(|reply| RenderCommand::AttachIcon {
            attachment,
            icon,
            reply,
        })
        .await
    }

    /// Remove primitives in the given order, skipping ids that are not
    /// registered. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Stops at the first surface rejection, or returns
    /// [`RenderError::QueueClosed`].
    pub async fn remove(&self, primitives: Vec<Primitive>) -> Result<usize, RenderError> {
        self.request(|reply| RenderCommand::Remove { primitives, reply })
            .await?
    }

    /// Copy of the registry as the actor currently sees it.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::QueueClosed`] if the actor is gone.
    pub async fn snapshot(&self) -> Result<PrimitiveRegistry, RenderError> {
        self.request(|reply| RenderCommand::Snapshot { reply }).await
    }
}

struct RenderActor<S> {
    surface: S,
    registry: PrimitiveRegistry,
    generations: BTreeMap<FeedType, u64>,
    rx: mpsc::Receiver<RenderCommand>,
}

impl<S: RenderSurface> RenderActor<S> {
    async fn run(mut self) -> S {
        while let Some(command) = self.rx.recv().await {
            trace!(command = ?command, "render command");
            self.handle(command);
        }
        debug!("render queue closed");
        self.surface
    }

    // Replies are dropped silently when the requester has gone away.
    fn handle(&mut self, command: RenderCommand) {
        match command {
            RenderCommand::BeginGeneration {
                feed,
                generation,
                reply,
            } => {
                self.generations.insert(feed, generation);
                reply.send(()).ok();
            }
            RenderCommand::UpsertSource { id, data, reply } => {
                let result = self.registry.upsert_source(&mut self.surface, &id, data);
                reply.send(result).ok();
            }
            RenderCommand::EnsureLineLayer { layer, reply } => {
                let result = self.registry.add_line_layer(&mut self.surface, &layer);
                reply.send(result).ok();
            }
            RenderCommand::AttachIcon {
                attachment,
                icon,
                reply,
            } => {
                let outcome = self.attach_icon(&attachment, icon.as_ref());
                reply.send(outcome).ok();
            }
            RenderCommand::Remove { primitives, reply } => {
                let result = self.remove(&primitives);
                reply.send(result).ok();
            }
            RenderCommand::Snapshot { reply } => {
                reply.send(self.registry.clone()).ok();
            }
        }
    }

    fn attach_icon(&mut self, attachment: &IconAttachment, icon: Option<&Icon>) -> IconOutcome {
        if self.generations.get(&attachment.feed) != Some(&attachment.generation) {
            return IconOutcome::Stale;
        }
        let Some(icon) = icon else {
            return match self.remove(&[
                Primitive::Layer(attachment.layer_id.clone()),
                Primitive::Image(attachment.image_id.clone()),
            ]) {
                Ok(_) => IconOutcome::Detached,
                Err(e) => IconOutcome::Rejected(e),
            };
        };
        if !self.registry.has_source(&attachment.source_id) {
            return IconOutcome::Rejected(RenderError::MissingDependency {
                layer_id: attachment.layer_id.clone(),
                dependency: attachment.source_id.clone(),
            });
        }
        let layer = SymbolLayer {
            id: attachment.layer_id.clone(),
            source_id: attachment.source_id.clone(),
            image_id: attachment.image_id.clone(),
            anchor: attachment.anchor,
        };
        let result = self
            .registry
            .replace_image(&mut self.surface, &attachment.image_id, icon)
            .and_then(|()| self.registry.add_symbol_layer(&mut self.surface, &layer));
        match result {
            Ok(_) => IconOutcome::Attached,
            Err(e) => IconOutcome::Rejected(e),
        }
    }

    fn remove(&mut self, primitives: &[Primitive]) -> Result<usize, RenderError> {
        let mut removed = 0_usize;
        for primitive in primitives {
            let was_registered = match primitive {
                Primitive::Layer(id) => self.registry.remove_layer(&mut self.surface, id)?,
                Primitive::Image(id) => self.registry.remove_image(&mut self.surface, id)?,
                Primitive::Source(id) => self.registry.remove_source(&mut self.surface, id)?,
            };
            if was_registered {
                removed = removed.saturating_add(1);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mevo_types::{Feature, Geometry};
    use serde_json::Map;

    use super::*;
    use crate::memory::{InMemorySurface, SurfaceOp};

    fn point_source() -> FeatureCollection {
        FeatureCollection::single(Feature::new(
            Geometry::Point {
                coordinates: vec![174.78, -41.29],
            },
            Map::new(),
        ))
    }

    fn attachment(generation: u64) -> IconAttachment {
        IconAttachment {
            feed: FeedType::Vehicle,
            generation,
            source_id: "vehicle_0".to_owned(),
            image_id: "icon_0".to_owned(),
            layer_id: "circle_0".to_owned(),
            anchor: IconAnchor::Bottom,
        }
    }

    fn icon() -> Icon {
        Icon::new(1, 1, vec![255, 255, 255, 255]).unwrap()
    }

    #[tokio::test]
    async fn attaches_icon_for_current_generation() {
        let (handle, actor) = spawn_render_queue(InMemorySurface::new(), 8);
        handle.begin_generation(FeedType::Vehicle, 1).await.unwrap();
        handle
            .upsert_source("vehicle_0".to_owned(), point_source())
            .await
            .unwrap();
        let outcome = handle.attach_icon(attachment(1), Some(icon())).await.unwrap();
        assert_eq!(outcome, IconOutcome::Attached);

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.has_image("icon_0"));
        assert!(snapshot.has_layer("circle_0"));

        drop(handle);
        let surface = actor.await.unwrap();
        assert_eq!(
            surface.ops(),
            &[
                SurfaceOp::AddSource("vehicle_0".to_owned()),
                SurfaceOp::AddImage("icon_0".to_owned()),
                SurfaceOp::AddSymbolLayer("circle_0".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn drops_icon_from_superseded_generation() {
        let (handle, _actor) = spawn_render_queue(InMemorySurface::new(), 8);
        handle.begin_generation(FeedType::Vehicle, 1).await.unwrap();
        handle
            .upsert_source("vehicle_0".to_owned(), point_source())
            .await
            .unwrap();
        handle.begin_generation(FeedType::Vehicle, 2).await.unwrap();

        let outcome = handle.attach_icon(attachment(1), Some(icon())).await.unwrap();
        assert_eq!(outcome, IconOutcome::Stale);
        assert!(handle.snapshot().await.unwrap().images().is_empty());
    }

    #[tokio::test]
    async fn failed_icon_detaches_previous_one() {
        let (handle, _actor) = spawn_render_queue(InMemorySurface::new(), 8);
        handle.begin_generation(FeedType::Vehicle, 1).await.unwrap();
        handle
            .upsert_source("vehicle_0".to_owned(), point_source())
            .await
            .unwrap();
        handle.attach_icon(attachment(1), Some(icon())).await.unwrap();

        handle.begin_generation(FeedType::Vehicle, 2).await.unwrap();
        let outcome = handle.attach_icon(attachment(2), None).await.unwrap();
        assert_eq!(outcome, IconOutcome::Detached);

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.has_source("vehicle_0"));
        assert!(!snapshot.has_image("icon_0"));
        assert!(!snapshot.has_layer("circle_0"));
    }

    #[tokio::test]
    async fn icon_without_source_is_rejected() {
        let (handle, _actor) = spawn_render_queue(InMemorySurface::new(), 8);
        handle.begin_generation(FeedType::Vehicle, 1).await.unwrap();
        let outcome = handle.attach_icon(attachment(1), Some(icon())).await.unwrap();
        assert!(matches!(
            outcome,
            IconOutcome::Rejected(RenderError::MissingDependency { .. })
        ));
        assert!(handle.snapshot().await.unwrap().images().is_empty());
    }

    #[tokio::test]
    async fn closed_queue_reports_queue_closed() {
        let (handle, actor) = spawn_render_queue(InMemorySurface::new(), 1);
        actor.abort();
        actor.await.ok();
        let err = handle.snapshot().await.err();
        assert_eq!(err, Some(RenderError::QueueClosed));
    }
}
