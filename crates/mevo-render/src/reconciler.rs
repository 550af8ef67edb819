//! Turns a parsed feature collection into render primitives.
//!
//! For each feature, in collection order, the reconciler derives an entity
//! key, registers a single-feature geometry source, and then either
//! dispatches an icon fetch (point markers with an `iconUrl`) or attaches an
//! outline layer (lines and polygons). Icon fetches run as tasks in a
//! per-feed [`JoinSet`]; starting a new cycle drops the previous set, which
//! aborts every fetch still in flight.
//!
//! Per-entity failures are reported and skipped. Only a closed render queue
//! is returned as an error.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use mevo_events::{EventBus, SyncEvent};
use mevo_types::{
    EntityKey, Feature, FeatureCollection, FeedType, GeometryClass, GeometryError, IconLoader,
    PrimitiveIds,
};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::RenderError;
use crate::identity::IdentityStrategy;
use crate::queue::{IconAttachment, IconOutcome, Primitive, RenderHandle};
use crate::registry::SourceChange;
use crate::surface::{IconAnchor, LineLayer, LineStyle};

/// Default bound on concurrent icon fetches.
pub const DEFAULT_MAX_CONCURRENT_ICONS: usize = 8;

/// Tunables of the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerSettings {
    /// How entities are keyed across cycles.
    pub identity: IdentityStrategy,
    /// Remove primitives of entities missing from the latest cycle.
    pub teardown_stale: bool,
    /// Style of outline layers.
    pub line_style: LineStyle,
    /// Anchor of icon symbol layers.
    pub anchor: IconAnchor,
    /// Maximum icon fetches in flight across all feeds.
    pub max_concurrent_icons: usize,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            identity: IdentityStrategy::default(),
            teardown_stale: true,
            line_style: LineStyle::default(),
            anchor: IconAnchor::Bottom,
            max_concurrent_icons: DEFAULT_MAX_CONCURRENT_ICONS,
        }
    }
}

/// An entity that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedEntity {
    /// Position of the feature in the collection.
    pub index: usize,
    /// Why it was skipped.
    pub reason: String,
}

/// Result of reconciling one feed's collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Generation the cycle ran under.
    pub generation: u64,
    /// Geometry source ids registered, in feed order.
    pub sources: Vec<String>,
    /// Icon fetches dispatched.
    pub icons_dispatched: usize,
    /// Outline layers ensured.
    pub outlines: usize,
    /// Entities that were skipped.
    pub rejected: Vec<RejectedEntity>,
    /// Entities torn down because they left the feed.
    pub removed: usize,
    /// Icon fetches from the previous cycle that were aborted.
    pub cancelled_icons: usize,
}

#[derive(Default)]
struct FeedState {
    generation: u64,
    entities: BTreeMap<EntityKey, PrimitiveIds>,
    icon_tasks: JoinSet<()>,
}

enum EntityRender {
    IconDispatched,
    Outlined,
    Plain,
}

/// Reconciles feed collections against the render queue.
pub struct Reconciler<L> {
    queue: RenderHandle,
    loader: Arc<L>,
    events: EventBus,
    settings: ReconcilerSettings,
    permits: Arc<Semaphore>,
    feeds: BTreeMap<FeedType, FeedState>,
}

impl<L> core::fmt::Debug for Reconciler<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Reconciler")
            .field("settings", &self.settings)
            .field("feeds", &self.feeds.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<L: IconLoader> Reconciler<L> {
    /// Create a reconciler sending commands to `queue` and fetching icons
    /// with `loader`.
    pub fn new(
        queue: RenderHandle,
        loader: Arc<L>,
        events: EventBus,
        settings: ReconcilerSettings,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_icons.max(1)));
        Self {
            queue,
            loader,
            events,
            settings,
            permits,
            feeds: BTreeMap::new(),
        }
    }

    /// The reconciler's settings.
    pub const fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// The render queue this reconciler drives.
    pub const fn queue(&self) -> &RenderHandle {
        &self.queue
    }

    /// Reconcile `collection` as the current state of `feed`.
    ///
    /// Returns once every geometry source is registered and every icon fetch
    /// is dispatched. An empty collection removes the feed's primitives
    /// (unless stale teardown is disabled).
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::QueueClosed`] if the render actor is gone.
    /// Per-entity failures are listed in the report instead.
    pub async fn reconcile(
        &mut self,
        feed: FeedType,
        collection: &FeatureCollection,
    ) -> Result<ReconcileReport, RenderError> {
        let mut state = self.feeds.remove(&feed).unwrap_or_default();
        let result = self.reconcile_feed(feed, collection, &mut state).await;
        self.feeds.insert(feed, state);
        result
    }

    /// Remove every primitive `feed` owns and abort its icon fetches.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::QueueClosed`] if the render actor is gone.
    pub async fn clear(&mut self, feed: FeedType) -> Result<ReconcileReport, RenderError> {
        self.reconcile(feed, &FeatureCollection::from_features(Vec::new()))
            .await
    }

    /// Wait for every dispatched icon fetch to finish.
    pub async fn settle(&mut self) {
        for (feed, state) in &mut self.feeds {
            while let Some(joined) = state.icon_tasks.join_next().await {
                if let Some(e) = joined.err().filter(tokio::task::JoinError::is_panic) {
                    warn!(feed = %feed, error = %e, "icon task panicked");
                }
            }
        }
    }

    async fn reconcile_feed(
        &self,
        feed: FeedType,
        collection: &FeatureCollection,
        state: &mut FeedState,
    ) -> Result<ReconcileReport, RenderError> {
        state.generation = state.generation.wrapping_add(1);
        let generation = state.generation;

        let mut previous_tasks = std::mem::take(&mut state.icon_tasks);
        while previous_tasks.try_join_next().is_some() {}
        let cancelled_icons = previous_tasks.len();
        drop(previous_tasks);
        if cancelled_icons > 0 {
            debug!(feed = %feed, count = cancelled_icons, "aborted previous icon fetches");
            self.events.publish(SyncEvent::IconFetchesCancelled {
                feed,
                count: cancelled_icons,
            });
        }

        self.queue.begin_generation(feed, generation).await?;

        let mut report = ReconcileReport {
            generation,
            cancelled_icons,
            ..ReconcileReport::default()
        };
        let mut claimed = BTreeSet::new();
        let mut live = BTreeMap::new();

        for (index, feature) in collection.features().iter().enumerate() {
            let key = self.settings.identity.key_for(index, feature);
            if !claimed.insert(key.clone()) {
                let duplicate = RenderError::DuplicateKey {
                    key: key.to_string(),
                };
                self.reject(feed, index, &duplicate, &mut report);
                continue;
            }
            let ids = PrimitiveIds::for_entity(feed, &key);
            match self
                .render_entity(feed, generation, feature, &ids, &mut state.icon_tasks)
                .await
            {
                Ok(rendered) => {
                    match rendered {
                        EntityRender::IconDispatched => {
                            report.icons_dispatched = report.icons_dispatched.saturating_add(1);
                        }
                        EntityRender::Outlined => {
                            report.outlines = report.outlines.saturating_add(1);
                        }
                        EntityRender::Plain => {}
                    }
                    report.sources.push(ids.source.clone());
                    live.insert(key, ids);
                }
                Err(RenderError::QueueClosed) => return Err(RenderError::QueueClosed),
                Err(e) => self.reject(feed, index, &e, &mut report),
            }
        }

        let previous = std::mem::take(&mut state.entities);
        if self.settings.teardown_stale {
            for (key, ids) in previous {
                if live.contains_key(&key) {
                    continue;
                }
                self.queue.remove(entity_primitives(&ids)).await?;
                debug!(feed = %feed, source_id = %ids.source, "removed stale entity");
                self.events.publish(SyncEvent::EntityRemoved {
                    feed,
                    source_id: ids.source,
                });
                report.removed = report.removed.saturating_add(1);
            }
            state.entities = live;
        } else {
            state.entities = previous;
            state.entities.extend(live);
        }

        info!(
            feed = %feed,
            generation,
            sources = report.sources.len(),
            icons = report.icons_dispatched,
            outlines = report.outlines,
            rejected = report.rejected.len(),
            removed = report.removed,
            "feed reconciled"
        );
        Ok(report)
    }

    async fn render_entity(
        &self,
        feed: FeedType,
        generation: u64,
        feature: &Feature,
        ids: &PrimitiveIds,
        icon_tasks: &mut JoinSet<()>,
    ) -> Result<EntityRender, RenderError> {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| RenderError::InvalidGeometry {
                id: ids.source.clone(),
                source: GeometryError::Missing,
            })?;
        geometry
            .validate()
            .map_err(|source| RenderError::InvalidGeometry {
                id: ids.source.clone(),
                source,
            })?;

        let change = self
            .queue
            .upsert_source(ids.source.clone(), FeatureCollection::single(feature.clone()))
            .await?;
        self.events.publish(SyncEvent::SourceRegistered {
            feed,
            source_id: ids.source.clone(),
            updated: change == SourceChange::Updated,
        });

        match geometry.class() {
            GeometryClass::Marker => {
                self.queue
                    .remove(vec![Primitive::Layer(ids.line_layer.clone())])
                    .await?;
                if let Some(url) = feature.icon_url() {
                    self.dispatch_icon(feed, generation, url, ids, icon_tasks);
                    Ok(EntityRender::IconDispatched)
                } else {
                    self.queue
                        .remove(vec![
                            Primitive::Layer(ids.symbol_layer.clone()),
                            Primitive::Image(ids.image.clone()),
                        ])
                        .await?;
                    self.events.publish(SyncEvent::IconSkipped {
                        feed,
                        source_id: ids.source.clone(),
                    });
                    Ok(EntityRender::Plain)
                }
            }
            GeometryClass::Outline => {
                self.queue
                    .remove(vec![
                        Primitive::Layer(ids.symbol_layer.clone()),
                        Primitive::Image(ids.image.clone()),
                    ])
                    .await?;
                self.queue
                    .ensure_line_layer(LineLayer {
                        id: ids.line_layer.clone(),
                        source_id: ids.source.clone(),
                        style: self.settings.line_style.clone(),
                    })
                    .await?;
                self.events.publish(SyncEvent::OutlineAttached {
                    feed,
                    layer_id: ids.line_layer.clone(),
                });
                Ok(EntityRender::Outlined)
            }
        }
    }

    fn dispatch_icon(
        &self,
        feed: FeedType,
        generation: u64,
        url: &str,
        ids: &PrimitiveIds,
        icon_tasks: &mut JoinSet<()>,
    ) {
        let attachment = IconAttachment {
            feed,
            generation,
            source_id: ids.source.clone(),
            image_id: ids.image.clone(),
            layer_id: ids.symbol_layer.clone(),
            anchor: self.settings.anchor,
        };
        self.events.publish(SyncEvent::IconDispatched {
            feed,
            image_id: ids.image.clone(),
            url: url.to_owned(),
        });
        icon_tasks.spawn(run_icon_task(
            Arc::clone(&self.loader),
            self.queue.clone(),
            self.events.clone(),
            Arc::clone(&self.permits),
            url.to_owned(),
            attachment,
        ));
    }

    fn reject(&self, feed: FeedType, index: usize, error: &RenderError, report: &mut ReconcileReport) {
        warn!(feed = %feed, index, error = %error, "entity skipped");
        self.events.publish(SyncEvent::EntityRejected {
            feed,
            index,
            reason: error.to_string(),
        });
        report.rejected.push(RejectedEntity {
            index,
            reason: error.to_string(),
        });
    }
}

/// Every primitive an entity may own, in teardown order.
fn entity_primitives(ids: &PrimitiveIds) -> Vec<Primitive> {
    vec![
        Primitive::Layer(ids.symbol_layer.clone()),
        Primitive::Layer(ids.line_layer.clone()),
        Primitive::Image(ids.image.clone()),
        Primitive::Source(ids.source.clone()),
    ]
}

async fn run_icon_task<L: IconLoader>(
    loader: Arc<L>,
    queue: RenderHandle,
    events: EventBus,
    permits: Arc<Semaphore>,
    url: String,
    attachment: IconAttachment,
) {
    let icon = {
        let Ok(_permit) = permits.acquire().await else {
            return;
        };
        loader.load(&url).await
    };

    let feed = attachment.feed;
    let image_id = attachment.image_id.clone();
    let layer_id = attachment.layer_id.clone();
    let generation = attachment.generation;
    match queue.attach_icon(attachment, icon).await {
        Ok(IconOutcome::Attached) => {
            debug!(feed = %feed, image_id = %image_id, "icon attached");
            events.publish(SyncEvent::IconAttached {
                feed,
                image_id,
                layer_id,
            });
        }
        Ok(IconOutcome::Detached) => {
            events.publish(SyncEvent::IconMissing { feed, image_id, url });
        }
        Ok(IconOutcome::Stale) => {
            debug!(feed = %feed, image_id = %image_id, generation, "stale icon discarded");
            events.publish(SyncEvent::IconDiscarded {
                feed,
                image_id,
                generation,
            });
        }
        Ok(IconOutcome::Rejected(e)) => {
            warn!(feed = %feed, image_id = %image_id, error = %e, "icon rejected");
            events.publish(SyncEvent::IconRejected {
                feed,
                image_id,
                reason: e.to_string(),
            });
        }
        Err(e) => {
            debug!(feed = %feed, image_id = %image_id, error = %e, "icon dropped");
        }
    }
}
