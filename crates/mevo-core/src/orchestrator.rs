//! The sync cycle: fetch, parse, and reconcile every configured feed.
//!
//! # Cycle
//!
//! For each feed type, in configured order:
//!
//! 1. **Fetch** the feed over HTTP
//! 2. **Parse** the `{ "data": ... }` envelope
//! 3. **Branch** on the collection: populated collections are reconciled,
//!    an explicitly empty collection clears the feed, and an absent one
//!    (`data: null`, no `features`) leaves the last-known state alone
//!
//! A failure at any stage is logged, published on the event bus, and
//! recorded in the [`CycleSummary`]; the next feed still runs. Only a
//! closed render queue ends the cycle early.

use std::future::Future;
use std::time::Duration;

use mevo_events::{EventBus, FeedStage, SyncEvent};
use mevo_feed::{FeedClient, FetchError, ParseError};
use mevo_render::{ReconcileReport, Reconciler};
use mevo_types::{CollectionContents, CycleId, FeedType, IconLoader};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::error::SyncError;

/// What happened to one feed in a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// The collection had features and was reconciled.
    Populated {
        /// The reconciler's report.
        report: ReconcileReport,
    },
    /// The collection was present but empty; the feed was cleared.
    Empty {
        /// Entities removed by the clear.
        removed: usize,
    },
    /// The envelope carried no usable collection; nothing changed.
    Absent,
    /// The HTTP request failed.
    FetchFailed {
        /// Why.
        error: FetchError,
    },
    /// The body could not be parsed.
    ParseFailed {
        /// Why.
        error: ParseError,
    },
}

impl FeedOutcome {
    /// Whether the feed failed to fetch or parse.
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::ParseFailed { .. })
    }
}

/// Outcome of one feed within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedResult {
    /// The feed.
    pub feed: FeedType,
    /// What happened.
    pub outcome: FeedOutcome,
}

/// Result of one orchestrated cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    /// Cycle identifier, also carried by the cycle's events.
    pub cycle: CycleId,
    /// Per-feed outcomes, in the order the feeds ran.
    pub feeds: Vec<FeedResult>,
}

impl CycleSummary {
    /// Outcome for `feed`, if it ran.
    pub fn outcome(&self, feed: FeedType) -> Option<&FeedOutcome> {
        self.feeds
            .iter()
            .find(|result| result.feed == feed)
            .map(|result| &result.outcome)
    }

    /// Number of feeds that were reconciled.
    pub fn populated(&self) -> usize {
        self.feeds
            .iter()
            .filter(|result| matches!(result.outcome, FeedOutcome::Populated { .. }))
            .count()
    }

    /// Number of feeds that failed to fetch or parse.
    pub fn failed(&self) -> usize {
        self.feeds
            .iter()
            .filter(|result| result.outcome.is_failure())
            .count()
    }
}

/// Totals of a scheduled run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Cycles completed.
    pub cycles: usize,
    /// Summary of the most recent cycle.
    pub last: Option<CycleSummary>,
}

/// Drives sync cycles over the configured feeds.
#[derive(Debug)]
pub struct SyncOrchestrator<L> {
    client: FeedClient,
    reconciler: Reconciler<L>,
    events: EventBus,
    area: String,
    feeds: Vec<FeedType>,
}

impl<L: IconLoader> SyncOrchestrator<L> {
    /// Create an orchestrator syncing `feeds` for `area`.
    pub fn new(
        client: FeedClient,
        reconciler: Reconciler<L>,
        events: EventBus,
        area: impl Into<String>,
        feeds: Vec<FeedType>,
    ) -> Self {
        Self {
            client,
            reconciler,
            events,
            area: area.into(),
            feeds,
        }
    }

    /// The reconciler, for inspecting its render queue.
    pub const fn reconciler(&self) -> &Reconciler<L> {
        &self.reconciler
    }

    /// Run one cycle across every configured feed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Render`] if the render queue has closed. Feed
    /// failures are reported in the summary instead.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary, SyncError> {
        let cycle = CycleId::new();
        info!(cycle = %cycle, area = %self.area, feeds = ?self.feeds, "sync cycle started");
        self.events.publish(SyncEvent::CycleStarted {
            cycle,
            feeds: self.feeds.clone(),
        });

        let mut summary = CycleSummary {
            cycle,
            feeds: Vec::with_capacity(self.feeds.len()),
        };
        for feed in self.feeds.clone() {
            let outcome = self.sync_feed(feed).await?;
            summary.feeds.push(FeedResult { feed, outcome });
        }

        info!(
            cycle = %cycle,
            populated = summary.populated(),
            failed = summary.failed(),
            "sync cycle finished"
        );
        self.events.publish(SyncEvent::CycleFinished {
            cycle,
            populated: summary.populated(),
            failed: summary.failed(),
        });
        Ok(summary)
    }

    async fn sync_feed(&mut self, feed: FeedType) -> Result<FeedOutcome, SyncError> {
        let payload = match self.client.fetch(feed, &self.area).await {
            Ok(payload) => payload,
            Err(error) => {
                warn!(feed = %feed, error = %error, "feed fetch failed");
                self.events.publish(SyncEvent::FeedFailed {
                    feed,
                    stage: FeedStage::Fetch,
                    reason: error.to_string(),
                });
                return Ok(FeedOutcome::FetchFailed { error });
            }
        };

        let collection = match mevo_feed::parse(&payload) {
            Ok(collection) => collection,
            Err(error) => {
                warn!(feed = %feed, url = %payload.url, error = %error, "feed parse failed");
                self.events.publish(SyncEvent::FeedFailed {
                    feed,
                    stage: FeedStage::Parse,
                    reason: error.to_string(),
                });
                return Ok(FeedOutcome::ParseFailed { error });
            }
        };

        match collection.contents() {
            CollectionContents::Absent => {
                info!(feed = %feed, "feed carried no collection, keeping last state");
                self.events.publish(SyncEvent::FeedAbsent { feed });
                Ok(FeedOutcome::Absent)
            }
            CollectionContents::Empty => {
                info!(feed = %feed, "feed is empty");
                self.events.publish(SyncEvent::FeedEmpty { feed });
                let report = self.reconciler.clear(feed).await?;
                Ok(FeedOutcome::Empty {
                    removed: report.removed,
                })
            }
            CollectionContents::Populated(entities) => {
                info!(feed = %feed, entities, "feed populated");
                self.events
                    .publish(SyncEvent::FeedPopulated { feed, entities });
                let report = self.reconciler.reconcile(feed, &collection).await?;
                Ok(FeedOutcome::Populated { report })
            }
        }
    }

    /// Wait for every dispatched icon fetch to finish.
    pub async fn settle_icons(&mut self) {
        self.reconciler.settle().await;
    }

    /// Wait for the surface to report its style ready, run a first cycle,
    /// then repeat every `refresh` until `shutdown` resolves.
    ///
    /// With `refresh` unset, returns after the first cycle. If the
    /// style-ready sender is dropped, or `shutdown` resolves first, no cycle
    /// runs.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Render`] if the render queue closes.
    pub async fn run(
        &mut self,
        style_ready: oneshot::Receiver<()>,
        refresh: Option<Duration>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<RunSummary, SyncError> {
        tokio::pin!(shutdown);
        let mut run = RunSummary::default();

        tokio::select! {
            ready = style_ready => {
                if ready.is_err() {
                    warn!("style-ready signal dropped, not syncing");
                    return Ok(run);
                }
            }
            () = &mut shutdown => {
                info!("shutdown before style ready");
                return Ok(run);
            }
        }

        run.last = Some(self.run_cycle().await?);
        run.cycles = 1;

        let Some(period) = refresh else {
            return Ok(run);
        };
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!(cycles = run.cycles, "shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    run.last = Some(self.run_cycle().await?);
                    run.cycles = run.cycles.saturating_add(1);
                }
            }
        }
        Ok(run)
    }
}
