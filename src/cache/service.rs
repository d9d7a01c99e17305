//! Snapshot service: the facade views, exporters and mutation hooks call.
//!
//! The cache store and entity store are injected collaborators; there is no
//! process-wide singleton. Races between a concurrent patch and a
//! concurrent full invalidation resolve last-write-wins at the store, which
//! is acceptable for a single shared, linearizable store: a patch against an
//! absent key is a no-op, so structural invalidation is never silently
//! overwritten once both operations complete.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::application::repos::{EventsRepo, SnapshotRepos};
use crate::domain::entities::{EventRecord, RunRecord};

use super::builder::SnapshotBuilder;
use super::config::CacheConfig;
use super::dispatcher::{EntityChange, InvalidationDispatcher};
use super::keys::SnapshotKey;
use super::patch::PatchApplier;
use super::snapshot::{RunContext, Snapshot};
use super::store::CacheStore;

const METRIC_SNAPSHOT_HIT_TOTAL: &str = "larpwright_snapshot_hit_total";
const METRIC_SNAPSHOT_MISS_TOTAL: &str = "larpwright_snapshot_miss_total";

/// The snapshot cache subsystem.
///
/// All entry points recover errors locally and return nothing; a degraded
/// snapshot is preferable to a failed request.
#[derive(Clone)]
pub struct SnapshotService {
    repos: Arc<dyn SnapshotRepos>,
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    builder: SnapshotBuilder,
    patcher: PatchApplier,
    dispatcher: InvalidationDispatcher,
}

impl SnapshotService {
    pub fn new(
        repos: Arc<dyn SnapshotRepos>,
        store: Arc<dyn CacheStore>,
        config: CacheConfig,
    ) -> Self {
        let builder = SnapshotBuilder::new(repos.clone());
        let patcher = PatchApplier::new(builder.clone(), store.clone(), config.clone());
        let dispatcher =
            InvalidationDispatcher::new(repos.clone(), store.clone(), patcher.clone());
        Self {
            repos,
            store,
            config,
            builder,
            patcher,
            dispatcher,
        }
    }

    /// Populate the context with its run's snapshot, building on miss.
    #[instrument(skip(self, ctx), fields(event_slug = %ctx.event.slug, run_number = ctx.run.number))]
    pub async fn ensure_snapshot(&self, ctx: &mut RunContext) {
        if ctx.snapshot.is_some() {
            return;
        }
        let key = SnapshotKey::for_run(&ctx.event, &ctx.run);

        if self.config.is_enabled() {
            if let Some(value) = self.store.get(&key.cache_key()).await {
                match serde_json::from_value::<Snapshot>(value) {
                    Ok(snapshot) => {
                        counter!(METRIC_SNAPSHOT_HIT_TOTAL).increment(1);
                        ctx.snapshot = Some(snapshot);
                        return;
                    }
                    Err(err) => {
                        warn!(snapshot_key = %key, error = %err, "Cached snapshot is corrupt, rebuilding");
                        self.store.delete(&key.cache_key()).await;
                    }
                }
            }
            counter!(METRIC_SNAPSHOT_MISS_TOTAL).increment(1);
        }

        let (snapshot, degraded) = self.builder.build_tracked(&ctx.event, &ctx.run).await;
        if self.config.is_enabled() && !degraded {
            match serde_json::to_value(&snapshot) {
                Ok(value) => {
                    self.store
                        .set(&key.cache_key(), value, self.config.snapshot_ttl())
                        .await;
                }
                Err(err) => {
                    warn!(snapshot_key = %key, error = %err, "Snapshot serialization failed, serving uncached");
                }
            }
        } else if degraded {
            debug!(snapshot_key = %key, "Degraded snapshot served without caching");
        }
        ctx.snapshot = Some(snapshot);
    }

    /// Full-invalidate every run of one event.
    pub async fn invalidate_runs_of(&self, event: &EventRecord) {
        self.dispatcher.invalidate_runs_of(event).await;
    }

    /// Full-invalidate a single run, deleting its derived media.
    pub async fn invalidate_run(&self, run: &RunRecord) {
        let Some(event) = self.event_of(run).await else {
            return;
        };
        self.dispatcher.invalidate_run_keyed(&event, run).await;
    }

    /// Merge one changed entity into a single run's cached snapshot.
    pub async fn apply_patch(&self, run: &RunRecord, change: &EntityChange) {
        let Some(event) = self.event_of(run).await else {
            return;
        };
        self.patcher.patch(&event, run, change).await;
    }

    /// Entity-mutation hook: decide patch vs full invalidation.
    pub async fn on_save(&self, event: &EventRecord, change: EntityChange) {
        self.dispatcher.on_save(event, change).await;
    }

    /// Campaign-structure hook: always a family-wide full invalidation.
    pub async fn on_campaign_change(&self, event: &EventRecord) {
        self.dispatcher.on_campaign_change(event).await;
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    async fn event_of(&self, run: &RunRecord) -> Option<EventRecord> {
        match self.repos.event_by_id(run.event_id).await {
            Ok(Some(event)) => Some(event),
            Ok(None) => {
                warn!(run_number = run.number, "Run references a missing event, skipped");
                None
            }
            Err(err) => {
                warn!(run_number = run.number, error = %err, "Event lookup failed, skipped");
                None
            }
        }
    }
}
