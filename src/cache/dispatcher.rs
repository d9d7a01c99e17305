//! Invalidation decisions and campaign-family propagation.
//!
//! Every entity-mutation call site hands the dispatcher a before/after pair.
//! The decision is computed as a pure [`PlanAction`] from per-kind attribute
//! whitelists: structural differences (business-key renumbering and other
//! identity-affecting changes) escalate to full invalidation of the whole
//! campaign family, display differences delegate to the patch applier, and
//! anything else is a no-op.

use std::collections::HashSet;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::repos::{EventsRepo, MediaRepo, SnapshotRepos};
use crate::domain::entities::{
    CastingRecord, CharacterRecord, EventRecord, FactionRecord, QuestRecord, QuestTypeRecord,
    RunRecord, TraitRecord,
};

use super::keys::SnapshotKey;
use super::patch::PatchApplier;
use super::store::CacheStore;

const METRIC_SNAPSHOT_INVALIDATE_TOTAL: &str = "larpwright_snapshot_invalidate_total";

/// A saved entity with its prior state. `before` is `None` for entities
/// that had no prior identity.
#[derive(Debug, Clone)]
pub enum EntityChange {
    Character {
        before: Option<CharacterRecord>,
        after: CharacterRecord,
    },
    Faction {
        before: Option<FactionRecord>,
        after: FactionRecord,
    },
    QuestType {
        before: Option<QuestTypeRecord>,
        after: QuestTypeRecord,
    },
    Quest {
        before: Option<QuestRecord>,
        after: QuestRecord,
    },
    Trait {
        before: Option<TraitRecord>,
        after: TraitRecord,
    },
    Casting {
        before: Option<CastingRecord>,
        after: CastingRecord,
    },
}

impl EntityChange {
    pub fn kind(&self) -> &'static str {
        match self {
            EntityChange::Character { .. } => "character",
            EntityChange::Faction { .. } => "faction",
            EntityChange::QuestType { .. } => "quest_type",
            EntityChange::Quest { .. } => "quest",
            EntityChange::Trait { .. } => "trait",
            EntityChange::Casting { .. } => "casting",
        }
    }
}

/// Outcome of the structural-vs-display decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    /// Delete the snapshot across the campaign family.
    Rebuild,
    /// Merge the change into cached snapshots in place.
    Patch,
    /// Neither whitelist differs.
    Skip,
}

/// Decide what a save requires. New entities always rebuild: the patch's
/// merge-by-number assumption has nothing to merge into.
pub fn plan_for(change: &EntityChange) -> PlanAction {
    match change {
        EntityChange::Character {
            before: Some(before),
            after,
        } => {
            let structural = before.number != after.number
                || before.player_id != after.player_id
                || before.mirror_id != after.mirror_id
                || before.hide != after.hide
                || before.factions != after.factions;
            let display = before.name != after.name
                || before.title != after.title
                || before.teaser != after.teaser
                || before.text != after.text;
            decide(structural, display)
        }
        EntityChange::Faction {
            before: Some(before),
            after,
        } => {
            let structural = before.number != after.number
                || before.typ != after.typ
                || before.order != after.order;
            let display = before.name != after.name || before.teaser != after.teaser;
            decide(structural, display)
        }
        EntityChange::QuestType {
            before: Some(before),
            after,
        } => decide(before.number != after.number, before.name != after.name),
        EntityChange::Quest {
            before: Some(before),
            after,
        } => {
            let structural = before.number != after.number || before.typ != after.typ;
            let display = before.name != after.name || before.teaser != after.teaser;
            decide(structural, display)
        }
        EntityChange::Trait {
            before: Some(before),
            after,
        } => {
            let structural = before.number != after.number
                || before.quest != after.quest
                || before.related != after.related;
            let display = before.name != after.name || before.teaser != after.teaser;
            decide(structural, display)
        }
        EntityChange::Casting {
            before: Some(before),
            after,
        } => {
            let structural = before.character_id != after.character_id
                || before.run_id != after.run_id;
            let display = before.member_id != after.member_id
                || before.member_full != after.member_full
                || before.member_prof != after.member_prof;
            decide(structural, display)
        }
        _ => PlanAction::Rebuild,
    }
}

fn decide(structural: bool, display: bool) -> PlanAction {
    if structural {
        PlanAction::Rebuild
    } else if display {
        PlanAction::Patch
    } else {
        PlanAction::Skip
    }
}

/// Routes saves to patch or full invalidation and cascades deletions over
/// the campaign family.
#[derive(Clone)]
pub struct InvalidationDispatcher {
    repos: Arc<dyn SnapshotRepos>,
    store: Arc<dyn CacheStore>,
    patcher: PatchApplier,
}

impl InvalidationDispatcher {
    pub fn new(
        repos: Arc<dyn SnapshotRepos>,
        store: Arc<dyn CacheStore>,
        patcher: PatchApplier,
    ) -> Self {
        Self {
            repos,
            store,
            patcher,
        }
    }

    /// Entity-mutation hook. Patches apply to every run of the event;
    /// structural changes invalidate the whole campaign family.
    #[instrument(skip(self, change), fields(event_slug = %event.slug, kind = change.kind()))]
    pub async fn on_save(&self, event: &EventRecord, change: EntityChange) {
        match plan_for(&change) {
            PlanAction::Rebuild => self.invalidate_family(event).await,
            PlanAction::Patch => {
                let runs = match self.repos.runs_of(event.id).await {
                    Ok(runs) => runs,
                    Err(err) => {
                        warn!(error = %err, "Run enumeration failed, escalating to full invalidation");
                        self.invalidate_family(event).await;
                        return;
                    }
                };
                for run in &runs {
                    self.patcher.patch(event, run, &change).await;
                }
            }
            PlanAction::Skip => {
                debug!("No whitelisted attribute changed, cache untouched");
            }
        }
    }

    /// Campaign-wide hook: structure of the family itself changed.
    #[instrument(skip(self), fields(event_slug = %event.slug))]
    pub async fn on_campaign_change(&self, event: &EventRecord) {
        self.invalidate_family(event).await;
    }

    /// Delete the snapshots of every run of the event's campaign family:
    /// the event itself, its children, and (when a parent exists) the
    /// parent and all siblings. Inherited characters and factions make any
    /// of those snapshots a stale copy of the same data.
    pub async fn invalidate_family(&self, event: &EventRecord) {
        let mut family: Vec<EventRecord> = vec![event.clone()];

        match self.repos.children_of(event.id).await {
            Ok(children) => family.extend(children),
            Err(err) => warn!(error = %err, "Child enumeration failed during cascade"),
        }
        match self.repos.parent_of(event.id).await {
            Ok(Some(parent)) => {
                match self.repos.children_of(parent.id).await {
                    Ok(siblings) => family.extend(siblings),
                    Err(err) => warn!(error = %err, "Sibling enumeration failed during cascade"),
                }
                family.push(parent);
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "Parent lookup failed during cascade"),
        }

        let mut seen: HashSet<Uuid> = HashSet::new();
        for member in family {
            if !seen.insert(member.id) {
                continue;
            }
            self.invalidate_runs_of(&member).await;
        }
    }

    /// Full-invalidate every run of one event.
    pub async fn invalidate_runs_of(&self, event: &EventRecord) {
        let runs = match self.repos.runs_of(event.id).await {
            Ok(runs) => runs,
            Err(err) => {
                warn!(event_slug = %event.slug, error = %err, "Run enumeration failed, nothing invalidated");
                return;
            }
        };
        for run in &runs {
            self.invalidate_run_keyed(event, run).await;
        }
    }

    /// Full-invalidate one run and delete its derived media: exported PDFs
    /// embed the snapshot and carry no staleness signal of their own.
    pub async fn invalidate_run_keyed(&self, event: &EventRecord, run: &RunRecord) {
        let key = SnapshotKey::for_run(event, run);
        self.store.delete(&key.cache_key()).await;
        if let Err(err) = self
            .repos
            .delete_run_media(&event.slug, run.number)
            .await
        {
            warn!(snapshot_key = %key, error = %err, "Derived media deletion failed");
        }
        counter!(METRIC_SNAPSHOT_INVALIDATE_TOTAL).increment(1);
        info!(snapshot_key = %key, "Snapshot invalidated");
    }
}
