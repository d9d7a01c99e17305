//! Targeted in-place snapshot updates.
//!
//! A patch merges one changed entity into an already-cached snapshot and
//! never implicitly removes keys; removal happens only through full
//! invalidation. When the key is absent the patch is a no-op and the next
//! read rebuilds fresh.
//!
//! `max_ch_number` is deliberately left untouched here: a character number
//! change is structural and escalates to a rebuild, so the recorded maximum
//! can only go stale in ways a rebuild repairs.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, warn};

use crate::application::repos::{CastingsRepo, ConfigRepo, FactionsRepo};
use crate::domain::entities::{CharacterRecord, EventRecord, RunRecord};
use crate::domain::types::Feature;

use super::builder::{self, CONFIG_HIDE_UNCASTED, SnapshotBuilder};
use super::config::CacheConfig;
use super::dispatcher::EntityChange;
use super::keys::SnapshotKey;
use super::lock;
use super::snapshot::{FactionView, Snapshot};
use super::store::CacheStore;

const METRIC_SNAPSHOT_PATCH_MS: &str = "larpwright_snapshot_patch_ms";
const METRIC_SNAPSHOT_PATCH_TOTAL: &str = "larpwright_snapshot_patch_total";

/// Applies per-entity merges to cached snapshots.
#[derive(Clone)]
pub struct PatchApplier {
    builder: SnapshotBuilder,
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
}

impl PatchApplier {
    pub fn new(builder: SnapshotBuilder, store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self {
            builder,
            store,
            config,
        }
    }

    /// Merge one changed entity into the run's cached snapshot.
    pub async fn patch(&self, event: &EventRecord, run: &RunRecord, change: &EntityChange) {
        if !self.config.is_enabled() {
            return;
        }
        let started_at = Instant::now();
        let key = SnapshotKey::for_run(event, run);

        let patch_lock = lock::acquire(self.store.as_ref(), &key, self.config.lock_ttl()).await;

        let outcome = self.patch_locked(event, run, &key, change).await;

        lock::release(self.store.as_ref(), patch_lock).await;

        counter!(METRIC_SNAPSHOT_PATCH_TOTAL, "kind" => change.kind(), "outcome" => outcome)
            .increment(1);
        histogram!(METRIC_SNAPSHOT_PATCH_MS)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
    }

    async fn patch_locked(
        &self,
        event: &EventRecord,
        run: &RunRecord,
        key: &SnapshotKey,
        change: &EntityChange,
    ) -> &'static str {
        let Some(value) = self.store.get(&key.cache_key()).await else {
            debug!(snapshot_key = %key, kind = change.kind(), "Patch skipped, snapshot absent");
            return "absent";
        };
        let mut snapshot: Snapshot = match serde_json::from_value(value) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(snapshot_key = %key, error = %err, "Cached snapshot is corrupt, deleting");
                self.store.delete(&key.cache_key()).await;
                return "corrupt";
            }
        };

        match change {
            EntityChange::Character { after, .. } => {
                self.patch_character(event, run, &mut snapshot, after).await;
            }
            EntityChange::Faction { after, .. } => {
                match snapshot.factions.get_mut(&after.number) {
                    Some(view) => {
                        view.name = after.name.clone();
                        view.teaser = after.teaser.clone();
                    }
                    None => {
                        snapshot.factions.insert(
                            after.number,
                            FactionView {
                                number: after.number,
                                name: after.name.clone(),
                                typ: after.typ,
                                teaser: after.teaser.clone(),
                                characters: Vec::new(),
                            },
                        );
                        snapshot.fac_mapping.insert(after.number, after.id);
                    }
                }
            }
            EntityChange::QuestType { after, .. } => {
                if let Some(quest_types) = snapshot.quest_types.as_mut()
                    && let Some(view) = quest_types.get_mut(&after.number)
                {
                    view.name = after.name.clone();
                }
            }
            EntityChange::Quest { after, .. } => {
                if let Some(quests) = snapshot.quests.as_mut()
                    && let Some(view) = quests.get_mut(&after.number)
                {
                    view.name = after.name.clone();
                    view.teaser = after.teaser.clone();
                }
            }
            EntityChange::Trait { after, .. } => {
                if let Some(traits) = snapshot.traits.as_mut()
                    && let Some(view) = traits.get_mut(&after.number)
                {
                    view.name = after.name.clone();
                    view.teaser = after.teaser.clone();
                }
            }
            EntityChange::Casting { after, .. } => {
                self.patch_casting(event, run, &mut snapshot, after.character_id)
                    .await;
            }
        }

        let value = match serde_json::to_value(&snapshot) {
            Ok(value) => value,
            Err(err) => {
                warn!(snapshot_key = %key, error = %err, "Snapshot serialization failed, dropping entry");
                self.store.delete(&key.cache_key()).await;
                return "serialize_failed";
            }
        };
        self.store
            .set(&key.cache_key(), value, self.config.snapshot_ttl())
            .await;
        debug!(snapshot_key = %key, kind = change.kind(), "Snapshot patched");
        "patched"
    }

    /// Rebuild the character's view, merge it, then recompute the whole
    /// faction section: membership is derived from views, not stored.
    async fn patch_character(
        &self,
        event: &EventRecord,
        run: &RunRecord,
        snapshot: &mut Snapshot,
        after: &CharacterRecord,
    ) {
        let mut view = self.builder.character_view(event, run, after).await;
        // Trait links belong to the quest section; a character patch must
        // not drop them.
        view.traits = snapshot
            .chars
            .get(&after.number)
            .and_then(|existing| existing.traits.clone());
        snapshot.chars.insert(after.number, view);
        snapshot.char_mapping.insert(after.number, after.id);

        self.refresh_factions(event, snapshot).await;
    }

    /// Recompute only the player/search-derived fields of the affected
    /// character. Trait and quest sections are untouched.
    async fn patch_casting(
        &self,
        event: &EventRecord,
        run: &RunRecord,
        snapshot: &mut Snapshot,
        character_id: uuid::Uuid,
    ) {
        let repos = self.builder.repos();
        let castings = repos.castings(run.id).await.unwrap_or_else(|err| {
            warn!(error = %err, "Casting lookup failed during patch");
            Vec::new()
        });
        let casting = castings.iter().find(|c| c.character_id == character_id);
        let hide_uncasted = repos
            .event_config_bool(event.id, CONFIG_HIDE_UNCASTED, false)
            .await;

        let Some(view) = snapshot
            .chars
            .values_mut()
            .find(|view| view.id == character_id)
        else {
            debug!(%character_id, "Casting patch skipped, character not in snapshot");
            return;
        };
        builder::apply_player_fields(view, casting, hide_uncasted);
    }

    async fn refresh_factions(&self, event: &EventRecord, snapshot: &mut Snapshot) {
        let repos = self.builder.repos();
        let faction_enabled = repos.event_feature(event.id, Feature::Faction).await;
        let faction_records = if faction_enabled {
            let writing_event = self.builder.resolve_writing_event(event).await;
            match repos.factions_of(writing_event.id).await {
                Ok(records) => records,
                Err(err) => {
                    warn!(error = %err, "Faction lookup failed, keeping the previous faction section");
                    return;
                }
            }
        } else {
            Vec::new()
        };
        let (factions, factions_typ, fac_mapping) =
            builder::faction_section(&snapshot.chars, &faction_records, faction_enabled);
        snapshot.factions = factions;
        snapshot.factions_typ = factions_typ;
        snapshot.fac_mapping = fac_mapping;
    }
}
