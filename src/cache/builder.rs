//! Snapshot assembly from the entity store.
//!
//! Builds are deterministic for a fixed store state and never write back to
//! it. A failed section query degrades that section to empty instead of
//! aborting the build; single dangling references are skipped.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::repos::{
    CastingsRepo, CharactersRepo, ConfigRepo, EventsRepo, FactionsRepo, FieldsRepo, QuestsRepo,
    RepoError, SnapshotRepos,
};
use crate::domain::entities::{CastingRecord, CharacterRecord, EventRecord, FactionRecord, RunRecord};
use crate::domain::types::{FactionKind, Feature};

use super::snapshot::{
    CharacterView, FactionView, FieldValue, QuestTypeView, QuestView, Snapshot, TraitView,
};

const METRIC_SNAPSHOT_BUILD_MS: &str = "larpwright_snapshot_build_ms";

/// Event config key: keep a child event's characters separate from its
/// campaign parent.
pub(crate) const CONFIG_CHARACTERS_INDEPENDENT: &str = "campaign_characters_independent";
/// Event config key: mark uncast characters hidden in the gallery.
pub(crate) const CONFIG_HIDE_UNCASTED: &str = "gallery_hide_uncasted_characters";

/// Assembles full snapshots from the entity store.
#[derive(Clone)]
pub struct SnapshotBuilder {
    repos: Arc<dyn SnapshotRepos>,
}

impl SnapshotBuilder {
    pub fn new(repos: Arc<dyn SnapshotRepos>) -> Self {
        Self { repos }
    }

    /// Build the snapshot for one run.
    pub async fn build(&self, event: &EventRecord, run: &RunRecord) -> Snapshot {
        self.build_tracked(event, run).await.0
    }

    /// Build the snapshot, reporting whether any section degraded on a
    /// store error. Degraded snapshots are served but not cached.
    pub(crate) async fn build_tracked(
        &self,
        event: &EventRecord,
        run: &RunRecord,
    ) -> (Snapshot, bool) {
        let started_at = Instant::now();
        let mut degraded = false;

        let writing_event = self.resolve_writing_event(event).await;

        let mut snapshot = Snapshot::default();
        self.build_characters(event, &writing_event, run, &mut snapshot, &mut degraded)
            .await;

        if self.repos.event_feature(event.id, Feature::Character).await {
            self.build_fields(&writing_event, &mut snapshot, &mut degraded)
                .await;
        }

        let faction_enabled = self.repos.event_feature(event.id, Feature::Faction).await;
        let faction_records = if faction_enabled {
            or_empty(
                self.repos.factions_of(writing_event.id).await,
                "factions",
                &mut degraded,
            )
        } else {
            Vec::new()
        };
        let (factions, factions_typ, fac_mapping) =
            faction_section(&snapshot.chars, &faction_records, faction_enabled);
        snapshot.factions = factions;
        snapshot.factions_typ = factions_typ;
        snapshot.fac_mapping = fac_mapping;

        if self
            .repos
            .event_feature(event.id, Feature::QuestBuilder)
            .await
        {
            self.build_quest_section(&writing_event, run, &mut snapshot, &mut degraded)
                .await;
        }

        info!(
            event_slug = %event.slug,
            run_number = run.number,
            characters = snapshot.chars.len(),
            factions = snapshot.factions.len(),
            traits = snapshot.traits.as_ref().map_or(0, |t| t.len()),
            degraded,
            "Snapshot built"
        );
        histogram!(METRIC_SNAPSHOT_BUILD_MS)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        (snapshot, degraded)
    }

    /// Characters come from the campaign parent unless the event keeps them
    /// independent.
    pub(crate) async fn resolve_writing_event(&self, event: &EventRecord) -> EventRecord {
        if event.parent_id.is_none() {
            return event.clone();
        }
        let independent = self
            .repos
            .event_config_bool(event.id, CONFIG_CHARACTERS_INDEPENDENT, false)
            .await;
        if independent {
            return event.clone();
        }
        match self.repos.parent_of(event.id).await {
            Ok(Some(parent)) => parent,
            Ok(None) => event.clone(),
            Err(err) => {
                warn!(event_slug = %event.slug, error = %err, "Parent lookup failed, using the event's own elements");
                event.clone()
            }
        }
    }

    async fn build_characters(
        &self,
        event: &EventRecord,
        writing_event: &EventRecord,
        run: &RunRecord,
        snapshot: &mut Snapshot,
        degraded: &mut bool,
    ) {
        let records = or_empty(
            self.repos.characters_of(writing_event.id).await,
            "characters",
            degraded,
        );
        let castings = or_empty(self.repos.castings(run.id).await, "castings", degraded);
        let mirror_enabled = self.repos.event_feature(event.id, Feature::Mirror).await;
        let hide_uncasted = self
            .repos
            .event_config_bool(event.id, CONFIG_HIDE_UNCASTED, false)
            .await;

        let cast_ids: HashSet<Uuid> = castings.iter().map(|c| c.character_id).collect();
        let casting_by_character: HashMap<Uuid, &CastingRecord> =
            castings.iter().map(|c| (c.character_id, c)).collect();

        for record in &records {
            if record.hide {
                continue;
            }
            // A mirrored character duplicates one already cast in this run.
            if mirror_enabled && record.mirror_id.is_some_and(|m| cast_ids.contains(&m)) {
                continue;
            }
            let view = project_character(
                record,
                casting_by_character.get(&record.id).copied(),
                hide_uncasted,
            );
            snapshot.char_mapping.insert(record.number, record.id);
            snapshot.chars.insert(record.number, view);
        }
        snapshot.max_ch_number = snapshot.chars.keys().max().copied().unwrap_or(0);
    }

    async fn build_fields(
        &self,
        writing_event: &EventRecord,
        snapshot: &mut Snapshot,
        degraded: &mut bool,
    ) {
        let questions = or_empty(
            self.repos.visible_questions(writing_event.id).await,
            "questions",
            degraded,
        );
        let visible: HashSet<Uuid> = questions.iter().map(|q| q.uuid).collect();
        let number_by_id: HashMap<Uuid, u32> = snapshot
            .char_mapping
            .iter()
            .map(|(number, id)| (*id, *number))
            .collect();

        // Choice answers accumulate into per-question lists; rows arrive
        // ordered by question order, then option order.
        let choice_answers = or_empty(
            self.repos.choice_answers(writing_event.id).await,
            "choice_answers",
            degraded,
        );
        for answer in &choice_answers {
            if !visible.contains(&answer.question_uuid) {
                continue;
            }
            let Some(&number) = number_by_id.get(&answer.character_id) else {
                continue;
            };
            let Some(view) = snapshot.chars.get_mut(&number) else {
                continue;
            };
            let entry = view
                .fields
                .entry(answer.question_uuid.to_string())
                .or_insert_with(|| FieldValue::Choices(Vec::new()));
            if let FieldValue::Choices(options) = entry {
                options.push(answer.option_uuid);
            }
        }

        // Text answers overwrite, never append.
        let text_answers = or_empty(
            self.repos.text_answers(writing_event.id).await,
            "text_answers",
            degraded,
        );
        for answer in &text_answers {
            if !visible.contains(&answer.question_uuid) {
                continue;
            }
            let Some(&number) = number_by_id.get(&answer.character_id) else {
                continue;
            };
            let Some(view) = snapshot.chars.get_mut(&number) else {
                continue;
            };
            view.fields.insert(
                answer.question_uuid.to_string(),
                FieldValue::Text(answer.text.clone()),
            );
        }
    }

    async fn build_quest_section(
        &self,
        writing_event: &EventRecord,
        run: &RunRecord,
        snapshot: &mut Snapshot,
        degraded: &mut bool,
    ) {
        let quest_type_records = or_empty(
            self.repos.quest_types_of(writing_event.id).await,
            "quest_types",
            degraded,
        );
        let quest_records = or_empty(
            self.repos.quests_of(writing_event.id).await,
            "quests",
            degraded,
        );
        let trait_records = or_empty(
            self.repos.traits_of(writing_event.id).await,
            "traits",
            degraded,
        );
        let assignment_records = or_empty(
            self.repos.trait_assignments(run.id).await,
            "trait_assignments",
            degraded,
        );

        let quest_types: BTreeMap<u32, QuestTypeView> = quest_type_records
            .iter()
            .map(|record| {
                (
                    record.number,
                    QuestTypeView {
                        number: record.number,
                        name: record.name.clone(),
                    },
                )
            })
            .collect();
        let quests: BTreeMap<u32, QuestView> = quest_records
            .iter()
            .map(|record| {
                (
                    record.number,
                    QuestView {
                        number: record.number,
                        name: record.name.clone(),
                        teaser: record.teaser.clone(),
                        typ: record.typ,
                    },
                )
            })
            .collect();

        let mut traits: BTreeMap<u32, TraitView> = BTreeMap::new();
        for record in &trait_records {
            let Some(quest) = quests.get(&record.quest) else {
                debug!(trait_number = record.number, "Trait references a missing quest, skipped");
                continue;
            };
            let related: Vec<u32> = record
                .related
                .iter()
                .copied()
                .filter(|number| *number != record.number)
                .collect();
            traits.insert(
                record.number,
                TraitView {
                    number: record.number,
                    name: record.name.clone(),
                    teaser: record.teaser.clone(),
                    quest: record.quest,
                    typ: quest.typ,
                    traits: related,
                    char: None,
                },
            );
        }

        for view in snapshot.chars.values_mut() {
            view.traits = Some(Vec::new());
        }

        // Assignments reference players by stable identity, never by
        // internal id.
        let number_by_player: HashMap<Uuid, u32> = snapshot
            .chars
            .values()
            .filter_map(|view| view.player_id.map(|player| (player, view.number)))
            .collect();

        let mut assignments: Vec<_> = assignment_records
            .into_iter()
            .filter(|a| a.active)
            .collect();
        assignments.sort_by_key(|a| a.trait_number);

        for assignment in &assignments {
            let Some(&number) = number_by_player.get(&assignment.member_id) else {
                continue;
            };
            let Some(trait_view) = traits.get_mut(&assignment.trait_number) else {
                continue;
            };
            trait_view.char = Some(number);
            if let Some(view) = snapshot.chars.get_mut(&number)
                && let Some(list) = view.traits.as_mut()
                && !list.contains(&assignment.trait_number)
            {
                list.push(assignment.trait_number);
            }
        }

        snapshot.max_tr_number = Some(traits.keys().max().copied().unwrap_or(0));
        snapshot.quest_types = Some(quest_types);
        snapshot.quests = Some(quests);
        snapshot.traits = Some(traits);
    }

    /// Recompute one character's view: projection, writing fields and
    /// player augmentation. Used by the patch path.
    pub(crate) async fn character_view(
        &self,
        event: &EventRecord,
        run: &RunRecord,
        record: &CharacterRecord,
    ) -> CharacterView {
        let castings = self.repos.castings(run.id).await.unwrap_or_else(|err| {
            warn!(error = %err, "Casting lookup failed while rebuilding a character view");
            Vec::new()
        });
        let casting = castings.iter().find(|c| c.character_id == record.id);
        let hide_uncasted = self
            .repos
            .event_config_bool(event.id, CONFIG_HIDE_UNCASTED, false)
            .await;

        let mut view = project_character(record, casting, hide_uncasted);

        if self.repos.event_feature(event.id, Feature::Character).await {
            let writing_event = self.resolve_writing_event(event).await;
            view.fields = self.fields_for_character(&writing_event, record.id).await;
        }
        view
    }

    async fn fields_for_character(
        &self,
        writing_event: &EventRecord,
        character_id: Uuid,
    ) -> BTreeMap<String, FieldValue> {
        let mut degraded = false;
        let questions = or_empty(
            self.repos.visible_questions(writing_event.id).await,
            "questions",
            &mut degraded,
        );
        let visible: HashSet<Uuid> = questions.iter().map(|q| q.uuid).collect();

        let mut fields = BTreeMap::new();
        let choice_answers = or_empty(
            self.repos.choice_answers(writing_event.id).await,
            "choice_answers",
            &mut degraded,
        );
        for answer in &choice_answers {
            if answer.character_id != character_id || !visible.contains(&answer.question_uuid) {
                continue;
            }
            let entry = fields
                .entry(answer.question_uuid.to_string())
                .or_insert_with(|| FieldValue::Choices(Vec::new()));
            if let FieldValue::Choices(options) = entry {
                options.push(answer.option_uuid);
            }
        }
        let text_answers = or_empty(
            self.repos.text_answers(writing_event.id).await,
            "text_answers",
            &mut degraded,
        );
        for answer in &text_answers {
            if answer.character_id != character_id || !visible.contains(&answer.question_uuid) {
                continue;
            }
            fields.insert(
                answer.question_uuid.to_string(),
                FieldValue::Text(answer.text.clone()),
            );
        }
        fields
    }

    pub(crate) fn repos(&self) -> &Arc<dyn SnapshotRepos> {
        &self.repos
    }
}

fn or_empty<T>(result: Result<Vec<T>, RepoError>, section: &'static str, degraded: &mut bool) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(err) => {
            warn!(section, error = %err, "Entity store query failed, section degraded to empty");
            *degraded = true;
            Vec::new()
        }
    }
}

fn project_character(
    record: &CharacterRecord,
    casting: Option<&CastingRecord>,
    hide_uncasted: bool,
) -> CharacterView {
    let mut view = CharacterView {
        id: record.id,
        number: record.number,
        name: record.name.clone(),
        title: record.title.clone(),
        teaser: record.teaser.clone(),
        text: record.text.clone(),
        fields: BTreeMap::new(),
        player_id: None,
        player_full: None,
        player_prof: None,
        hide: false,
        factions: record.factions.clone(),
        traits: None,
    };
    apply_player_fields(&mut view, casting, hide_uncasted);
    view
}

/// Overwrite the player/search-derived fields of a view from the run's
/// casting state.
pub(crate) fn apply_player_fields(
    view: &mut CharacterView,
    casting: Option<&CastingRecord>,
    hide_uncasted: bool,
) {
    match casting {
        Some(casting) => {
            view.player_id = Some(casting.member_id);
            view.player_full = Some(casting.member_full.clone());
            view.player_prof = Some(casting.member_prof.clone());
            view.hide = false;
        }
        None => {
            view.player_id = None;
            view.player_full = None;
            view.player_prof = None;
            view.hide = hide_uncasted;
        }
    }
}

/// Recompute the faction section from the character views.
///
/// Membership is derived by scanning views, never stored on factions.
/// Factions with no members are pruned; synthetic faction 0 collects
/// characters without an assigned primary faction, or every character when
/// the faction feature is off.
pub(crate) fn faction_section(
    chars: &BTreeMap<u32, CharacterView>,
    faction_records: &[FactionRecord],
    faction_enabled: bool,
) -> (
    BTreeMap<u32, FactionView>,
    BTreeMap<FactionKind, Vec<u32>>,
    BTreeMap<u32, Uuid>,
) {
    let mut factions = BTreeMap::new();
    let mut factions_typ: BTreeMap<FactionKind, Vec<u32>> = BTreeMap::new();
    let mut fac_mapping = BTreeMap::new();

    if !faction_enabled {
        let members: Vec<u32> = chars
            .values()
            .filter(|view| !view.hide)
            .map(|view| view.number)
            .collect();
        if !members.is_empty() {
            factions.insert(0, synthetic_faction(members));
            factions_typ.entry(FactionKind::Primary).or_default().push(0);
        }
        return (factions, factions_typ, fac_mapping);
    }

    let unassigned: Vec<u32> = chars
        .values()
        .filter(|view| !view.hide && view.factions.contains(&0))
        .map(|view| view.number)
        .collect();
    if !unassigned.is_empty() {
        factions.insert(0, synthetic_faction(unassigned));
        factions_typ.entry(FactionKind::Primary).or_default().push(0);
    }

    for record in faction_records {
        let members: Vec<u32> = chars
            .values()
            .filter(|view| !view.hide && view.factions.contains(&record.number))
            .map(|view| view.number)
            .collect();
        if members.is_empty() {
            continue;
        }
        factions.insert(
            record.number,
            FactionView {
                number: record.number,
                name: record.name.clone(),
                typ: record.typ,
                teaser: record.teaser.clone(),
                characters: members,
            },
        );
        factions_typ.entry(record.typ).or_default().push(record.number);
        fac_mapping.insert(record.number, record.id);
    }

    (factions, factions_typ, fac_mapping)
}

fn synthetic_faction(characters: Vec<u32>) -> FactionView {
    FactionView {
        number: 0,
        name: String::new(),
        typ: FactionKind::Primary,
        teaser: String::new(),
        characters,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn view(number: u32, factions: &[u32], hide: bool) -> CharacterView {
        CharacterView {
            id: Uuid::new_v4(),
            number,
            name: format!("Character {number}"),
            title: None,
            teaser: String::new(),
            text: String::new(),
            fields: BTreeMap::new(),
            player_id: None,
            player_full: None,
            player_prof: None,
            hide,
            factions: factions.iter().copied().collect(),
            traits: None,
        }
    }

    fn faction_record(number: u32, typ: FactionKind, order: i32) -> FactionRecord {
        FactionRecord {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            number,
            name: format!("Faction {number}"),
            teaser: String::new(),
            typ,
            order,
        }
    }

    fn chars(views: Vec<CharacterView>) -> BTreeMap<u32, CharacterView> {
        views.into_iter().map(|v| (v.number, v)).collect()
    }

    #[test]
    fn disabled_feature_yields_single_synthetic_faction() {
        let chars = chars(vec![view(1, &[0], false), view(2, &[5], false)]);
        let records = vec![faction_record(5, FactionKind::Primary, 1)];

        let (factions, factions_typ, fac_mapping) = faction_section(&chars, &records, false);

        assert_eq!(factions.len(), 1);
        assert_eq!(factions[&0].characters, vec![1, 2]);
        assert_eq!(factions_typ[&FactionKind::Primary], vec![0]);
        assert!(fac_mapping.is_empty());
    }

    #[test]
    fn membership_is_derived_from_views() {
        let chars = chars(vec![
            view(1, &[0], false),
            view(2, &[5], false),
            view(3, &[0], false),
        ]);
        let records = vec![faction_record(5, FactionKind::Primary, 1)];

        let (factions, _, fac_mapping) = faction_section(&chars, &records, true);

        assert_eq!(factions[&5].characters, vec![2]);
        assert_eq!(factions[&0].characters, vec![1, 3]);
        assert_eq!(fac_mapping[&5], records[0].id);
    }

    #[test]
    fn empty_factions_are_pruned() {
        let chars = chars(vec![view(1, &[5], false)]);
        let records = vec![
            faction_record(5, FactionKind::Primary, 1),
            faction_record(6, FactionKind::Primary, 2),
        ];

        let (factions, factions_typ, _) = faction_section(&chars, &records, true);

        assert!(factions.contains_key(&5));
        assert!(!factions.contains_key(&6));
        // No character lacks a primary faction, so no synthetic bucket.
        assert!(!factions.contains_key(&0));
        assert_eq!(factions_typ[&FactionKind::Primary], vec![5]);
    }

    #[test]
    fn hidden_characters_never_appear_in_membership() {
        let chars = chars(vec![view(1, &[5], false), view(2, &[5], true)]);
        let records = vec![faction_record(5, FactionKind::Primary, 1)];

        let (factions, _, _) = faction_section(&chars, &records, true);

        assert_eq!(factions[&5].characters, vec![1]);
    }

    #[test]
    fn faction_types_group_in_order() {
        let chars = chars(vec![view(1, &[5, 6, 7], false)]);
        let records = vec![
            faction_record(7, FactionKind::Transversal, 1),
            faction_record(5, FactionKind::Primary, 2),
            faction_record(6, FactionKind::Primary, 3),
        ];

        let (_, factions_typ, _) = faction_section(&chars, &records, true);

        assert_eq!(factions_typ[&FactionKind::Transversal], vec![7]);
        assert_eq!(factions_typ[&FactionKind::Primary], vec![5, 6]);
    }

    #[test]
    fn player_fields_follow_cast_state() {
        let mut view = view(1, &[0], false);
        let casting = CastingRecord {
            run_id: Uuid::new_v4(),
            character_id: view.id,
            member_id: Uuid::new_v4(),
            member_full: "Jo Doe".into(),
            member_prof: "jo-doe".into(),
        };

        apply_player_fields(&mut view, Some(&casting), true);
        assert_eq!(view.player_id, Some(casting.member_id));
        assert_eq!(view.player_full.as_deref(), Some("Jo Doe"));
        assert!(!view.hide);

        apply_player_fields(&mut view, None, true);
        assert_eq!(view.player_id, None);
        assert_eq!(view.player_full, None);
        assert!(view.hide);

        apply_player_fields(&mut view, None, false);
        assert!(!view.hide);
    }

    #[test]
    fn projection_copies_record_fields() {
        let record = CharacterRecord {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            number: 4,
            name: "Maela".into(),
            title: Some("Warden".into()),
            teaser: "A quiet sentinel".into(),
            text: "Full sheet".into(),
            hide: false,
            mirror_id: None,
            player_id: None,
            factions: BTreeSet::from([0, 9]),
        };

        let view = project_character(&record, None, false);

        assert_eq!(view.id, record.id);
        assert_eq!(view.number, 4);
        assert_eq!(view.title.as_deref(), Some("Warden"));
        assert_eq!(view.factions, BTreeSet::from([0, 9]));
        assert!(view.fields.is_empty());
        assert!(view.traits.is_none());
    }
}
