//! In-memory entity store.
//!
//! Backs tests and single-process embedding: every repository trait is
//! implemented over plain maps behind one lock. Enumeration methods return
//! rows in the orders the traits document.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{
    CastingsRepo, CharactersRepo, ConfigRepo, EventsRepo, FactionsRepo, FieldsRepo, MediaRepo,
    QuestsRepo, RepoError,
};
use crate::domain::entities::{
    CastingRecord, CharacterRecord, ChoiceAnswerRecord, EventRecord, FactionRecord, QuestRecord,
    QuestTypeRecord, RunRecord, TextAnswerRecord, TraitAssignmentRecord, TraitRecord,
    WritingQuestionRecord,
};
use crate::domain::types::Feature;

#[derive(Default)]
struct Inner {
    events: HashMap<Uuid, EventRecord>,
    runs: Vec<RunRecord>,
    characters: Vec<CharacterRecord>,
    factions: Vec<FactionRecord>,
    quest_types: Vec<QuestTypeRecord>,
    quests: Vec<QuestRecord>,
    traits: Vec<TraitRecord>,
    castings: Vec<CastingRecord>,
    trait_assignments: Vec<TraitAssignmentRecord>,
    questions: Vec<WritingQuestionRecord>,
    text_answers: Vec<TextAnswerRecord>,
    choice_answers: Vec<ChoiceAnswerRecord>,
    features: HashSet<(Uuid, Feature)>,
    config_bools: HashMap<(Uuid, String), bool>,
    deleted_media: Vec<(String, u32)>,
}

/// Entity store over plain maps.
#[derive(Default)]
pub struct MemoryRepositories {
    inner: RwLock<Inner>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_event(&self, record: EventRecord) {
        self.inner.write().unwrap().events.insert(record.id, record);
    }

    pub fn upsert_run(&self, record: RunRecord) {
        let mut inner = self.inner.write().unwrap();
        inner.runs.retain(|r| r.id != record.id);
        inner.runs.push(record);
    }

    pub fn upsert_character(&self, record: CharacterRecord) {
        let mut inner = self.inner.write().unwrap();
        inner.characters.retain(|c| c.id != record.id);
        inner.characters.push(record);
    }

    pub fn upsert_faction(&self, record: FactionRecord) {
        let mut inner = self.inner.write().unwrap();
        inner.factions.retain(|f| f.id != record.id);
        inner.factions.push(record);
    }

    pub fn upsert_quest_type(&self, record: QuestTypeRecord) {
        let mut inner = self.inner.write().unwrap();
        inner.quest_types.retain(|q| q.id != record.id);
        inner.quest_types.push(record);
    }

    pub fn upsert_quest(&self, record: QuestRecord) {
        let mut inner = self.inner.write().unwrap();
        inner.quests.retain(|q| q.id != record.id);
        inner.quests.push(record);
    }

    pub fn upsert_trait(&self, record: TraitRecord) {
        let mut inner = self.inner.write().unwrap();
        inner.traits.retain(|t| t.id != record.id);
        inner.traits.push(record);
    }

    pub fn upsert_casting(&self, record: CastingRecord) {
        let mut inner = self.inner.write().unwrap();
        inner
            .castings
            .retain(|c| !(c.run_id == record.run_id && c.character_id == record.character_id));
        inner.castings.push(record);
    }

    pub fn remove_casting(&self, run_id: Uuid, character_id: Uuid) {
        self.inner
            .write()
            .unwrap()
            .castings
            .retain(|c| !(c.run_id == run_id && c.character_id == character_id));
    }

    pub fn upsert_trait_assignment(&self, record: TraitAssignmentRecord) {
        let mut inner = self.inner.write().unwrap();
        inner
            .trait_assignments
            .retain(|a| !(a.run_id == record.run_id && a.trait_number == record.trait_number));
        inner.trait_assignments.push(record);
    }

    pub fn upsert_question(&self, record: WritingQuestionRecord) {
        let mut inner = self.inner.write().unwrap();
        inner.questions.retain(|q| q.uuid != record.uuid);
        inner.questions.push(record);
    }

    pub fn upsert_text_answer(&self, record: TextAnswerRecord) {
        let mut inner = self.inner.write().unwrap();
        inner.text_answers.retain(|a| {
            !(a.question_uuid == record.question_uuid && a.character_id == record.character_id)
        });
        inner.text_answers.push(record);
    }

    pub fn add_choice_answer(&self, record: ChoiceAnswerRecord) {
        self.inner.write().unwrap().choice_answers.push(record);
    }

    pub fn enable_feature(&self, event_id: Uuid, feature: Feature) {
        self.inner.write().unwrap().features.insert((event_id, feature));
    }

    pub fn set_config_bool(&self, event_id: Uuid, key: &str, value: bool) {
        self.inner
            .write()
            .unwrap()
            .config_bools
            .insert((event_id, key.to_string()), value);
    }

    /// (event slug, run number) pairs whose derived media was deleted.
    pub fn deleted_media(&self) -> Vec<(String, u32)> {
        self.inner.read().unwrap().deleted_media.clone()
    }
}

#[async_trait]
impl EventsRepo for MemoryRepositories {
    async fn event_by_id(&self, event_id: Uuid) -> Result<Option<EventRecord>, RepoError> {
        Ok(self.inner.read().unwrap().events.get(&event_id).cloned())
    }

    async fn runs_of(&self, event_id: Uuid) -> Result<Vec<RunRecord>, RepoError> {
        let mut runs: Vec<_> = self
            .inner
            .read()
            .unwrap()
            .runs
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.number);
        Ok(runs)
    }

    async fn children_of(&self, event_id: Uuid) -> Result<Vec<EventRecord>, RepoError> {
        let mut children: Vec<_> = self
            .inner
            .read()
            .unwrap()
            .events
            .values()
            .filter(|e| e.parent_id == Some(event_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(children)
    }

    async fn parent_of(&self, event_id: Uuid) -> Result<Option<EventRecord>, RepoError> {
        let inner = self.inner.read().unwrap();
        let parent = inner
            .events
            .get(&event_id)
            .and_then(|e| e.parent_id)
            .and_then(|parent_id| inner.events.get(&parent_id))
            .cloned();
        Ok(parent)
    }
}

#[async_trait]
impl CharactersRepo for MemoryRepositories {
    async fn characters_of(&self, event_id: Uuid) -> Result<Vec<CharacterRecord>, RepoError> {
        let mut characters: Vec<_> = self
            .inner
            .read()
            .unwrap()
            .characters
            .iter()
            .filter(|c| c.event_id == event_id)
            .cloned()
            .collect();
        characters.sort_by_key(|c| c.number);
        Ok(characters)
    }

    async fn character_by_id(
        &self,
        character_id: Uuid,
    ) -> Result<Option<CharacterRecord>, RepoError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .characters
            .iter()
            .find(|c| c.id == character_id)
            .cloned())
    }
}

#[async_trait]
impl FactionsRepo for MemoryRepositories {
    async fn factions_of(&self, event_id: Uuid) -> Result<Vec<FactionRecord>, RepoError> {
        let mut factions: Vec<_> = self
            .inner
            .read()
            .unwrap()
            .factions
            .iter()
            .filter(|f| f.event_id == event_id)
            .cloned()
            .collect();
        factions.sort_by_key(|f| f.order);
        Ok(factions)
    }
}

#[async_trait]
impl QuestsRepo for MemoryRepositories {
    async fn quest_types_of(&self, event_id: Uuid) -> Result<Vec<QuestTypeRecord>, RepoError> {
        let mut quest_types: Vec<_> = self
            .inner
            .read()
            .unwrap()
            .quest_types
            .iter()
            .filter(|q| q.event_id == event_id)
            .cloned()
            .collect();
        quest_types.sort_by_key(|q| q.number);
        Ok(quest_types)
    }

    async fn quests_of(&self, event_id: Uuid) -> Result<Vec<QuestRecord>, RepoError> {
        let mut quests: Vec<_> = self
            .inner
            .read()
            .unwrap()
            .quests
            .iter()
            .filter(|q| q.event_id == event_id)
            .cloned()
            .collect();
        quests.sort_by_key(|q| q.number);
        Ok(quests)
    }

    async fn traits_of(&self, event_id: Uuid) -> Result<Vec<TraitRecord>, RepoError> {
        let mut traits: Vec<_> = self
            .inner
            .read()
            .unwrap()
            .traits
            .iter()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect();
        traits.sort_by_key(|t| t.number);
        Ok(traits)
    }
}

#[async_trait]
impl CastingsRepo for MemoryRepositories {
    async fn castings(&self, run_id: Uuid) -> Result<Vec<CastingRecord>, RepoError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .castings
            .iter()
            .filter(|c| c.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn trait_assignments(
        &self,
        run_id: Uuid,
    ) -> Result<Vec<TraitAssignmentRecord>, RepoError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .trait_assignments
            .iter()
            .filter(|a| a.run_id == run_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FieldsRepo for MemoryRepositories {
    async fn visible_questions(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<WritingQuestionRecord>, RepoError> {
        let mut questions: Vec<_> = self
            .inner
            .read()
            .unwrap()
            .questions
            .iter()
            .filter(|q| q.event_id == event_id && q.visible)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.order);
        Ok(questions)
    }

    async fn text_answers(&self, event_id: Uuid) -> Result<Vec<TextAnswerRecord>, RepoError> {
        let inner = self.inner.read().unwrap();
        let event_questions: HashSet<Uuid> = inner
            .questions
            .iter()
            .filter(|q| q.event_id == event_id)
            .map(|q| q.uuid)
            .collect();
        Ok(inner
            .text_answers
            .iter()
            .filter(|a| event_questions.contains(&a.question_uuid))
            .cloned()
            .collect())
    }

    async fn choice_answers(&self, event_id: Uuid) -> Result<Vec<ChoiceAnswerRecord>, RepoError> {
        let inner = self.inner.read().unwrap();
        let question_order: HashMap<Uuid, i32> = inner
            .questions
            .iter()
            .filter(|q| q.event_id == event_id)
            .map(|q| (q.uuid, q.order))
            .collect();
        let mut answers: Vec<_> = inner
            .choice_answers
            .iter()
            .filter(|a| question_order.contains_key(&a.question_uuid))
            .cloned()
            .collect();
        answers.sort_by_key(|a| (question_order[&a.question_uuid], a.option_order));
        Ok(answers)
    }
}

#[async_trait]
impl ConfigRepo for MemoryRepositories {
    async fn event_feature(&self, event_id: Uuid, feature: Feature) -> bool {
        self.inner
            .read()
            .unwrap()
            .features
            .contains(&(event_id, feature))
    }

    async fn event_config_bool(&self, event_id: Uuid, key: &str, default: bool) -> bool {
        self.inner
            .read()
            .unwrap()
            .config_bools
            .get(&(event_id, key.to_string()))
            .copied()
            .unwrap_or(default)
    }
}

#[async_trait]
impl MediaRepo for MemoryRepositories {
    async fn delete_run_media(&self, event_slug: &str, run_number: u32) -> Result<(), RepoError> {
        self.inner
            .write()
            .unwrap()
            .deleted_media
            .push((event_slug.to_string(), run_number));
        Ok(())
    }
}
