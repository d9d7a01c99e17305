#![allow(dead_code)]

//! Shared fixture: an in-memory entity store and cache wired into the
//! snapshot service.

use std::sync::Arc;

use uuid::Uuid;

use larpwright::cache::{
    CacheConfig, CacheStore, MemoryCache, RunContext, Snapshot, SnapshotKey, SnapshotService,
};
use larpwright::domain::entities::{
    CastingRecord, CharacterRecord, ChoiceAnswerRecord, EventRecord, FactionRecord, QuestRecord,
    QuestTypeRecord, RunRecord, TextAnswerRecord, TraitAssignmentRecord, TraitRecord,
    WritingQuestionRecord,
};
use larpwright::domain::types::{FactionKind, Feature, QuestionKind};
use larpwright::infra::memory::MemoryRepositories;

pub struct World {
    pub repos: Arc<MemoryRepositories>,
    pub store: Arc<MemoryCache>,
    pub service: SnapshotService,
    pub event: EventRecord,
    pub run: RunRecord,
}

pub fn world(slug: &str) -> World {
    world_with_config(slug, CacheConfig::default())
}

pub fn world_with_config(slug: &str, config: CacheConfig) -> World {
    let repos = Arc::new(MemoryRepositories::new());
    let store = Arc::new(MemoryCache::new());
    let service = SnapshotService::new(repos.clone(), store.clone(), config);

    let event = EventRecord {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        name: slug.to_string(),
        parent_id: None,
    };
    repos.upsert_event(event.clone());
    let run = RunRecord {
        id: Uuid::new_v4(),
        event_id: event.id,
        number: 1,
    };
    repos.upsert_run(run.clone());

    World {
        repos,
        store,
        service,
        event,
        run,
    }
}

impl World {
    pub fn enable(&self, feature: Feature) {
        self.repos.enable_feature(self.event.id, feature);
    }

    pub fn add_character(&self, number: u32, factions: &[u32]) -> CharacterRecord {
        self.add_character_to(&self.event, number, factions)
    }

    pub fn add_character_to(
        &self,
        event: &EventRecord,
        number: u32,
        factions: &[u32],
    ) -> CharacterRecord {
        let record = CharacterRecord {
            id: Uuid::new_v4(),
            event_id: event.id,
            number,
            name: format!("Character {number}"),
            title: None,
            teaser: String::new(),
            text: String::new(),
            hide: false,
            mirror_id: None,
            player_id: None,
            factions: factions.iter().copied().collect(),
        };
        self.repos.upsert_character(record.clone());
        record
    }

    pub fn add_faction(&self, number: u32, name: &str, typ: FactionKind, order: i32) -> FactionRecord {
        let record = FactionRecord {
            id: Uuid::new_v4(),
            event_id: self.event.id,
            number,
            name: name.to_string(),
            teaser: String::new(),
            typ,
            order,
        };
        self.repos.upsert_faction(record.clone());
        record
    }

    pub fn add_quest_type(&self, number: u32, name: &str) -> QuestTypeRecord {
        let record = QuestTypeRecord {
            id: Uuid::new_v4(),
            event_id: self.event.id,
            number,
            name: name.to_string(),
        };
        self.repos.upsert_quest_type(record.clone());
        record
    }

    pub fn add_quest(&self, number: u32, name: &str, typ: u32) -> QuestRecord {
        let record = QuestRecord {
            id: Uuid::new_v4(),
            event_id: self.event.id,
            number,
            name: name.to_string(),
            teaser: String::new(),
            typ,
        };
        self.repos.upsert_quest(record.clone());
        record
    }

    pub fn add_trait(&self, number: u32, name: &str, quest: u32, related: &[u32]) -> TraitRecord {
        let record = TraitRecord {
            id: Uuid::new_v4(),
            event_id: self.event.id,
            number,
            name: name.to_string(),
            teaser: String::new(),
            quest,
            related: related.iter().copied().collect(),
        };
        self.repos.upsert_trait(record.clone());
        record
    }

    pub fn cast(&self, character: &CharacterRecord, full: &str) -> CastingRecord {
        let record = CastingRecord {
            run_id: self.run.id,
            character_id: character.id,
            member_id: Uuid::new_v4(),
            member_full: full.to_string(),
            member_prof: full.to_lowercase().replace(' ', "-"),
        };
        self.repos.upsert_casting(record.clone());
        record
    }

    pub fn assign_trait(&self, trait_number: u32, member_id: Uuid) {
        self.repos.upsert_trait_assignment(TraitAssignmentRecord {
            run_id: self.run.id,
            trait_number,
            member_id,
            active: true,
        });
    }

    pub fn add_question(&self, kind: QuestionKind, order: i32) -> WritingQuestionRecord {
        let record = WritingQuestionRecord {
            uuid: Uuid::new_v4(),
            event_id: self.event.id,
            kind,
            order,
            visible: true,
        };
        self.repos.upsert_question(record.clone());
        record
    }

    pub fn answer_text(&self, question: &WritingQuestionRecord, character: &CharacterRecord, text: &str) {
        self.repos.upsert_text_answer(TextAnswerRecord {
            question_uuid: question.uuid,
            character_id: character.id,
            text: text.to_string(),
        });
    }

    pub fn answer_choice(
        &self,
        question: &WritingQuestionRecord,
        character: &CharacterRecord,
        option_order: i32,
    ) -> Uuid {
        let option_uuid = Uuid::new_v4();
        self.repos.add_choice_answer(ChoiceAnswerRecord {
            question_uuid: question.uuid,
            character_id: character.id,
            option_uuid,
            option_order,
        });
        option_uuid
    }

    /// A child event of this world's event, with one run.
    pub fn add_child_event(&self, slug: &str) -> (EventRecord, RunRecord) {
        let child = EventRecord {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: slug.to_string(),
            parent_id: Some(self.event.id),
        };
        self.repos.upsert_event(child.clone());
        let run = RunRecord {
            id: Uuid::new_v4(),
            event_id: child.id,
            number: 1,
        };
        self.repos.upsert_run(run.clone());
        (child, run)
    }

    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::for_run(&self.event, &self.run)
    }

    pub async fn snapshot(&self) -> Snapshot {
        let mut ctx = RunContext::new(self.event.clone(), self.run.clone());
        self.service.ensure_snapshot(&mut ctx).await;
        ctx.snapshot.expect("snapshot populated")
    }

    pub async fn snapshot_for(&self, event: &EventRecord, run: &RunRecord) -> Snapshot {
        let mut ctx = RunContext::new(event.clone(), run.clone());
        self.service.ensure_snapshot(&mut ctx).await;
        ctx.snapshot.expect("snapshot populated")
    }

    /// Raw cached value for this world's run, straight from the store.
    pub async fn raw(&self) -> Option<serde_json::Value> {
        self.store.get(&self.key().cache_key()).await
    }

    pub async fn raw_for(&self, event: &EventRecord, run: &RunRecord) -> Option<serde_json::Value> {
        self.store
            .get(&SnapshotKey::for_run(event, run).cache_key())
            .await
    }
}
