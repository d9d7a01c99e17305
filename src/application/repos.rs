//! Repository traits describing the entity store adapters.
//!
//! The snapshot cache treats the entity store as an injected collaborator:
//! these traits are its only view of persistence. Enumeration methods return
//! rows in the documented order so builds stay deterministic.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{
    CastingRecord, CharacterRecord, ChoiceAnswerRecord, EventRecord, FactionRecord, QuestRecord,
    QuestTypeRecord, RunRecord, TextAnswerRecord, TraitAssignmentRecord, TraitRecord,
    WritingQuestionRecord,
};
use crate::domain::types::Feature;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Event hierarchy queries: runs and the campaign family.
#[async_trait]
pub trait EventsRepo: Send + Sync {
    async fn event_by_id(&self, event_id: Uuid) -> Result<Option<EventRecord>, RepoError>;

    /// Runs of one event, ordered by run number.
    async fn runs_of(&self, event_id: Uuid) -> Result<Vec<RunRecord>, RepoError>;

    /// Direct child events (events whose parent is `event_id`).
    async fn children_of(&self, event_id: Uuid) -> Result<Vec<EventRecord>, RepoError>;

    async fn parent_of(&self, event_id: Uuid) -> Result<Option<EventRecord>, RepoError>;
}

#[async_trait]
pub trait CharactersRepo: Send + Sync {
    /// Characters of one event, ordered by number. Inheritance resolution
    /// (reading the parent's characters instead) is the caller's concern.
    async fn characters_of(&self, event_id: Uuid) -> Result<Vec<CharacterRecord>, RepoError>;

    async fn character_by_id(
        &self,
        character_id: Uuid,
    ) -> Result<Option<CharacterRecord>, RepoError>;
}

#[async_trait]
pub trait FactionsRepo: Send + Sync {
    /// Factions of one event, ordered by their explicit order field.
    async fn factions_of(&self, event_id: Uuid) -> Result<Vec<FactionRecord>, RepoError>;
}

#[async_trait]
pub trait QuestsRepo: Send + Sync {
    /// Quest types of one event, ordered by number.
    async fn quest_types_of(&self, event_id: Uuid) -> Result<Vec<QuestTypeRecord>, RepoError>;

    /// Quests of one event, ordered by number.
    async fn quests_of(&self, event_id: Uuid) -> Result<Vec<QuestRecord>, RepoError>;

    /// Traits of one event, ordered by number.
    async fn traits_of(&self, event_id: Uuid) -> Result<Vec<TraitRecord>, RepoError>;
}

#[async_trait]
pub trait CastingsRepo: Send + Sync {
    /// Registration–character relations for one run.
    async fn castings(&self, run_id: Uuid) -> Result<Vec<CastingRecord>, RepoError>;

    /// Trait assignments for one run, active and inactive.
    async fn trait_assignments(
        &self,
        run_id: Uuid,
    ) -> Result<Vec<TraitAssignmentRecord>, RepoError>;
}

#[async_trait]
pub trait FieldsRepo: Send + Sync {
    /// Visible writing questions for characters, ordered by question order.
    async fn visible_questions(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<WritingQuestionRecord>, RepoError>;

    async fn text_answers(&self, event_id: Uuid) -> Result<Vec<TextAnswerRecord>, RepoError>;

    /// Choice answers ordered by question order, then option order.
    async fn choice_answers(&self, event_id: Uuid) -> Result<Vec<ChoiceAnswerRecord>, RepoError>;
}

/// Per-event configuration lookups.
///
/// Implementations fall back to the supplied default when a key is missing
/// or the config backend is unavailable; lookups never fail.
#[async_trait]
pub trait ConfigRepo: Send + Sync {
    async fn event_feature(&self, event_id: Uuid, feature: Feature) -> bool;

    async fn event_config_bool(&self, event_id: Uuid, key: &str, default: bool) -> bool;
}

/// Derived per-run media artifacts (exported PDFs) that embed a snapshot.
///
/// They carry no independent staleness signal, so every full invalidation
/// deletes them alongside the cache entry.
#[async_trait]
pub trait MediaRepo: Send + Sync {
    async fn delete_run_media(&self, event_slug: &str, run_number: u32) -> Result<(), RepoError>;
}

/// Everything the snapshot cache needs from the entity store.
pub trait SnapshotRepos:
    EventsRepo
    + CharactersRepo
    + FactionsRepo
    + QuestsRepo
    + CastingsRepo
    + FieldsRepo
    + ConfigRepo
    + MediaRepo
{
}

impl<T> SnapshotRepos for T where
    T: EventsRepo
        + CharactersRepo
        + FactionsRepo
        + QuestsRepo
        + CastingsRepo
        + FieldsRepo
        + ConfigRepo
        + MediaRepo
{
}
