//! Domain entities mirrored from the entity store.
//!
//! These records are the normalized source-of-truth rows the snapshot cache
//! denormalizes. Business keys ("numbers") are stable, user-facing integers
//! unique within an event's inheritance scope; internal ids never serve as
//! snapshot keys.

use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::types::{FactionKind, QuestionKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub number: u32,
    pub name: String,
    pub title: Option<String>,
    pub teaser: String,
    pub text: String,
    pub hide: bool,
    pub mirror_id: Option<Uuid>,
    pub player_id: Option<Uuid>,
    /// Faction numbers this character belongs to; 0 means "no primary
    /// faction assigned".
    pub factions: BTreeSet<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactionRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub number: u32,
    pub name: String,
    pub teaser: String,
    pub typ: FactionKind,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestTypeRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub number: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub number: u32,
    pub name: String,
    pub teaser: String,
    /// Quest-type number this quest belongs to.
    pub typ: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub number: u32,
    pub name: String,
    pub teaser: String,
    /// Owning quest's number.
    pub quest: u32,
    /// Numbers of related traits; may include the trait's own number, which
    /// the snapshot excludes.
    pub related: BTreeSet<u32>,
}

/// Registration–character relation: one cast character in one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CastingRecord {
    pub run_id: Uuid,
    pub character_id: Uuid,
    /// Stable player identity, shared with trait assignments.
    pub member_id: Uuid,
    pub member_full: String,
    pub member_prof: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitAssignmentRecord {
    pub run_id: Uuid,
    pub trait_number: u32,
    pub member_id: Uuid,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WritingQuestionRecord {
    pub uuid: Uuid,
    pub event_id: Uuid,
    pub kind: QuestionKind,
    pub order: i32,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextAnswerRecord {
    pub question_uuid: Uuid,
    pub character_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceAnswerRecord {
    pub question_uuid: Uuid,
    pub character_id: Uuid,
    pub option_uuid: Uuid,
    pub option_order: i32,
}
