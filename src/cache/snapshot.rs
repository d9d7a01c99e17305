//! Denormalized snapshot structure and its view types.
//!
//! Sections cross-reference each other exclusively through business-key
//! numbers; internal ids appear only as mapping values. Feature-gated
//! fields are modeled as `Option` rather than conditionally-present keys.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{EventRecord, RunRecord};
use crate::domain::types::FactionKind;

/// One writing-field value on a character view, keyed by question uuid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Single-value text answer; later writes overwrite.
    Text(String),
    /// Multi-value choice answer, ordered by question order then option order.
    Choices(Vec<Uuid>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterView {
    pub id: Uuid,
    pub number: u32,
    pub name: String,
    pub title: Option<String>,
    pub teaser: String,
    pub text: String,
    /// Question uuid (as string) → answer value.
    pub fields: BTreeMap<String, FieldValue>,
    pub player_id: Option<Uuid>,
    pub player_full: Option<String>,
    pub player_prof: Option<String>,
    pub hide: bool,
    /// Faction numbers this character belongs to; 0 marks "no primary
    /// faction assigned".
    pub factions: BTreeSet<u32>,
    /// Trait numbers assigned to this character; `Some` only when the
    /// quest-builder feature is active.
    pub traits: Option<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionView {
    pub number: u32,
    pub name: String,
    pub typ: FactionKind,
    pub teaser: String,
    /// Member character numbers, ascending.
    pub characters: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestTypeView {
    pub number: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestView {
    pub number: u32,
    pub name: String,
    pub teaser: String,
    /// Quest-type number.
    pub typ: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitView {
    pub number: u32,
    pub name: String,
    pub teaser: String,
    /// Owning quest's number.
    pub quest: u32,
    /// The owning quest's quest-type number.
    pub typ: u32,
    /// Related trait numbers, self excluded.
    pub traits: Vec<u32>,
    /// Number of the character this trait is assigned to in the run.
    pub char: Option<u32>,
}

/// The per-(event, run) denormalized cache entry.
///
/// Freshness is binary: a snapshot is either present or absent, never
/// versioned. The quest section is `None` unless the quest-builder feature
/// is active for the event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub chars: BTreeMap<u32, CharacterView>,
    /// Character number → internal id, kept in sync with `chars`.
    pub char_mapping: BTreeMap<u32, Uuid>,
    pub factions: BTreeMap<u32, FactionView>,
    /// Faction type → faction numbers, ordered by faction order.
    pub factions_typ: BTreeMap<FactionKind, Vec<u32>>,
    /// Faction number → internal id.
    pub fac_mapping: BTreeMap<u32, Uuid>,
    pub max_ch_number: u32,
    pub quest_types: Option<BTreeMap<u32, QuestTypeView>>,
    pub quests: Option<BTreeMap<u32, QuestView>>,
    pub traits: Option<BTreeMap<u32, TraitView>>,
    pub max_tr_number: Option<u32>,
}

impl Snapshot {
    pub fn character(&self, number: u32) -> Option<&CharacterView> {
        self.chars.get(&number)
    }

    pub fn faction(&self, number: u32) -> Option<&FactionView> {
        self.factions.get(&number)
    }

    pub fn trait_view(&self, number: u32) -> Option<&TraitView> {
        self.traits.as_ref().and_then(|traits| traits.get(&number))
    }
}

/// Request-scoped context a read path hands to the cache.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub event: EventRecord,
    pub run: RunRecord,
    pub snapshot: Option<Snapshot>,
}

impl RunContext {
    pub fn new(event: EventRecord, run: RunRecord) -> Self {
        Self {
            event,
            run,
            snapshot: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_value_serialization_shapes() {
        let text = serde_json::to_value(FieldValue::Text("ready".into())).unwrap();
        assert!(text.is_string());

        let opt = Uuid::new_v4();
        let choices = serde_json::to_value(FieldValue::Choices(vec![opt])).unwrap();
        assert!(choices.is_array());

        let back: FieldValue = serde_json::from_value(choices).unwrap();
        assert_eq!(back, FieldValue::Choices(vec![opt]));
    }

    #[test]
    fn snapshot_json_roundtrip() {
        let mut snapshot = Snapshot::default();
        snapshot.chars.insert(
            3,
            CharacterView {
                id: Uuid::new_v4(),
                number: 3,
                name: "Maela".into(),
                title: None,
                teaser: "".into(),
                text: "".into(),
                fields: BTreeMap::new(),
                player_id: None,
                player_full: None,
                player_prof: None,
                hide: false,
                factions: BTreeSet::from([0]),
                traits: None,
            },
        );
        snapshot.max_ch_number = 3;

        let value = serde_json::to_value(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
        assert!(back.quest_types.is_none());
    }

    #[test]
    fn lookup_helpers() {
        let snapshot = Snapshot::default();
        assert!(snapshot.character(1).is_none());
        assert!(snapshot.faction(0).is_none());
        assert!(snapshot.trait_view(7).is_none());
    }
}
