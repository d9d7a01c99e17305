//! Shared domain enumerations aligned with the entity store's enums.

use serde::{Deserialize, Serialize};

/// Faction grouping kind.
///
/// Synthetic faction 0 (the "no assigned primary faction" bucket) is always
/// emitted as `Primary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactionKind {
    Primary,
    Transversal,
}

impl FactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FactionKind::Primary => "primary",
            FactionKind::Transversal => "transversal",
        }
    }
}

/// Writing question answer shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Single free-text answer; later writes overwrite earlier ones.
    Text,
    /// Multi-value answer; selected options accumulate into a list.
    Choice,
}

/// Per-event feature flags gating which snapshot sections are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Character writing fields (questions and answers).
    Character,
    /// True factions; when off, every character lands in synthetic faction 0.
    Faction,
    /// Mirrored casts: duplicate-avoidance for characters with a mirror.
    Mirror,
    /// Quest/trait section of the snapshot.
    QuestBuilder,
}

impl Feature {
    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Character => "character",
            Feature::Faction => "faction",
            Feature::Mirror => "mirror",
            Feature::QuestBuilder => "questbuilder",
        }
    }
}
