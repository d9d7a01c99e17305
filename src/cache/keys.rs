//! Cache key definitions.
//!
//! A snapshot is keyed by (event slug, run number). The string form is the
//! wire key handed to the cache store; the paired lock key names the
//! best-effort mutex for read-modify-write patches.

use std::fmt;

use crate::domain::entities::{EventRecord, RunRecord};

const KEY_PREFIX: &str = "event_factions_characters";

/// Identifies one cached snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub event_slug: String,
    pub run_number: u32,
}

impl SnapshotKey {
    pub fn new(event_slug: impl Into<String>, run_number: u32) -> Self {
        Self {
            event_slug: event_slug.into(),
            run_number,
        }
    }

    pub fn for_run(event: &EventRecord, run: &RunRecord) -> Self {
        Self::new(event.slug.clone(), run.number)
    }

    /// Key string stored in the cache backend.
    pub fn cache_key(&self) -> String {
        format!("{KEY_PREFIX}_{}_{}", self.event_slug, self.run_number)
    }

    /// Named-lock key guarding patches on this snapshot.
    pub fn lock_key(&self) -> String {
        format!("lock_{}", self.cache_key())
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.event_slug, self.run_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_format() {
        let key = SnapshotKey::new("alpha", 1);
        assert_eq!(key.cache_key(), "event_factions_characters_alpha_1");
    }

    #[test]
    fn lock_key_wraps_cache_key() {
        let key = SnapshotKey::new("alpha", 2);
        assert_eq!(key.lock_key(), "lock_event_factions_characters_alpha_2");
    }

    #[test]
    fn key_equality() {
        assert_eq!(SnapshotKey::new("alpha", 1), SnapshotKey::new("alpha", 1));
        assert_ne!(SnapshotKey::new("alpha", 1), SnapshotKey::new("alpha", 2));
        assert_ne!(SnapshotKey::new("alpha", 1), SnapshotKey::new("beta", 1));
    }
}
