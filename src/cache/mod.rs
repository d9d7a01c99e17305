//! Larpwright Event Snapshot Cache
//!
//! Maintains the denormalized, per-(event, run) snapshot combining
//! characters, factions, traits and quests:
//!
//! - **Snapshot Builder**: assembles a full snapshot from the entity store
//! - **Patch Applier**: in-place updates of one subsection on targeted writes
//! - **Invalidation Dispatcher**: structural-vs-display decisions and
//!   campaign-family cascades
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `larpwright.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! snapshot_ttl_secs = 86400
//! lock_ttl_secs = 5
//! ```

mod builder;
mod config;
mod dispatcher;
mod keys;
mod lock;
mod patch;
mod service;
mod snapshot;
mod store;

pub use builder::SnapshotBuilder;
pub use config::CacheConfig;
pub use dispatcher::{EntityChange, InvalidationDispatcher, PlanAction, plan_for};
pub use keys::SnapshotKey;
pub use patch::PatchApplier;
pub use service::SnapshotService;
pub use snapshot::{
    CharacterView, FactionView, FieldValue, QuestTypeView, QuestView, RunContext, Snapshot,
    TraitView,
};
pub use store::{CacheStore, LockToken, MemoryCache};
