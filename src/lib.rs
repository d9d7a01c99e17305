//! Larpwright: the event snapshot cache engine behind a live-action-roleplay
//! event manager.
//!
//! The engine maintains a denormalized, per-(event, run) snapshot combining
//! characters, factions, quests and traits, rebuilt from the normalized
//! entity store on cache miss, kept consistent under mutation through a mix
//! of targeted in-place patching and full invalidation, and propagated
//! across campaign families. Entity storage, rendering and HTTP concerns
//! stay outside, behind the trait seams in [`application::repos`] and
//! [`cache::CacheStore`].

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
