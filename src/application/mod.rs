//! Application layer: repository seams consumed by the cache engine.

pub mod repos;
