//! Waymark: the location search, routing, and offline map caching engine
//! behind a trip planner's map feature.
//!
//! The crate is organized around a single facade, [`engine::MapEngine`],
//! which owns the observable state and coordinates cancellable background
//! work: debounced autocomplete, de-duplicated search with an in-memory
//! result cache, route calculation with saved-route offline fallback, and a
//! multi-state offline-region download lifecycle. External collaborators
//! (map provider, offline download provider, analytics) sit behind the
//! traits in [`providers`].

pub mod config;
pub mod engine;
pub mod logging;
pub mod offline;
pub mod persist;
pub mod providers;
pub mod routing;
pub mod search;
pub mod state;
pub mod util;

pub use config::EngineConfig;
pub use engine::MapEngine;
