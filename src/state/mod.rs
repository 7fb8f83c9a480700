//! Modularized state module.
//!
//! This splits the engine state into smaller files while preserving the
//! public API under `crate::state::*` via re-exports.

pub mod engine_state;
pub mod errors;
pub mod offline;
pub mod types;

// Public re-exports to keep call sites short
pub use engine_state::{EngineSnapshot, EngineState, SearchCacheKey};
pub use errors::{MapError, PermissionStatus};
pub use offline::{
    ActiveDownload, BoundingRegion, OfflineRegion, RegionStatus, RegionSuggestion, StorageUsage,
    SuggestionSource,
};
pub use types::{
    LatLng, Place, PlaceAssociation, PlaceCategory, RouteRequest, RouteSnapshot, SavedRoute,
    SearchRequest, Suggestion, TransportMode,
};
