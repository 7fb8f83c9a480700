//! Central [`EngineState`] container and the immutable snapshot published to
//! observers.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::config::EngineConfig;
use crate::state::errors::{MapError, PermissionStatus};
use crate::state::offline::{
    ActiveDownload, OfflineRegion, RegionSuggestion, StorageUsage,
};
use crate::state::types::{
    Place, PlaceCategory, RouteRequest, RouteSnapshot, SavedRoute, SearchRequest, Suggestion,
};

/// Key of the in-memory search result cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SearchCacheKey {
    /// Lowercased, trimmed query text.
    pub query: String,
    /// Category filter the query was issued with.
    pub filter: PlaceCategory,
}

impl SearchCacheKey {
    /// What: Build the cache key for a query/filter pair.
    ///
    /// Inputs:
    /// - `query`: Raw query text (trimmed and lowercased here).
    /// - `filter`: Category filter.
    ///
    /// Output: Normalized cache key.
    #[must_use]
    pub fn new(query: &str, filter: PlaceCategory) -> Self {
        Self {
            query: query.trim().to_lowercase(),
            filter,
        }
    }
}

/// Engine state shared by the facade, handlers, and persistence layers.
///
/// Mutated only on the facade's execution context. Observers never see this
/// struct directly; they receive [`EngineSnapshot`] values.
#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct EngineState {
    /// Current search results, provider order preserved.
    pub results: Vec<Place>,
    /// Current autocomplete suggestions.
    pub suggestions: Vec<Suggestion>,
    /// Saved places, persisted across runs.
    pub saved_places: Vec<Place>,
    /// Saved routes, persisted across runs, most-recent-first.
    pub saved_routes: Vec<SavedRoute>,
    /// Whether a search provider call is in flight.
    pub searching: bool,
    /// Whether a routing provider call is in flight.
    pub routing: bool,
    /// Most recently computed route.
    pub current_route: Option<RouteSnapshot>,
    /// Alternatives returned alongside the current route.
    pub route_alternatives: Vec<RouteSnapshot>,
    /// Saved route substituted when live routing is unavailable.
    pub offline_fallback_route: Option<SavedRoute>,
    /// Last search error, if any.
    pub last_search_error: Option<MapError>,
    /// Last routing error, if any.
    pub last_route_error: Option<MapError>,
    /// Last offline-download error, if any.
    pub last_download_error: Option<MapError>,
    /// Downloaded regions as last reconciled with the provider.
    pub downloaded_regions: Vec<OfflineRegion>,
    /// Derived download suggestions, sorted by name.
    pub region_suggestions: Vec<RegionSuggestion>,
    /// Downloads currently in flight, each with its own monitor.
    pub active_downloads: Vec<ActiveDownload>,
    /// Aggregate storage usage, when reported.
    pub storage: Option<StorageUsage>,
    /// Location permission as last pushed by the host.
    pub permission: PermissionStatus,

    // Search/route coordination
    /// Identifier of the latest search whose results may be applied.
    pub latest_query_id: u64,
    /// Next search identifier to allocate.
    pub next_query_id: u64,
    /// Identifier of the latest route request whose result may be applied.
    pub latest_route_id: u64,
    /// Next route identifier to allocate.
    pub next_route_id: u64,
    /// Sequence for engine-assigned synthetic download identifiers.
    pub next_download_seq: u64,
    /// Most recent search request, replayed by retry.
    pub last_search: Option<SearchRequest>,
    /// Most recent route request, replayed by retry.
    pub last_route_request: Option<RouteRequest>,

    // Search result cache (in-memory only, rebuilt each run)
    /// Results keyed by normalized query and category filter.
    pub search_cache: LruCache<SearchCacheKey, Vec<Place>>,

    // Persistence bookkeeping
    /// Path where saved places are persisted as JSON.
    pub places_path: PathBuf,
    /// Dirty flag indicating `saved_places` needs to be written.
    pub places_dirty: bool,
    /// Path where saved routes are persisted as JSON.
    pub routes_path: PathBuf,
    /// Dirty flag indicating `saved_routes` needs to be written.
    pub routes_dirty: bool,
    /// Guard ensuring documents are loaded at most once per process.
    pub persistence_loaded: bool,
}

impl EngineState {
    /// What: Build a fresh state container from configuration.
    ///
    /// Inputs:
    /// - `config`: Engine configuration providing paths and cache capacity.
    ///
    /// Output: Empty state with counters at zero and nothing loaded.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let capacity = NonZeroUsize::new(config.search_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            results: Vec::new(),
            suggestions: Vec::new(),
            saved_places: Vec::new(),
            saved_routes: Vec::new(),
            searching: false,
            routing: false,
            current_route: None,
            route_alternatives: Vec::new(),
            offline_fallback_route: None,
            last_search_error: None,
            last_route_error: None,
            last_download_error: None,
            downloaded_regions: Vec::new(),
            region_suggestions: Vec::new(),
            active_downloads: Vec::new(),
            storage: None,
            permission: PermissionStatus::NotDetermined,
            latest_query_id: 0,
            next_query_id: 1,
            latest_route_id: 0,
            next_route_id: 1,
            next_download_seq: 1,
            last_search: None,
            last_route_request: None,
            search_cache: LruCache::new(capacity),
            places_path: config.places_path(),
            places_dirty: false,
            routes_path: config.routes_path(),
            routes_dirty: false,
            persistence_loaded: false,
        }
    }

    /// What: Allocate the next search identifier and mark it latest.
    ///
    /// Inputs: none
    ///
    /// Output: Monotonically increasing identifier.
    pub fn alloc_query_id(&mut self) -> u64 {
        let id = self.next_query_id;
        self.next_query_id += 1;
        self.latest_query_id = id;
        id
    }

    /// What: Allocate the next route identifier and mark it latest.
    ///
    /// Inputs: none
    ///
    /// Output: Monotonically increasing identifier.
    pub fn alloc_route_id(&mut self) -> u64 {
        let id = self.next_route_id;
        self.next_route_id += 1;
        self.latest_route_id = id;
        id
    }

    /// What: Mint a synthetic download identifier.
    ///
    /// Inputs:
    /// - `prefix`: `"dl"` for fresh downloads, `"upd"` for updates.
    ///
    /// Output: Identifier unique within this process.
    pub fn alloc_download_id(&mut self, prefix: &str) -> String {
        let seq = self.next_download_seq;
        self.next_download_seq += 1;
        format!("{prefix}-{seq}")
    }

    /// What: Clone the observable subset into an immutable snapshot.
    ///
    /// Inputs: none
    ///
    /// Output: [`EngineSnapshot`] for publication over the watch channel.
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            results: self.results.clone(),
            suggestions: self.suggestions.clone(),
            saved_places: self.saved_places.clone(),
            saved_routes: self.saved_routes.clone(),
            searching: self.searching,
            routing: self.routing,
            current_route: self.current_route.clone(),
            route_alternatives: self.route_alternatives.clone(),
            offline_fallback_route: self.offline_fallback_route.clone(),
            last_search_error: self.last_search_error.clone(),
            last_route_error: self.last_route_error.clone(),
            last_download_error: self.last_download_error.clone(),
            downloaded_regions: self.downloaded_regions.clone(),
            region_suggestions: self.region_suggestions.clone(),
            active_downloads: self.active_downloads.clone(),
            storage: self.storage,
            permission: self.permission,
        }
    }
}

/// Immutable view of the engine's observable values.
///
/// Published over a `tokio::sync::watch` channel after every mutation; UI
/// code renders from these and never holds a mutable reference to the state.
#[derive(Clone, Debug, Default)]
pub struct EngineSnapshot {
    /// Current search results.
    pub results: Vec<Place>,
    /// Current autocomplete suggestions.
    pub suggestions: Vec<Suggestion>,
    /// Saved places.
    pub saved_places: Vec<Place>,
    /// Saved routes, most-recent-first.
    pub saved_routes: Vec<SavedRoute>,
    /// Whether a search is in flight.
    pub searching: bool,
    /// Whether a route request is in flight.
    pub routing: bool,
    /// Most recently computed route.
    pub current_route: Option<RouteSnapshot>,
    /// Alternatives to the current route.
    pub route_alternatives: Vec<RouteSnapshot>,
    /// Saved route substituted for a live route, when applicable.
    pub offline_fallback_route: Option<SavedRoute>,
    /// Last search error.
    pub last_search_error: Option<MapError>,
    /// Last routing error.
    pub last_route_error: Option<MapError>,
    /// Last offline-download error.
    pub last_download_error: Option<MapError>,
    /// Downloaded regions.
    pub downloaded_regions: Vec<OfflineRegion>,
    /// Pending download suggestions.
    pub region_suggestions: Vec<RegionSuggestion>,
    /// Active downloads with progress.
    pub active_downloads: Vec<ActiveDownload>,
    /// Aggregate storage usage.
    pub storage: Option<StorageUsage>,
    /// Location permission status.
    pub permission: PermissionStatus,
}
