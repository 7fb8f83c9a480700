//! The engine facade: the single object host applications talk to.
//!
//! [`MapEngine`] owns the observable state, the provider handles, and every
//! background task. All state mutation happens on the facade's execution
//! context: spawned tasks report completions as [`EngineMessage`]s which the
//! owner applies via handler functions, republishing an immutable snapshot
//! after every mutation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::providers::{
    AnalyticsSink, DownloadStatus, OfflineMapProvider, PlaceProvider, ProviderError,
    ProviderPlace, ProviderRoutes,
};
use crate::search::SuggestInput;
use crate::state::{
    EngineSnapshot, EngineState, LatLng, MapError, OfflineRegion, PermissionStatus, Place,
    PlaceAssociation, PlaceCategory, RegionSuggestion, Suggestion, TransportMode,
};
use crate::{offline, persist, routing, search};

/// Completion messages reported back onto the facade's execution context by
/// background tasks.
#[derive(Debug)]
pub(crate) enum EngineMessage {
    /// A search provider call finished.
    SearchCompleted {
        /// Query id echoed from dispatch.
        id: u64,
        /// Provider outcome.
        outcome: Result<Vec<ProviderPlace>, ProviderError>,
    },
    /// The debounced completer produced a suggestion batch.
    SuggestionsReady {
        /// Mapped suggestions (empty on completer failure).
        items: Vec<Suggestion>,
    },
    /// A routing provider call finished.
    RouteCompleted {
        /// Route id echoed from dispatch.
        id: u64,
        /// Provider outcome.
        outcome: Result<ProviderRoutes, ProviderError>,
    },
    /// A download monitor forwarded one provider status event.
    DownloadEvent {
        /// Synthetic download id the event belongs to.
        id: String,
        /// Provider status event.
        status: DownloadStatus,
    },
}

/// Location search, routing, and offline-map caching engine.
///
/// Construct with [`MapEngine::new`] inside a tokio runtime, then drive it by
/// calling the operation methods and pumping completions with
/// [`MapEngine::process_next_message`] (or [`MapEngine::drain_messages`]).
/// Observers subscribe to snapshots via [`MapEngine::subscribe`].
pub struct MapEngine {
    config: EngineConfig,
    state: EngineState,
    places: Arc<dyn PlaceProvider>,
    offline_maps: Arc<dyn OfflineMapProvider>,
    analytics: Arc<dyn AnalyticsSink>,
    msg_tx: mpsc::UnboundedSender<EngineMessage>,
    msg_rx: mpsc::UnboundedReceiver<EngineMessage>,
    suggest_tx: mpsc::UnboundedSender<SuggestInput>,
    suggest_worker: JoinHandle<()>,
    snapshot_tx: watch::Sender<EngineSnapshot>,
    snapshot_rx: watch::Receiver<EngineSnapshot>,
    search_task: Option<JoinHandle<()>>,
    route_task: Option<JoinHandle<()>>,
    monitors: HashMap<String, JoinHandle<()>>,
}

impl MapEngine {
    /// What: Build an engine and load persisted collections.
    ///
    /// Inputs:
    /// - `config`: Tunables and document paths.
    /// - `places`: Search/completion/routing provider.
    /// - `offline_maps`: Offline download provider.
    /// - `analytics`: Fire-and-forget event sink.
    ///
    /// Output: Ready engine with the suggestion worker running.
    ///
    /// Details:
    /// - Must be called inside a tokio runtime; the debounce worker is
    ///   spawned here.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        places: Arc<dyn PlaceProvider>,
        offline_maps: Arc<dyn OfflineMapProvider>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel::<EngineMessage>();
        let (suggest_tx, suggest_rx) = mpsc::unbounded_channel::<SuggestInput>();
        let suggest_worker = search::spawn_suggest_worker(
            suggest_rx,
            Arc::clone(&places),
            msg_tx.clone(),
            config.suggest_debounce_ms,
        );
        let mut state = EngineState::new(&config);
        persist::load_saved(&mut state);
        let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot());
        Self {
            config,
            state,
            places,
            offline_maps,
            analytics,
            msg_tx,
            msg_rx,
            suggest_tx,
            suggest_worker,
            snapshot_tx,
            snapshot_rx,
            search_task: None,
            route_task: None,
            monitors: HashMap::new(),
        }
    }

    /// What: Read access to the current state, for hosts and tests.
    ///
    /// Inputs: none
    ///
    /// Output: Shared reference to the live state container.
    #[must_use]
    pub const fn state(&self) -> &EngineState {
        &self.state
    }

    /// What: Subscribe to snapshot updates.
    ///
    /// Inputs: none
    ///
    /// Output: Watch receiver yielding an [`EngineSnapshot`] per mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshot_rx.clone()
    }

    fn publish(&mut self) {
        let _ = self.snapshot_tx.send(self.state.snapshot());
    }

    /// What: Run a search request.
    ///
    /// Inputs:
    /// - `query`: Free-text query; empty input clears results.
    /// - `filter`: Category filter (`All` collapses to no filter).
    /// - `near`: Optional coordinate to bias results toward.
    ///
    /// Details:
    /// - A new search supersedes any in-flight one by cancellation.
    pub fn search(&mut self, query: &str, filter: PlaceCategory, near: Option<LatLng>) {
        if let Some(task) = self.search_task.take() {
            task.abort();
        }
        self.search_task = search::begin_search(
            &mut self.state,
            &self.places,
            &self.analytics,
            &self.msg_tx,
            query,
            filter,
            near,
        );
        self.publish();
    }

    /// What: Re-issue the most recently requested search.
    ///
    /// Inputs: none
    pub fn retry_last_search(&mut self) {
        if let Some(task) = self.search_task.take() {
            task.abort();
        }
        self.search_task = search::retry_last_search(
            &mut self.state,
            &self.places,
            &self.analytics,
            &self.msg_tx,
        );
        self.publish();
    }

    /// What: Feed one keystroke of suggestion input to the debounce worker.
    ///
    /// Inputs:
    /// - `fragment`: Partial query text.
    /// - `near`: Optional coordinate to bias completions toward.
    pub fn update_suggestion_input(&self, fragment: &str, near: Option<LatLng>) {
        let _ = self.suggest_tx.send(SuggestInput {
            fragment: fragment.to_string(),
            near,
        });
    }

    /// What: Accept a suggestion and turn it back into a search.
    ///
    /// Inputs:
    /// - `suggestion`: Suggestion chosen by the user.
    pub fn select_suggestion(&mut self, suggestion: &Suggestion) {
        self.analytics.log(
            "suggestion_selected",
            &[("title", suggestion.title.clone())],
        );
        let text = suggestion.formatted_text();
        self.search(&text, PlaceCategory::All, suggestion.coord);
    }

    /// What: Request a route between two places.
    ///
    /// Inputs:
    /// - `from`, `to`: Route endpoints.
    /// - `mode`: Transport mode.
    /// - `include_alternatives`: Whether alternates should be requested.
    /// - `is_online`: Reachability flag supplied by the caller; when false the
    ///   provider is never called and a saved route is substituted.
    pub fn route(
        &mut self,
        from: &Place,
        to: &Place,
        mode: TransportMode,
        include_alternatives: bool,
        is_online: bool,
    ) {
        if let Some(task) = self.route_task.take() {
            task.abort();
        }
        self.route_task = routing::begin_route(
            &mut self.state,
            &self.places,
            &self.analytics,
            &self.msg_tx,
            from,
            to,
            mode,
            include_alternatives,
            is_online,
        );
        self.publish();
    }

    /// What: Replay the most recent route request against current connectivity.
    ///
    /// Inputs:
    /// - `is_online`: Reachability flag supplied by the caller.
    pub fn retry_last_route(&mut self, is_online: bool) {
        if let Some(task) = self.route_task.take() {
            task.abort();
        }
        self.route_task = routing::retry_last_route(
            &mut self.state,
            &self.places,
            &self.analytics,
            &self.msg_tx,
            is_online,
        );
        self.publish();
    }

    /// What: Persist the currently held route as a saved route.
    ///
    /// Inputs:
    /// - `from`, `to`: Endpoints the route was computed between.
    /// - `mode`: Transport mode the route was computed for.
    ///
    /// Output: `true` when a route was saved.
    pub fn save_route(&mut self, from: &Place, to: &Place, mode: TransportMode) -> bool {
        let saved = routing::save_current_route(&mut self.state, from, to, mode);
        if saved {
            self.analytics
                .log("route_saved", &[("mode", mode.as_config_key().to_string())]);
            self.publish();
        }
        saved
    }

    /// What: Save a place, merging into any duplicate record.
    ///
    /// Inputs:
    /// - `place`: Place to save.
    /// - `association`: Optional trip/day link.
    pub fn save_place(&mut self, place: Place, association: Option<PlaceAssociation>) {
        persist::save_place(&mut self.state, place, association);
        self.publish();
    }

    /// What: Flip the bookmark flag on a stored place.
    ///
    /// Inputs:
    /// - `id`: Place identifier.
    ///
    /// Output: `true` when a place was found and toggled.
    pub fn toggle_bookmark(&mut self, id: &str) -> bool {
        let changed = persist::toggle_bookmark(&mut self.state, id);
        if changed {
            self.publish();
        }
        changed
    }

    /// What: Remove a saved place by id.
    ///
    /// Inputs:
    /// - `id`: Place identifier.
    ///
    /// Output: `true` when a place was removed.
    pub fn delete_place(&mut self, id: &str) -> bool {
        let removed = persist::delete_place(&mut self.state, id);
        if removed {
            self.publish();
        }
        removed
    }

    /// What: Record a location permission change pushed by the host.
    ///
    /// Inputs:
    /// - `status`: New permission status.
    ///
    /// Details:
    /// - Transitioning to denied derives a `LocationPermissionDenied` error;
    ///   the error kind comes from the status change, not any single call.
    pub fn set_permission_status(&mut self, status: PermissionStatus) {
        let was = self.state.permission;
        self.state.permission = status;
        if status == PermissionStatus::Denied && was != PermissionStatus::Denied {
            self.state.last_search_error = Some(MapError::LocationPermissionDenied);
        }
        self.publish();
    }

    /// What: Start downloading a suggested region.
    ///
    /// Inputs:
    /// - `suggestion`: Region candidate to download.
    pub async fn download_region(&mut self, suggestion: &RegionSuggestion) {
        offline::begin_download(
            &mut self.state,
            &self.offline_maps,
            &self.analytics,
            &self.msg_tx,
            &mut self.monitors,
            suggestion,
        )
        .await;
        self.publish();
    }

    /// What: Cancel an active download and discard its bookkeeping.
    ///
    /// Inputs:
    /// - `id`: Synthetic download id from the active-download list.
    pub async fn cancel_download(&mut self, id: &str) {
        offline::cancel_download(&mut self.state, &self.offline_maps, &mut self.monitors, id)
            .await;
        self.publish();
    }

    /// What: Delete a downloaded map and refresh the collection view.
    ///
    /// Inputs:
    /// - `region`: Region to delete.
    pub async fn delete_region(&mut self, region: &OfflineRegion) {
        offline::delete_region(&mut self.state, &self.offline_maps, region).await;
        self.publish();
    }

    /// What: Re-download an existing map in place (an update).
    ///
    /// Inputs:
    /// - `region`: Region to update.
    pub async fn update_region(&mut self, region: &OfflineRegion) {
        offline::update_region(
            &mut self.state,
            &self.offline_maps,
            &self.analytics,
            &self.msg_tx,
            &mut self.monitors,
            region,
        )
        .await;
        self.publish();
    }

    /// What: Reconcile downloaded regions and storage usage with the provider.
    ///
    /// Inputs: none
    pub async fn refresh_collections(&mut self) {
        offline::refresh_collections(&mut self.state, &self.offline_maps).await;
        self.publish();
    }

    /// What: Recompute pending offline-download suggestions.
    ///
    /// Inputs:
    /// - `focused`: Optional place currently selected in the planner.
    pub fn recalculate_suggestions(&mut self, focused: Option<&Place>) {
        offline::suggest::recalculate(&mut self.state, &self.config, focused);
        self.publish();
    }

    fn apply(&mut self, msg: EngineMessage) {
        match msg {
            EngineMessage::SearchCompleted { id, outcome } => {
                search::handle_search_completed(&mut self.state, &self.analytics, id, outcome);
            }
            EngineMessage::SuggestionsReady { items } => {
                search::handle_suggestions_ready(&mut self.state, items);
            }
            EngineMessage::RouteCompleted { id, outcome } => {
                routing::handle_route_completed(&mut self.state, &self.analytics, id, outcome);
            }
            EngineMessage::DownloadEvent { id, status } => {
                let terminal =
                    offline::handle_download_event(&mut self.state, &self.analytics, &id, status);
                if terminal
                    && let Some(monitor) = self.monitors.remove(&id)
                {
                    monitor.abort();
                }
            }
        }
        self.publish();
    }

    /// What: Wait for and apply one background completion.
    ///
    /// Inputs: none
    ///
    /// Output: `false` when the internal channel is closed (engine shutdown).
    pub async fn process_next_message(&mut self) -> bool {
        match self.msg_rx.recv().await {
            Some(msg) => {
                self.apply(msg);
                true
            }
            None => false,
        }
    }

    /// What: Apply every immediately available background completion.
    ///
    /// Inputs: none
    pub fn drain_messages(&mut self) {
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.apply(msg);
        }
    }
}

impl Drop for MapEngine {
    fn drop(&mut self) {
        if let Some(task) = self.search_task.take() {
            task.abort();
        }
        if let Some(task) = self.route_task.take() {
            task.abort();
        }
        for (_, monitor) in self.monitors.drain() {
            monitor.abort();
        }
        self.suggest_worker.abort();
    }
}
