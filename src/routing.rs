//! Routing engine with saved-route offline fallback.
//!
//! Online requests go to the provider as cancellable background tasks; when
//! the network is unavailable or the provider fails, a previously saved
//! route for the same (origin, destination, mode) triple is substituted.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::EngineMessage;
use crate::persist;
use crate::providers::{AnalyticsSink, PlaceProvider, ProviderRoute, ProviderRoutes};
use crate::state::{
    EngineState, MapError, Place, RouteRequest, RouteSnapshot, SavedRoute, TransportMode,
};

/// What: Convert a provider route into its serializable summary.
///
/// Inputs:
/// - `route`: Provider route candidate.
///
/// Output: Immutable snapshot of name, timing, distance, and advisories.
pub(crate) fn snapshot_of(route: &ProviderRoute) -> RouteSnapshot {
    RouteSnapshot {
        name: route.name.clone(),
        duration_secs: route.duration_secs,
        distance_meters: route.distance_meters,
        advisories: route.advisories.clone(),
    }
}

/// What: Look up a saved route for a request triple.
///
/// Inputs:
/// - `state`: Engine state holding the saved-route collection.
/// - `from`, `to`: Requested endpoints.
/// - `mode`: Requested transport mode.
///
/// Output: Matching saved route, if one exists.
///
/// Details:
/// - Matching is by coordinate key on both endpoints plus the exact mode.
pub(crate) fn find_fallback(
    state: &EngineState,
    from: &Place,
    to: &Place,
    mode: TransportMode,
) -> Option<SavedRoute> {
    let okey = from.coordinate_key();
    let dkey = to.coordinate_key();
    state
        .saved_routes
        .iter()
        .find(|r| r.matches(&okey, &dkey, mode))
        .cloned()
}

/// What: Run one route request, online or against the saved-route fallback.
///
/// Inputs:
/// - `state`: Engine state.
/// - `provider`: Routing provider.
/// - `analytics`: Event sink.
/// - `msg_tx`: Channel the spawned task reports back on.
/// - `from`, `to`, `mode`, `include_alternatives`: Request parameters.
/// - `is_online`: Reachability flag supplied by the caller.
///
/// Output:
/// - `Some(JoinHandle)` when a provider call was spawned; `None` when the
///   request was resolved offline.
///
/// Details:
/// - Offline requests never touch the provider: the fallback lookup runs
///   immediately and an `Offline` condition is raised so callers can
///   distinguish "no network" from "route request failed".
pub(crate) fn begin_route(
    state: &mut EngineState,
    provider: &Arc<dyn PlaceProvider>,
    analytics: &Arc<dyn AnalyticsSink>,
    msg_tx: &mpsc::UnboundedSender<EngineMessage>,
    from: &Place,
    to: &Place,
    mode: TransportMode,
    include_alternatives: bool,
    is_online: bool,
) -> Option<JoinHandle<()>> {
    state.last_route_request = Some(RouteRequest {
        from: from.clone(),
        to: to.clone(),
        mode,
        include_alternatives,
    });
    if !is_online {
        state.routing = false;
        // Invalidate any in-flight completion; its id can no longer match.
        state.alloc_route_id();
        state.offline_fallback_route = find_fallback(state, from, to, mode);
        state.last_route_error = Some(MapError::Offline);
        tracing::info!(
            fallback = state.offline_fallback_route.is_some(),
            "[Route] offline; substituted saved route if available"
        );
        analytics.log(
            "route_offline_fallback",
            &[("found", state.offline_fallback_route.is_some().to_string())],
        );
        return None;
    }
    state.routing = true;
    let id = state.alloc_route_id();
    tracing::debug!(
        mode = mode.as_config_key(),
        id,
        "[Route] dispatching provider route request"
    );
    let provider = Arc::clone(provider);
    let tx = msg_tx.clone();
    let origin = from.coord;
    let destination = to.coord;
    Some(tokio::spawn(async move {
        let outcome = provider
            .compute_route(origin, destination, mode, include_alternatives)
            .await;
        let _ = tx.send(EngineMessage::RouteCompleted { id, outcome });
    }))
}

/// What: Apply a finished route computation to the state.
///
/// Inputs:
/// - `state`: Engine state.
/// - `analytics`: Event sink.
/// - `id`: Route id echoed by the completed task.
/// - `outcome`: Provider result.
///
/// Details:
/// - Stale completions (superseded route id) are dropped.
/// - On failure the fallback lookup runs and the error carries whether a
///   fallback was found; that flag changes the recovery hint, not control flow.
pub(crate) fn handle_route_completed(
    state: &mut EngineState,
    analytics: &Arc<dyn AnalyticsSink>,
    id: u64,
    outcome: Result<ProviderRoutes, crate::providers::ProviderError>,
) {
    if id != state.latest_route_id {
        tracing::trace!(id, latest = state.latest_route_id, "[Route] stale result dropped");
        return;
    }
    state.routing = false;
    match outcome {
        Ok(routes) => {
            let primary = snapshot_of(&routes.primary);
            analytics.log(
                "route_computed",
                &[("distance_meters", format!("{:.0}", primary.distance_meters))],
            );
            state.current_route = Some(primary);
            state.route_alternatives = routes.alternatives.iter().map(snapshot_of).collect();
            state.offline_fallback_route = None;
            state.last_route_error = None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "[Route] provider routing failed");
            state.current_route = None;
            state.route_alternatives.clear();
            let fallback = state.last_route_request.clone().and_then(|req| {
                find_fallback(state, &req.from, &req.to, req.mode)
            });
            let fallback_available = fallback.is_some();
            state.offline_fallback_route = fallback;
            state.last_route_error = Some(MapError::RoutingFailed {
                message: e.to_string(),
                fallback_available,
            });
        }
    }
}

/// What: Replay the most recent route request against the current connectivity.
///
/// Inputs: as [`begin_route`], minus the request parameters.
///
/// Output: Join handle when a provider call was spawned.
pub(crate) fn retry_last_route(
    state: &mut EngineState,
    provider: &Arc<dyn PlaceProvider>,
    analytics: &Arc<dyn AnalyticsSink>,
    msg_tx: &mpsc::UnboundedSender<EngineMessage>,
    is_online: bool,
) -> Option<JoinHandle<()>> {
    let Some(req) = state.last_route_request.clone() else {
        return None;
    };
    begin_route(
        state,
        provider,
        analytics,
        msg_tx,
        &req.from,
        &req.to,
        req.mode,
        req.include_alternatives,
        is_online,
    )
}

/// What: Insert or replace a saved route per the uniqueness invariant.
///
/// Inputs:
/// - `state`: Engine state.
/// - `route`: Saved route to upsert.
///
/// Details:
/// - At most one entry per (origin key, destination key, mode); the newest
///   entry goes to the front of the collection.
pub(crate) fn upsert_saved_route(state: &mut EngineState, route: SavedRoute) {
    let okey = route.origin.coordinate_key();
    let dkey = route.destination.coordinate_key();
    state
        .saved_routes
        .retain(|r| !r.matches(&okey, &dkey, route.mode));
    state.saved_routes.insert(0, route);
    state.routes_dirty = true;
}

/// What: Persist the currently held route as a saved route.
///
/// Inputs:
/// - `state`: Engine state holding the current route and alternatives.
/// - `from`, `to`: Endpoints the route was computed between.
/// - `mode`: Transport mode the route was computed for.
///
/// Output: `true` when a route was saved; `false` when none was held.
///
/// Details:
/// - Upserts per the uniqueness invariant and flushes the collection before
///   reporting success.
pub(crate) fn save_current_route(
    state: &mut EngineState,
    from: &Place,
    to: &Place,
    mode: TransportMode,
) -> bool {
    let Some(primary) = state.current_route.clone() else {
        tracing::warn!("[Route] no current route to save");
        return false;
    };
    let id = format!(
        "route-{}-{}-{}",
        from.coordinate_key(),
        to.coordinate_key(),
        mode.as_config_key()
    );
    let route = SavedRoute {
        id,
        origin: from.clone(),
        destination: to.clone(),
        mode,
        primary,
        alternatives: state.route_alternatives.clone(),
        created_at: Utc::now().timestamp(),
    };
    upsert_saved_route(state, route);
    persist::maybe_flush_routes(state);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::providers::TracingAnalytics;
    use crate::state::LatLng;

    fn test_state() -> EngineState {
        let cfg = EngineConfig {
            data_dir: std::env::temp_dir(),
            ..EngineConfig::default()
        };
        EngineState::new(&cfg)
    }

    fn analytics() -> Arc<dyn AnalyticsSink> {
        Arc::new(TracingAnalytics)
    }

    fn place(id: &str, lat: f64, lon: f64) -> Place {
        Place {
            id: id.into(),
            name: id.into(),
            subtitle: String::new(),
            coord: LatLng::new(lat, lon),
            locality: None,
            region: None,
            country: None,
            category: None,
            phone: None,
            url: None,
            bookmarked: false,
            association: None,
            created_at: 0,
        }
    }

    fn saved(from: &Place, to: &Place, mode: TransportMode, name: &str) -> SavedRoute {
        SavedRoute {
            id: format!("route-{name}"),
            origin: from.clone(),
            destination: to.clone(),
            mode,
            primary: RouteSnapshot {
                name: name.into(),
                duration_secs: 600.0,
                distance_meters: 5000.0,
                advisories: Vec::new(),
            },
            alternatives: Vec::new(),
            created_at: 0,
        }
    }

    #[test]
    /// What: Fallback lookup honors the full (origin, destination, mode) triple
    ///
    /// - Input: One saved driving route A→B
    /// - Output: Found for the exact triple, absent for other modes/endpoints
    fn routing_fallback_lookup_matches_triple() {
        let mut state = test_state();
        let a = place("a", 50.0, 8.0);
        let b = place("b", 52.5, 13.4);
        state.saved_routes.push(saved(&a, &b, TransportMode::Driving, "A66"));
        assert!(find_fallback(&state, &a, &b, TransportMode::Driving).is_some());
        assert!(find_fallback(&state, &a, &b, TransportMode::Walking).is_none());
        assert!(find_fallback(&state, &b, &a, TransportMode::Driving).is_none());
    }

    #[test]
    /// What: Upsert keeps one saved route per triple, newest first
    ///
    /// - Input: Two saves for the same triple with different snapshots
    /// - Output: One entry remains carrying the newer snapshot at the front
    fn routing_upsert_replaces_same_triple() {
        let mut state = test_state();
        let a = place("a", 50.0, 8.0);
        let b = place("b", 52.5, 13.4);
        let c = place("c", 48.1, 11.6);
        state.routes_path = std::env::temp_dir().join(format!(
            "waymark_routes_{}_{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("System time is before UNIX epoch")
                .as_nanos()
        ));
        upsert_saved_route(&mut state, saved(&a, &b, TransportMode::Driving, "old"));
        upsert_saved_route(&mut state, saved(&a, &c, TransportMode::Driving, "other"));
        upsert_saved_route(&mut state, saved(&a, &b, TransportMode::Driving, "new"));
        assert_eq!(state.saved_routes.len(), 2);
        assert_eq!(state.saved_routes[0].primary.name, "new");
        assert!(state.routes_dirty);
        let _ = std::fs::remove_file(&state.routes_path);
    }

    #[test]
    /// What: Stale route completions are dropped by the id guard
    ///
    /// - Input: State expecting route 2, completion for route 1
    /// - Output: Routing flag and current route untouched
    fn routing_stale_completion_is_noop() {
        let mut state = test_state();
        state.latest_route_id = 2;
        state.routing = true;
        handle_route_completed(
            &mut state,
            &analytics(),
            1,
            Ok(ProviderRoutes {
                primary: ProviderRoute {
                    name: "stale".into(),
                    duration_secs: 1.0,
                    distance_meters: 1.0,
                    advisories: Vec::new(),
                },
                alternatives: Vec::new(),
            }),
        );
        assert!(state.routing);
        assert!(state.current_route.is_none());
    }

    #[test]
    /// What: Failed route lookups surface the fallback flag
    ///
    /// - Input: Failure completion with a matching saved route on file
    /// - Output: Error flagged fallback_available, fallback route populated
    fn routing_failure_exposes_fallback() {
        let mut state = test_state();
        let a = place("a", 50.0, 8.0);
        let b = place("b", 52.5, 13.4);
        state.saved_routes.push(saved(&a, &b, TransportMode::Driving, "A66"));
        state.last_route_request = Some(RouteRequest {
            from: a,
            to: b,
            mode: TransportMode::Driving,
            include_alternatives: false,
        });
        state.latest_route_id = 1;
        state.routing = true;
        state.current_route = Some(RouteSnapshot {
            name: "live".into(),
            duration_secs: 1.0,
            distance_meters: 1.0,
            advisories: Vec::new(),
        });
        handle_route_completed(
            &mut state,
            &analytics(),
            1,
            Err(crate::providers::ProviderError("500".into())),
        );
        assert!(!state.routing);
        assert!(state.current_route.is_none());
        assert!(state.offline_fallback_route.is_some());
        assert_eq!(
            state.last_route_error,
            Some(MapError::RoutingFailed {
                message: "500".into(),
                fallback_available: true,
            })
        );
    }
}
