//! Integration tests for saved-place and saved-route persistence: round
//! trips through disk, merge semantics, and the bookmark union rule.

mod common;

use std::sync::Arc;

use common::{
    RecordingAnalytics, ScriptedOfflineProvider, ScriptedPlaceProvider, place, routes,
};
use waymark::state::{PlaceAssociation, TransportMode};
use waymark::{EngineConfig, MapEngine};

struct Harness {
    engine: MapEngine,
    places: Arc<ScriptedPlaceProvider>,
}

/// What: Build an engine against a given data directory.
///
/// Inputs:
/// - `data_dir`: Directory holding the persisted documents.
///
/// Output: Harness with the engine and the place-provider mock.
fn harness_in(data_dir: &std::path::Path) -> Harness {
    let config = EngineConfig {
        data_dir: data_dir.to_path_buf(),
        suggest_debounce_ms: 10,
        ..EngineConfig::default()
    };
    let places = Arc::new(ScriptedPlaceProvider::new());
    let offline = Arc::new(ScriptedOfflineProvider::new());
    let analytics = Arc::new(RecordingAnalytics::default());
    let places_dyn: Arc<dyn waymark::providers::PlaceProvider> = places.clone();
    let engine = MapEngine::new(config, places_dyn, offline, analytics);
    Harness { engine, places }
}

#[tokio::test]
/// What: Persisted places reload with identical ids and bookmark flags
///
/// Inputs:
/// - Two saved places (one bookmarked) written by a first engine instance
///
/// Output:
/// - A second engine on the same directory reproduces ids and flags
async fn places_round_trip_through_disk() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    {
        let mut h = harness_in(dir.path());
        let mut favorite = place("cafe-central", 48.2102, 16.3669);
        favorite.bookmarked = true;
        h.engine.save_place(favorite, None);
        h.engine.save_place(place("prater", 48.2167, 16.3958), None);
        assert_eq!(h.engine.state().saved_places.len(), 2);
    }
    let h = harness_in(dir.path());
    let reloaded = &h.engine.state().saved_places;
    assert_eq!(reloaded.len(), 2);
    let favorite = reloaded
        .iter()
        .find(|p| p.id == "cafe-central")
        .expect("bookmarked place expected");
    assert!(favorite.bookmarked);
    let plain = reloaded
        .iter()
        .find(|p| p.id == "prater")
        .expect("plain place expected");
    assert!(!plain.bookmarked);
}

#[tokio::test]
/// What: A stale re-save can never clear a bookmark
///
/// Inputs:
/// - Bookmarked place, then an update for the same place without the flag
///
/// Output:
/// - Stored place remains bookmarked (union-of-true merge rule)
async fn bookmark_survives_stale_resave() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut h = harness_in(dir.path());
    let mut p = place("cafe-central", 48.2102, 16.3669);
    p.bookmarked = true;
    h.engine.save_place(p, None);

    let mut stale = place("cafe-central", 48.2102, 16.3669);
    stale.subtitle = "Herrengasse 14".into();
    stale.bookmarked = false;
    h.engine.save_place(stale, None);

    let stored = &h.engine.state().saved_places[0];
    assert!(stored.bookmarked);
    assert_eq!(stored.subtitle, "Herrengasse 14");
}

#[tokio::test]
/// What: Saving attaches the association and merges by coordinate key
///
/// Inputs:
/// - Place saved under one id, then re-saved under a new id at the same spot
///
/// Output:
/// - One stored record keeping the original id with the new association
async fn association_and_coordinate_merge() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut h = harness_in(dir.path());
    h.engine.save_place(place("original", 48.2102, 16.3669), None);
    h.engine.save_place(
        place("different-id", 48.2102, 16.3669),
        Some(PlaceAssociation {
            trip: Some("vienna-2026".into()),
            day: Some("day-2".into()),
        }),
    );
    let stored = &h.engine.state().saved_places;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "original");
    assert_eq!(
        stored[0].association.as_ref().and_then(|a| a.trip.clone()),
        Some("vienna-2026".into())
    );
}

#[tokio::test]
/// What: Saved routes round-trip and keep the uniqueness invariant on disk
///
/// Inputs:
/// - Two saves for the same triple across two engine instances
///
/// Output:
/// - Reloaded collection has one route carrying the newest snapshot
async fn routes_round_trip_with_upsert() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let a = place("a", 50.1109, 8.6821);
    let b = place("b", 49.9929, 8.2473);
    {
        let mut h = harness_in(dir.path());
        h.places.set_route_response(Ok(routes("Old road", 2400.0, 42_000.0)));
        h.engine.route(&a, &b, TransportMode::Driving, false, true);
        assert!(h.engine.process_next_message().await);
        assert!(h.engine.save_route(&a, &b, TransportMode::Driving));
    }
    {
        let mut h = harness_in(dir.path());
        assert_eq!(h.engine.state().saved_routes.len(), 1);
        h.places.set_route_response(Ok(routes("New bypass", 1500.0, 38_000.0)));
        h.engine.route(&a, &b, TransportMode::Driving, false, true);
        assert!(h.engine.process_next_message().await);
        assert!(h.engine.save_route(&a, &b, TransportMode::Driving));
    }
    let h = harness_in(dir.path());
    let saved = &h.engine.state().saved_routes;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].primary.name, "New bypass");
    assert_eq!(saved[0].mode, TransportMode::Driving);
}

#[tokio::test]
/// What: Deleting a place removes it from disk as well
///
/// Inputs:
/// - Two saved places, one deleted, engine restarted
///
/// Output:
/// - Only the surviving place reloads
async fn delete_persists_across_restart() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    {
        let mut h = harness_in(dir.path());
        h.engine.save_place(place("keep", 48.0, 16.0), None);
        h.engine.save_place(place("drop", 50.0, 8.0), None);
        assert!(h.engine.delete_place("drop"));
    }
    let h = harness_in(dir.path());
    let reloaded = &h.engine.state().saved_places;
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].id, "keep");
}
