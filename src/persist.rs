//! Persistence of saved places and saved routes as JSON documents.
//!
//! Each document is written as a whole-file atomic replace (temp file plus
//! rename). Loading happens at most once per process; missing or corrupt
//! files yield empty collections rather than errors. Saved data is a
//! convenience cache, so failed writes are logged and not retried.

use std::fs;
use std::path::Path;

use chrono::Utc;

use crate::state::{EngineState, Place, PlaceAssociation};

/// What: Read one JSON document into a collection, tolerating absence and corruption.
///
/// Inputs:
/// - `path`: Document location.
/// - `what`: Label used in log lines.
///
/// Output: Parsed collection, or empty when missing/corrupt.
fn read_doc<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Vec<T> {
    match fs::read_to_string(path) {
        Ok(body) => match serde_json::from_str::<Vec<T>>(&body) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "[Persist] corrupt {what} document; starting empty"
                );
                Vec::new()
            }
        },
        Err(_) => Vec::new(),
    }
}

/// What: Write a JSON payload with atomic replace semantics.
///
/// Inputs:
/// - `path`: Target document location.
/// - `payload`: Serialized JSON body.
///
/// Output: `Ok(())` when the temp write and rename both succeed.
///
/// # Errors
/// - Propagates the underlying I/O error from the write or the rename.
fn atomic_write(path: &Path, payload: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload)?;
    fs::rename(&tmp, path)
}

/// What: Load both persisted documents if not already loaded.
///
/// Inputs:
/// - `state`: Engine state receiving the collections.
///
/// Details:
/// - Idempotent: repeated calls after the first are no-ops.
pub(crate) fn load_saved(state: &mut EngineState) {
    if state.persistence_loaded {
        return;
    }
    state.saved_places = read_doc(&state.places_path, "saved-places");
    state.saved_routes = read_doc(&state.routes_path, "saved-routes");
    state.persistence_loaded = true;
    tracing::debug!(
        places = state.saved_places.len(),
        routes = state.saved_routes.len(),
        "[Persist] documents loaded"
    );
}

/// What: Persist the saved places to disk if marked dirty.
///
/// Inputs:
/// - `state`: Engine state containing `saved_places` and `places_path`
///
/// Output:
/// - Writes `saved_places` JSON to `places_path` and clears the dirty flag.
pub(crate) fn maybe_flush_places(state: &mut EngineState) {
    if !state.places_dirty {
        return;
    }
    if let Ok(s) = serde_json::to_string(&state.saved_places) {
        tracing::debug!(
            path = %state.places_path.display(),
            bytes = s.len(),
            "[Persist] Writing saved places to disk"
        );
        match atomic_write(&state.places_path, &s) {
            Ok(()) => {
                tracing::debug!(
                    path = %state.places_path.display(),
                    "[Persist] Saved places persisted"
                );
            }
            Err(e) => {
                tracing::warn!(
                    path = %state.places_path.display(),
                    error = %e,
                    "[Persist] Failed to write saved places"
                );
            }
        }
        // Clear the dirty flag regardless to avoid rewrite loops.
        state.places_dirty = false;
    }
}

/// What: Persist the saved routes to disk if marked dirty.
///
/// Inputs:
/// - `state`: Engine state containing `saved_routes` and `routes_path`
///
/// Output:
/// - Writes `saved_routes` JSON to `routes_path` and clears the dirty flag.
pub(crate) fn maybe_flush_routes(state: &mut EngineState) {
    if !state.routes_dirty {
        return;
    }
    if let Ok(s) = serde_json::to_string(&state.saved_routes) {
        tracing::debug!(
            path = %state.routes_path.display(),
            bytes = s.len(),
            "[Persist] Writing saved routes to disk"
        );
        match atomic_write(&state.routes_path, &s) {
            Ok(()) => {
                tracing::debug!(
                    path = %state.routes_path.display(),
                    "[Persist] Saved routes persisted"
                );
            }
            Err(e) => {
                tracing::warn!(
                    path = %state.routes_path.display(),
                    error = %e,
                    "[Persist] Failed to write saved routes"
                );
            }
        }
        state.routes_dirty = false;
    }
}

/// What: Merge an incoming place into an existing record.
///
/// Inputs:
/// - `existing`: Stored place, mutated in place.
/// - `incoming`: Newly saved place data.
/// - `association`: Optional trip/day link to attach.
///
/// Details:
/// - Keeps the existing identity and creation timestamp.
/// - Prefers incoming non-empty subtitle/coordinate/category/phone/url.
/// - Unions the bookmark flag: a place once bookmarked stays bookmarked
///   through this path.
fn merge_into(existing: &mut Place, incoming: &Place, association: Option<PlaceAssociation>) {
    if !incoming.name.trim().is_empty() {
        existing.name = incoming.name.clone();
    }
    if !incoming.subtitle.trim().is_empty() {
        existing.subtitle = incoming.subtitle.clone();
    }
    existing.coord = incoming.coord;
    if incoming.locality.is_some() {
        existing.locality = incoming.locality.clone();
    }
    if incoming.region.is_some() {
        existing.region = incoming.region.clone();
    }
    if incoming.country.is_some() {
        existing.country = incoming.country.clone();
    }
    if incoming.category.is_some() {
        existing.category = incoming.category;
    }
    if incoming.phone.is_some() {
        existing.phone = incoming.phone.clone();
    }
    if incoming.url.is_some() {
        existing.url = incoming.url.clone();
    }
    existing.bookmarked = existing.bookmarked || incoming.bookmarked;
    if association.is_some() {
        existing.association = association;
    } else if incoming.association.is_some() {
        existing.association = incoming.association.clone();
    }
}

/// What: Save a place, merging into any existing record it duplicates.
///
/// Inputs:
/// - `state`: Engine state.
/// - `place`: Place to save.
/// - `association`: Optional trip/day link.
///
/// Details:
/// - Duplicate detection applies two lookups in fixed order: exact id match,
///   then coordinate-key match. The merge contract is in [`merge_into`].
/// - The collection is flushed before the call returns.
pub(crate) fn save_place(
    state: &mut EngineState,
    mut place: Place,
    association: Option<PlaceAssociation>,
) {
    let key = place.coordinate_key();
    let existing_idx = state
        .saved_places
        .iter()
        .position(|p| p.id == place.id)
        .or_else(|| {
            state
                .saved_places
                .iter()
                .position(|p| p.coordinate_key() == key)
        });
    if let Some(idx) = existing_idx {
        merge_into(&mut state.saved_places[idx], &place, association);
        tracing::debug!(id = %state.saved_places[idx].id, "[Persist] place merged");
    } else {
        if association.is_some() {
            place.association = association;
        }
        if place.created_at == 0 {
            place.created_at = Utc::now().timestamp();
        }
        tracing::debug!(id = %place.id, "[Persist] place saved");
        state.saved_places.insert(0, place);
    }
    state.places_dirty = true;
    maybe_flush_places(state);
}

/// What: Flip the bookmark flag on a stored place.
///
/// Inputs:
/// - `state`: Engine state.
/// - `id`: Place identifier.
///
/// Output: `true` when a place was found and toggled.
///
/// Details:
/// - This is the only path that can clear a bookmark; the save/merge path
///   unions flags and never un-bookmarks.
pub(crate) fn toggle_bookmark(state: &mut EngineState, id: &str) -> bool {
    let Some(place) = state.saved_places.iter_mut().find(|p| p.id == id) else {
        return false;
    };
    place.bookmarked = !place.bookmarked;
    state.places_dirty = true;
    maybe_flush_places(state);
    true
}

/// What: Remove a place by id.
///
/// Inputs:
/// - `state`: Engine state.
/// - `id`: Place identifier.
///
/// Output: `true` when a place was removed.
///
/// Details:
/// - Removal is by id only; coordinate-key collisions among distinct places
///   are never deleted by address.
pub(crate) fn delete_place(state: &mut EngineState, id: &str) -> bool {
    let before = state.saved_places.len();
    state.saved_places.retain(|p| p.id != id);
    if state.saved_places.len() == before {
        return false;
    }
    state.places_dirty = true;
    maybe_flush_places(state);
    true
}
