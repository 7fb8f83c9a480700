//! Derivation of offline-download suggestions from usage history.
//!
//! Suggestions are recomputed on demand and never persisted; region-hash
//! deduplication keeps already-downloaded and repeated candidates out.

use std::collections::HashSet;

use crate::config::EngineConfig;
use crate::state::{
    BoundingRegion, EngineState, Place, RegionSuggestion, SuggestionSource,
};

/// What: Build the suggestion candidate for a single place.
///
/// Inputs:
/// - `place`: Place to cover.
/// - `source`: Label source for the detail line.
/// - `span`: Square span in degrees around the place.
///
/// Output: Candidate region centered on the place.
fn candidate_for_place(place: &Place, source: SuggestionSource, span: f64) -> RegionSuggestion {
    let region = BoundingRegion::around(place.coord, span);
    RegionSuggestion {
        name: place.name.clone(),
        detail: source.label().to_string(),
        region,
        estimated_bytes: Some(region.estimated_bytes()),
        source,
    }
}

/// What: Recompute the pending download suggestions.
///
/// Inputs:
/// - `state`: Engine state (saved places/routes in, suggestions out).
/// - `config`: Geometry tunables (spans, padding).
/// - `focused`: Optional place currently selected in the planner.
///
/// Details:
/// - Candidates come from the focused place, every saved place (bookmarked
///   places labeled distinctly), and a padded box around each saved route's
///   endpoints.
/// - Any candidate whose region hash matches a downloaded region, or a
///   candidate emitted earlier in the same pass, is dropped. Survivors are
///   sorted by name.
pub(crate) fn recalculate(
    state: &mut EngineState,
    config: &EngineConfig,
    focused: Option<&Place>,
) {
    let mut seen: HashSet<String> = state
        .downloaded_regions
        .iter()
        .map(|r| r.region.region_hash())
        .collect();

    let mut candidates: Vec<RegionSuggestion> = Vec::new();
    if let Some(place) = focused {
        candidates.push(candidate_for_place(
            place,
            SuggestionSource::SelectedDestination,
            config.place_region_span_deg,
        ));
    }
    for place in &state.saved_places {
        let source = if place.bookmarked {
            SuggestionSource::BookmarkedPlace
        } else {
            SuggestionSource::SavedPlace
        };
        candidates.push(candidate_for_place(
            place,
            source,
            config.place_region_span_deg,
        ));
    }
    for route in &state.saved_routes {
        let region = BoundingRegion::enclosing(
            route.origin.coord,
            route.destination.coord,
            config.route_padding_factor,
            config.min_region_span_deg,
        );
        candidates.push(RegionSuggestion {
            name: format!("{} to {}", route.origin.name, route.destination.name),
            detail: SuggestionSource::SavedRoute.label().to_string(),
            region,
            estimated_bytes: Some(region.estimated_bytes()),
            source: SuggestionSource::SavedRoute,
        });
    }

    candidates.retain(|c| seen.insert(c.region_hash()));
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!(count = candidates.len(), "[Offline] suggestions recalculated");
    state.region_suggestions = candidates;
}
