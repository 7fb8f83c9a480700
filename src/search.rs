//! Search and suggestion engine: query normalization, the in-memory result
//! cache, the debounced completer worker, and the handlers applied when
//! background work reports back.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

use crate::engine::EngineMessage;
use crate::providers::{AnalyticsSink, PlaceProvider, ProviderPlace};
use crate::state::{
    EngineState, LatLng, MapError, Place, PlaceCategory, SearchCacheKey, SearchRequest, Suggestion,
};

/// Input to the suggestion debounce worker, one value per keystroke.
#[derive(Clone, Debug)]
pub(crate) struct SuggestInput {
    /// Partial query text.
    pub fragment: String,
    /// Optional coordinate to bias completions toward.
    pub near: Option<LatLng>,
}

/// What: Adopt a provider search result as an engine place.
///
/// Inputs:
/// - `p`: Place as returned by the provider.
///
/// Output: Engine place; the id falls back to a coordinate-key derived one
/// when the provider has no stable identifier.
pub(crate) fn place_from_provider(p: &ProviderPlace) -> Place {
    let id = p
        .id
        .clone()
        .unwrap_or_else(|| format!("loc-{}", p.coord.coordinate_key()));
    Place {
        id,
        name: p.name.clone(),
        subtitle: p.subtitle.clone(),
        coord: p.coord,
        locality: p.locality.clone(),
        region: p.region.clone(),
        country: p.country.clone(),
        category: p.category,
        phone: p.phone.clone(),
        url: p.url.clone(),
        bookmarked: false,
        association: None,
        created_at: Utc::now().timestamp(),
    }
}

/// What: Run one search request against the cache, then the provider.
///
/// Inputs:
/// - `state`: Engine state (results, cache, coordination counters).
/// - `provider`: Search provider.
/// - `analytics`: Event sink.
/// - `msg_tx`: Channel the spawned task reports back on.
/// - `query`, `filter`, `near`: Request parameters.
///
/// Output:
/// - `Some(JoinHandle)` when a provider call was spawned; `None` on an empty
///   query or a cache hit.
///
/// Details:
/// - Empty/whitespace queries clear results without calling the provider.
/// - A cache hit publishes immediately and logs a `search_cache_hit` event.
/// - A miss marks the engine searching and allocates a fresh query id so any
///   older in-flight completion becomes a no-op.
pub(crate) fn begin_search(
    state: &mut EngineState,
    provider: &Arc<dyn PlaceProvider>,
    analytics: &Arc<dyn AnalyticsSink>,
    msg_tx: &mpsc::UnboundedSender<EngineMessage>,
    query: &str,
    filter: PlaceCategory,
    near: Option<LatLng>,
) -> Option<JoinHandle<()>> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        state.results.clear();
        state.searching = false;
        // Invalidate any in-flight completion; its id can no longer match.
        state.alloc_query_id();
        return None;
    }
    state.last_search = Some(SearchRequest {
        query: trimmed.to_string(),
        filter,
        near,
    });
    let key = SearchCacheKey::new(trimmed, filter);
    if let Some(cached) = state.search_cache.get(&key) {
        tracing::debug!(query = trimmed, "[Search] served from cache");
        state.results = cached.clone();
        state.searching = false;
        state.last_search_error = None;
        // Invalidate any in-flight completion; its id can no longer match.
        state.alloc_query_id();
        analytics.log("search_cache_hit", &[("query", trimmed.to_string())]);
        return None;
    }
    state.searching = true;
    let id = state.alloc_query_id();
    tracing::debug!(query = trimmed, id, "[Search] dispatching provider search");
    let provider = Arc::clone(provider);
    let tx = msg_tx.clone();
    let text = trimmed.to_string();
    Some(tokio::spawn(async move {
        let outcome = provider
            .search_places(&text, near, filter.provider_keys())
            .await;
        let _ = tx.send(EngineMessage::SearchCompleted { id, outcome });
    }))
}

/// What: Apply a finished search to the state.
///
/// Inputs:
/// - `state`: Engine state.
/// - `analytics`: Event sink.
/// - `id`: Query id echoed by the completed task.
/// - `outcome`: Provider result.
///
/// Details:
/// - Stale completions (superseded query id) are dropped.
/// - Failures surface a typed error and leave prior results untouched.
pub(crate) fn handle_search_completed(
    state: &mut EngineState,
    analytics: &Arc<dyn AnalyticsSink>,
    id: u64,
    outcome: Result<Vec<ProviderPlace>, crate::providers::ProviderError>,
) {
    if id != state.latest_query_id {
        tracing::trace!(id, latest = state.latest_query_id, "[Search] stale result dropped");
        return;
    }
    state.searching = false;
    match outcome {
        Ok(found) => {
            let places: Vec<Place> = found.iter().map(place_from_provider).collect();
            if let Some(req) = &state.last_search {
                let key = SearchCacheKey::new(&req.query, req.filter);
                state.search_cache.put(key, places.clone());
            }
            analytics.log(
                "search_completed",
                &[("results", places.len().to_string())],
            );
            state.results = places;
            state.last_search_error = None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "[Search] provider search failed");
            state.last_search_error = Some(MapError::SearchFailed {
                message: e.to_string(),
            });
        }
    }
}

/// What: Re-issue the most recently requested search.
///
/// Inputs: as [`begin_search`], minus the request parameters.
///
/// Output: Join handle when a provider call was spawned.
pub(crate) fn retry_last_search(
    state: &mut EngineState,
    provider: &Arc<dyn PlaceProvider>,
    analytics: &Arc<dyn AnalyticsSink>,
    msg_tx: &mpsc::UnboundedSender<EngineMessage>,
) -> Option<JoinHandle<()>> {
    let Some(last) = state.last_search.clone() else {
        return None;
    };
    // Retry means a fresh provider attempt, not a cache replay.
    state.search_cache.pop(&SearchCacheKey::new(&last.query, last.filter));
    begin_search(
        state, provider, analytics, msg_tx, &last.query, last.filter, last.near,
    )
}

/// What: Apply a completer result batch to the suggestion list.
///
/// Inputs:
/// - `state`: Engine state.
/// - `items`: Mapped suggestions (empty on completer failure).
pub(crate) fn handle_suggestions_ready(state: &mut EngineState, items: Vec<Suggestion>) {
    state.suggestions = items;
}

/// What: Spawn the debounced suggestion worker.
///
/// Inputs:
/// - `input_rx`: Channel receiver for keystroke fragments.
/// - `provider`: Completer provider.
/// - `msg_tx`: Channel sender for mapped suggestion batches.
/// - `debounce_ms`: Quiet window before the completer is called.
///
/// Details:
/// - Restarts the sleep on every keystroke so only the latest fragment is
///   dispatched once input pauses.
/// - Completer failures collapse silently to an empty suggestion list.
pub(crate) fn spawn_suggest_worker(
    mut input_rx: mpsc::UnboundedReceiver<SuggestInput>,
    provider: Arc<dyn PlaceProvider>,
    msg_tx: mpsc::UnboundedSender<EngineMessage>,
    debounce_ms: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(mut latest) = input_rx.recv().await else {
                break;
            };
            loop {
                tokio::select! {
                    Some(next) = input_rx.recv() => { latest = next; }
                    () = sleep(Duration::from_millis(debounce_ms)) => { break; }
                }
            }
            if latest.fragment.trim().is_empty() {
                let _ = msg_tx.send(EngineMessage::SuggestionsReady { items: Vec::new() });
                continue;
            }
            let items = match provider.complete(latest.fragment.trim(), latest.near).await {
                Ok(completions) => completions
                    .into_iter()
                    .map(|c| Suggestion {
                        title: c.title,
                        subtitle: c.subtitle,
                        coord: c.coord,
                    })
                    .collect(),
                Err(e) => {
                    tracing::debug!(error = %e, "[Search] completer failed; clearing suggestions");
                    Vec::new()
                }
            };
            let _ = msg_tx.send(EngineMessage::SuggestionsReady { items });
        }
    })
}
