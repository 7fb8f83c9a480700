//! Offline region manager: download lifecycle, per-download monitor tasks,
//! and reconciliation with the provider's authoritative map list.

pub mod suggest;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::EngineMessage;
use crate::providers::{
    AnalyticsSink, DownloadStatus, OfflineMapInfo, OfflineMapProvider,
};
use crate::state::{
    ActiveDownload, EngineState, MapError, OfflineRegion, RegionStatus, RegionSuggestion,
};
use crate::util::{format_bytes, ts_to_date};

/// What: Compose the user-visible subtitle for a downloaded region.
///
/// Inputs:
/// - `size_bytes`: Size on disk, when known.
/// - `updated_at`: Last update time, when known.
///
/// Output: Line like `"120.0 MiB, updated 2026-08-01 10:15:00"`.
fn subtitle_for(size_bytes: Option<u64>, updated_at: Option<i64>) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(bytes) = size_bytes {
        parts.push(format_bytes(bytes));
    }
    if updated_at.is_some() {
        parts.push(format!("updated {}", ts_to_date(updated_at)));
    }
    if parts.is_empty() {
        "Downloaded".to_string()
    } else {
        parts.join(", ")
    }
}

/// What: Map a provider record onto the user-visible region model.
///
/// Inputs:
/// - `info`: Authoritative provider record.
///
/// Output: Region with recomputed subtitle and `Available`/`NeedsUpdate` status.
pub(crate) fn region_from_info(info: &OfflineMapInfo) -> OfflineRegion {
    let updated_at = info.updated_at.unwrap_or_else(|| Utc::now().timestamp());
    let status = if info.needs_update {
        RegionStatus::NeedsUpdate { updated_at }
    } else {
        RegionStatus::Available { updated_at }
    };
    OfflineRegion {
        id: info.id.clone(),
        name: info.name.clone(),
        subtitle: subtitle_for(info.size_bytes, info.updated_at),
        region: info.region,
        size_bytes: info.size_bytes,
        updated_at: info.updated_at,
        status,
    }
}

/// What: Rebuild the provider record for a region held in state.
///
/// Inputs:
/// - `region`: User-visible region model.
///
/// Output: Provider record for delete/update calls.
fn info_from_region(region: &OfflineRegion) -> OfflineMapInfo {
    OfflineMapInfo {
        id: region.id.clone(),
        name: region.name.clone(),
        region: region.region,
        size_bytes: region.size_bytes,
        updated_at: region.updated_at,
        needs_update: matches!(region.status, RegionStatus::NeedsUpdate { .. }),
    }
}

/// What: Spawn the monitor task consuming one download's status stream.
///
/// Inputs:
/// - `engine_id`: Synthetic download id the events are attributed to.
/// - `events`: Provider status stream.
/// - `msg_tx`: Channel the events are forwarded onto.
///
/// Output: Join handle for the monitor (aborted on cancellation).
fn spawn_download_monitor(
    engine_id: String,
    mut events: mpsc::Receiver<DownloadStatus>,
    msg_tx: mpsc::UnboundedSender<EngineMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(status) = events.recv().await {
            if msg_tx
                .send(EngineMessage::DownloadEvent {
                    id: engine_id.clone(),
                    status,
                })
                .is_err()
            {
                break;
            }
        }
    })
}

/// What: Start downloading a suggested region.
///
/// Inputs:
/// - `state`: Engine state.
/// - `provider`: Offline map provider.
/// - `analytics`: Event sink.
/// - `msg_tx`: Channel the monitor forwards status events onto.
/// - `monitors`: Live monitor tasks keyed by synthetic download id.
/// - `suggestion`: Region candidate to download.
///
/// Details:
/// - No-op when the suggestion's region hash already has an active download.
/// - Records a `Queued` snapshot before the first provider status arrives.
pub(crate) async fn begin_download(
    state: &mut EngineState,
    provider: &Arc<dyn OfflineMapProvider>,
    analytics: &Arc<dyn AnalyticsSink>,
    msg_tx: &mpsc::UnboundedSender<EngineMessage>,
    monitors: &mut HashMap<String, JoinHandle<()>>,
    suggestion: &RegionSuggestion,
) {
    let hash = suggestion.region_hash();
    if state.active_downloads.iter().any(|d| d.region_hash == hash) {
        tracing::debug!(region = %suggestion.name, "[Offline] download already active; ignoring");
        return;
    }
    match provider.download_region(&suggestion.name, suggestion.region).await {
        Ok(handle) => {
            let engine_id = state.alloc_download_id("dl");
            tracing::info!(
                region = %suggestion.name,
                id = %engine_id,
                "[Offline] download started"
            );
            analytics.log(
                "offline_download_started",
                &[("region", suggestion.name.clone())],
            );
            state.active_downloads.push(ActiveDownload {
                id: engine_id.clone(),
                provider_id: handle.id,
                region_name: suggestion.name.clone(),
                region_hash: hash,
                status: RegionStatus::Queued,
                progress: 0.0,
                message: "Waiting to start".to_string(),
            });
            monitors.insert(
                engine_id.clone(),
                spawn_download_monitor(engine_id, handle.events, msg_tx.clone()),
            );
        }
        Err(e) => {
            tracing::warn!(region = %suggestion.name, error = %e, "[Offline] download failed to start");
            state.last_download_error = Some(MapError::DownloadFailed {
                region: suggestion.name.clone(),
                message: e.to_string(),
            });
        }
    }
}

/// What: Apply one provider status event to the matching download snapshot.
///
/// Inputs:
/// - `state`: Engine state.
/// - `analytics`: Event sink.
/// - `id`: Synthetic download id the event belongs to.
/// - `status`: Provider status event.
///
/// Output: `true` when the event was terminal and the monitor can be dropped.
///
/// Details:
/// - Terminal events remove the download from the active list; already
///   downloaded regions are never touched by cancellation or failure.
pub(crate) fn handle_download_event(
    state: &mut EngineState,
    analytics: &Arc<dyn AnalyticsSink>,
    id: &str,
    status: DownloadStatus,
) -> bool {
    let Some(idx) = state.active_downloads.iter().position(|d| d.id == id) else {
        // Bookkeeping already removed (e.g. cancelled); drop the monitor.
        return true;
    };
    match status {
        DownloadStatus::Queued => {
            let entry = &mut state.active_downloads[idx];
            entry.status = RegionStatus::Queued;
            entry.progress = 0.0;
            entry.message = "Waiting to start".to_string();
            false
        }
        DownloadStatus::Progress(p) => {
            let fraction = p.clamp(0.0, 1.0);
            let entry = &mut state.active_downloads[idx];
            entry.status = RegionStatus::Downloading(fraction);
            entry.progress = fraction;
            entry.message = format!("Downloading {:.0}%", fraction * 100.0);
            false
        }
        DownloadStatus::Complete(info) => {
            let entry = state.active_downloads.remove(idx);
            tracing::info!(region = %entry.region_name, id, "[Offline] download completed");
            analytics.log(
                "offline_download_completed",
                &[("region", entry.region_name.clone())],
            );
            let region = region_from_info(&info);
            if let Some(existing) = state
                .downloaded_regions
                .iter_mut()
                .find(|r| r.id == region.id)
            {
                *existing = region;
            } else {
                state.downloaded_regions.push(region);
            }
            true
        }
        DownloadStatus::Cancelled => {
            let entry = state.active_downloads.remove(idx);
            tracing::info!(region = %entry.region_name, id, "[Offline] download cancelled");
            true
        }
        DownloadStatus::Failed(message) => {
            let entry = state.active_downloads.remove(idx);
            tracing::warn!(
                region = %entry.region_name,
                id,
                error = %message,
                "[Offline] download failed"
            );
            analytics.log(
                "offline_download_failed",
                &[
                    ("region", entry.region_name.clone()),
                    ("error", message.clone()),
                ],
            );
            state.last_download_error = Some(MapError::DownloadFailed {
                region: entry.region_name,
                message,
            });
            true
        }
    }
}

/// What: Cancel an active download and remove its bookkeeping.
///
/// Inputs:
/// - `state`: Engine state.
/// - `provider`: Offline map provider.
/// - `monitors`: Live monitor tasks keyed by synthetic download id.
/// - `id`: Synthetic download id to cancel.
///
/// Details:
/// - Stops provider work, aborts the monitor, and discards the snapshot.
///   Previously completed regions are untouched.
pub(crate) async fn cancel_download(
    state: &mut EngineState,
    provider: &Arc<dyn OfflineMapProvider>,
    monitors: &mut HashMap<String, JoinHandle<()>>,
    id: &str,
) {
    let Some(idx) = state.active_downloads.iter().position(|d| d.id == id) else {
        return;
    };
    let entry = state.active_downloads.remove(idx);
    provider.cancel_download(&entry.provider_id).await;
    if let Some(monitor) = monitors.remove(id) {
        monitor.abort();
    }
    tracing::info!(region = %entry.region_name, id, "[Offline] download cancelled by user");
}

/// What: Delete a downloaded map and refresh the collection view.
///
/// Inputs:
/// - `state`: Engine state.
/// - `provider`: Offline map provider.
/// - `region`: Region to delete.
pub(crate) async fn delete_region(
    state: &mut EngineState,
    provider: &Arc<dyn OfflineMapProvider>,
    region: &OfflineRegion,
) {
    let info = info_from_region(region);
    match provider.delete_region(&info).await {
        Ok(()) => {
            tracing::info!(region = %region.name, "[Offline] region deleted");
            refresh_collections(state, provider).await;
        }
        Err(e) => {
            tracing::warn!(region = %region.name, error = %e, "[Offline] delete failed");
            state.last_download_error = Some(MapError::DownloadFailed {
                region: region.name.clone(),
                message: e.to_string(),
            });
        }
    }
}

/// What: Re-download an existing map in place (an update).
///
/// Inputs:
/// - `state`: Engine state.
/// - `provider`: Offline map provider.
/// - `analytics`: Event sink.
/// - `msg_tx`: Channel the monitor forwards status events onto.
/// - `monitors`: Live monitor tasks keyed by synthetic download id.
/// - `region`: Region to update.
///
/// Details:
/// - The update is tracked under a new synthetic download id, re-entering the
///   downloading lifecycle from a terminal success state.
pub(crate) async fn update_region(
    state: &mut EngineState,
    provider: &Arc<dyn OfflineMapProvider>,
    analytics: &Arc<dyn AnalyticsSink>,
    msg_tx: &mpsc::UnboundedSender<EngineMessage>,
    monitors: &mut HashMap<String, JoinHandle<()>>,
    region: &OfflineRegion,
) {
    let info = info_from_region(region);
    match provider.update_region(&info).await {
        Ok(handle) => {
            let engine_id = state.alloc_download_id("upd");
            tracing::info!(region = %region.name, id = %engine_id, "[Offline] update started");
            analytics.log(
                "offline_download_started",
                &[
                    ("region", region.name.clone()),
                    ("kind", "update".to_string()),
                ],
            );
            state.active_downloads.push(ActiveDownload {
                id: engine_id.clone(),
                provider_id: handle.id,
                region_name: region.name.clone(),
                region_hash: region.region.region_hash(),
                status: RegionStatus::Queued,
                progress: 0.0,
                message: "Waiting to start".to_string(),
            });
            monitors.insert(
                engine_id.clone(),
                spawn_download_monitor(engine_id, handle.events, msg_tx.clone()),
            );
        }
        Err(e) => {
            tracing::warn!(region = %region.name, error = %e, "[Offline] update failed to start");
            state.last_download_error = Some(MapError::DownloadFailed {
                region: region.name.clone(),
                message: e.to_string(),
            });
        }
    }
}

/// What: Reconcile the manager's view with the provider's downloaded maps.
///
/// Inputs:
/// - `state`: Engine state.
/// - `provider`: Offline map provider.
///
/// Details:
/// - Recomputes subtitle, size, and status for every region and refreshes
///   aggregate storage usage. Failures degrade to "no new data".
pub(crate) async fn refresh_collections(
    state: &mut EngineState,
    provider: &Arc<dyn OfflineMapProvider>,
) {
    match provider.list_downloaded().await {
        Ok(infos) => {
            state.downloaded_regions = infos.iter().map(region_from_info).collect();
            tracing::debug!(
                count = state.downloaded_regions.len(),
                "[Offline] collections refreshed"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "[Offline] failed to list downloaded regions");
        }
    }
    match provider.storage_usage().await {
        Ok(usage) => state.storage = Some(usage),
        Err(e) => {
            tracing::debug!(error = %e, "[Offline] storage usage unavailable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::providers::TracingAnalytics;
    use crate::state::{BoundingRegion, LatLng};

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

    fn active(id: &str, name: &str) -> ActiveDownload {
        ActiveDownload {
            id: id.into(),
            provider_id: format!("prov-{id}"),
            region_name: name.into(),
            region_hash: BoundingRegion::around(LatLng::new(50.0, 8.0), 0.25).region_hash(),
            status: RegionStatus::Queued,
            progress: 0.0,
            message: "Waiting to start".into(),
        }
    }

    fn map_info(id: &str, name: &str, needs_update: bool) -> OfflineMapInfo {
        OfflineMapInfo {
            id: id.into(),
            name: name.into(),
            region: BoundingRegion::around(LatLng::new(50.0, 8.0), 0.25),
            size_bytes: Some(120 * 1024 * 1024),
            updated_at: Some(1_700_000_000),
            needs_update,
        }
    }

    #[test]
    /// What: Progress events mutate the matching snapshot in place
    ///
    /// - Input: Active download receiving queued then 55% progress
    /// - Output: Status, fraction, and message updated; event is not terminal
    fn offline_progress_updates_snapshot() {
        let mut state = test_state();
        state.active_downloads.push(active("dl-1", "Berlin"));
        let terminal =
            handle_download_event(&mut state, &analytics(), "dl-1", DownloadStatus::Progress(0.55));
        assert!(!terminal);
        let entry = &state.active_downloads[0];
        assert_eq!(entry.status, RegionStatus::Downloading(0.55));
        assert!((entry.progress - 0.55).abs() < f64::EPSILON);
        assert_eq!(entry.message, "Downloading 55%");
    }

    #[test]
    /// What: Completion moves the download into the downloaded collection
    ///
    /// - Input: Active download receiving a Complete event
    /// - Output: Active list empty, region present with Available status
    fn offline_completion_lands_in_collection() {
        let mut state = test_state();
        state.active_downloads.push(active("dl-1", "Berlin"));
        let terminal = handle_download_event(
            &mut state,
            &analytics(),
            "dl-1",
            DownloadStatus::Complete(map_info("map-berlin", "Berlin", false)),
        );
        assert!(terminal);
        assert!(state.active_downloads.is_empty());
        assert_eq!(state.downloaded_regions.len(), 1);
        assert!(matches!(
            state.downloaded_regions[0].status,
            RegionStatus::Available { .. }
        ));
    }

    #[test]
    /// What: Failure removes the download and records a typed error
    ///
    /// - Input: Active download receiving a Failed event
    /// - Output: Active list empty, `DownloadFailed` recorded, completed regions untouched
    fn offline_failure_records_error() {
        let mut state = test_state();
        state.downloaded_regions.push(region_from_info(&map_info(
            "map-paris",
            "Paris",
            false,
        )));
        state.active_downloads.push(active("dl-2", "Berlin"));
        let terminal = handle_download_event(
            &mut state,
            &analytics(),
            "dl-2",
            DownloadStatus::Failed("disk full".into()),
        );
        assert!(terminal);
        assert!(state.active_downloads.is_empty());
        assert_eq!(state.downloaded_regions.len(), 1);
        assert_eq!(
            state.last_download_error,
            Some(MapError::DownloadFailed {
                region: "Berlin".into(),
                message: "disk full".into(),
            })
        );
    }

    #[test]
    /// What: Events for unknown downloads are terminal no-ops
    ///
    /// - Input: Progress event for an id with no bookkeeping
    /// - Output: Returns terminal so the stray monitor is dropped
    fn offline_unknown_download_event_is_terminal() {
        let mut state = test_state();
        assert!(handle_download_event(
            &mut state,
            &analytics(),
            "dl-gone",
            DownloadStatus::Progress(0.5)
        ));
    }

    #[test]
    /// What: Provider records map onto regions with recomputed subtitles
    ///
    /// - Input: Records with and without the needs-update flag
    /// - Output: Matching status variants and a size+date subtitle
    fn offline_region_from_info_statuses() {
        let fresh = region_from_info(&map_info("m1", "Berlin", false));
        assert!(matches!(fresh.status, RegionStatus::Available { .. }));
        assert!(fresh.subtitle.contains("MiB"));
        assert!(fresh.subtitle.contains("updated "));
        let stale = region_from_info(&map_info("m2", "Paris", true));
        assert!(matches!(stale.status, RegionStatus::NeedsUpdate { .. }));
    }
}
