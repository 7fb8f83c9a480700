//! External collaborator interfaces: place search/routing, offline map
//! downloads, and the analytics sink.
//!
//! The engine only ever talks to these traits; concrete implementations live
//! in submodules (see [`osm`]) or in the host application.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::state::{BoundingRegion, LatLng, PlaceCategory, StorageUsage, TransportMode};

pub mod osm;

/// Failure reported by a provider call.
///
/// Providers are untrusted-latency boundaries; every call may fail. The
/// engine converts these into its own error taxonomy before anything reaches
/// a caller.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self(e.to_string())
    }
}

/// Result alias for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A place as returned by the search provider, before the engine adopts it.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderPlace {
    /// Provider-stable identifier, when one exists.
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Address fragment or secondary line.
    pub subtitle: String,
    /// Coordinate.
    pub coord: LatLng,
    /// City or town, when known.
    pub locality: Option<String>,
    /// Administrative region, when known.
    pub region: Option<String>,
    /// Country, when known.
    pub country: Option<String>,
    /// Category, when the provider reports one.
    pub category: Option<PlaceCategory>,
    /// Phone number, when known.
    pub phone: Option<String>,
    /// Website, when known.
    pub url: Option<String>,
}

/// An autocomplete candidate from the provider-side completer.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderCompletion {
    /// Primary completion text.
    pub title: String,
    /// Secondary line (locality, country).
    pub subtitle: String,
    /// Coordinate, when the completer provides one.
    pub coord: Option<LatLng>,
}

/// One computed route candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderRoute {
    /// Short route name (main road or leg summary).
    pub name: String,
    /// Expected travel time in seconds.
    pub duration_secs: f64,
    /// Route length in meters.
    pub distance_meters: f64,
    /// Advisory notices attached by the provider.
    pub advisories: Vec<String>,
}

/// Result of a routing call: the chosen route plus any alternates.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderRoutes {
    /// Primary route.
    pub primary: ProviderRoute,
    /// Alternates, in provider preference order.
    pub alternatives: Vec<ProviderRoute>,
}

/// Search, completion, and routing provider.
#[async_trait]
pub trait PlaceProvider: Send + Sync {
    /// What: Search for places matching free-text input.
    ///
    /// Inputs:
    /// - `query`: Normalized query text.
    /// - `near`: Optional coordinate to bias results toward.
    /// - `categories`: Provider-side category keys, `None` for unfiltered.
    ///
    /// Output: Matching places in provider rank order.
    ///
    /// # Errors
    /// - Returns `Err` when the network call or payload decoding fails.
    async fn search_places(
        &self,
        query: &str,
        near: Option<LatLng>,
        categories: Option<&[&str]>,
    ) -> ProviderResult<Vec<ProviderPlace>>;

    /// What: Complete a short text fragment into place suggestions.
    ///
    /// Inputs:
    /// - `fragment`: Partial user input.
    /// - `near`: Optional coordinate to bias completions toward.
    ///
    /// Output: Completion candidates in provider rank order.
    ///
    /// # Errors
    /// - Returns `Err` when the network call or payload decoding fails.
    async fn complete(
        &self,
        fragment: &str,
        near: Option<LatLng>,
    ) -> ProviderResult<Vec<ProviderCompletion>>;

    /// What: Compute a route between two coordinates.
    ///
    /// Inputs:
    /// - `origin`, `destination`: Route endpoints.
    /// - `mode`: Transport mode.
    /// - `want_alternatives`: Whether alternates should be requested.
    ///
    /// Output: Primary route plus alternates.
    ///
    /// # Errors
    /// - Returns `Err` when the call fails or the mode is unsupported.
    async fn compute_route(
        &self,
        origin: LatLng,
        destination: LatLng,
        mode: TransportMode,
        want_alternatives: bool,
    ) -> ProviderResult<ProviderRoutes>;
}

/// One event in a download's status stream.
#[derive(Clone, Debug, PartialEq)]
pub enum DownloadStatus {
    /// Accepted by the provider, not yet transferring.
    Queued,
    /// Transfer progress as a fraction in `0..=1`.
    Progress(f64),
    /// Finished; carries the authoritative map record.
    Complete(OfflineMapInfo),
    /// Cancelled before completion.
    Cancelled,
    /// Ended with an error.
    Failed(String),
}

/// Authoritative record of a downloaded map held by the provider.
#[derive(Clone, Debug, PartialEq)]
pub struct OfflineMapInfo {
    /// Provider-assigned map identifier.
    pub id: String,
    /// Human-readable region name.
    pub name: String,
    /// Geographic bounds of the map.
    pub region: BoundingRegion,
    /// Size on disk, when known.
    pub size_bytes: Option<u64>,
    /// Last update time, seconds since the Unix epoch.
    pub updated_at: Option<i64>,
    /// Whether the provider has fresher data than the local copy.
    pub needs_update: bool,
}

/// Handle to one in-flight download.
///
/// The provider pushes [`DownloadStatus`] values into `events` as the
/// transfer proceeds; the engine consumes them from a per-download monitor
/// task. Dropping the receiver abandons monitoring but does not cancel the
/// transfer; use [`OfflineMapProvider::cancel_download`] for that.
#[derive(Debug)]
pub struct DownloadHandle {
    /// Provider identifier for this transfer, used for cancellation.
    pub id: String,
    /// Pull-based status event sequence.
    pub events: mpsc::Receiver<DownloadStatus>,
}

/// Offline map download provider.
#[async_trait]
pub trait OfflineMapProvider: Send + Sync {
    /// What: Start downloading a map covering the given region.
    ///
    /// Inputs:
    /// - `name`: Human-readable region name.
    /// - `region`: Bounds to download.
    ///
    /// Output: Handle carrying the transfer id and its status stream.
    ///
    /// # Errors
    /// - Returns `Err` when the download cannot be started.
    async fn download_region(
        &self,
        name: &str,
        region: BoundingRegion,
    ) -> ProviderResult<DownloadHandle>;

    /// What: List maps currently downloaded on this device.
    ///
    /// Inputs: none
    ///
    /// Output: Authoritative map records.
    ///
    /// # Errors
    /// - Returns `Err` when the provider store cannot be read.
    async fn list_downloaded(&self) -> ProviderResult<Vec<OfflineMapInfo>>;

    /// What: Delete a downloaded map.
    ///
    /// Inputs:
    /// - `info`: Record of the map to delete.
    ///
    /// # Errors
    /// - Returns `Err` when deletion fails.
    async fn delete_region(&self, info: &OfflineMapInfo) -> ProviderResult<()>;

    /// What: Re-download an existing map in place (an update).
    ///
    /// Inputs:
    /// - `info`: Record of the map to refresh.
    ///
    /// Output: Handle for the update transfer.
    ///
    /// # Errors
    /// - Returns `Err` when the update cannot be started.
    async fn update_region(&self, info: &OfflineMapInfo) -> ProviderResult<DownloadHandle>;

    /// What: Cancel an in-flight transfer.
    ///
    /// Inputs:
    /// - `id`: Provider transfer identifier from the [`DownloadHandle`].
    async fn cancel_download(&self, id: &str);

    /// What: Report aggregate storage usage.
    ///
    /// Inputs: none
    ///
    /// Output: Bytes used by maps and bytes still available.
    ///
    /// # Errors
    /// - Returns `Err` when usage cannot be determined.
    async fn storage_usage(&self) -> ProviderResult<StorageUsage>;
}

/// Fire-and-forget analytics sink; must never block or fail the caller.
pub trait AnalyticsSink: Send + Sync {
    /// What: Record one analytics event.
    ///
    /// Inputs:
    /// - `event`: Event name.
    /// - `metadata`: String key/value pairs attached to the event.
    fn log(&self, event: &str, metadata: &[(&str, String)]);
}

/// Default [`AnalyticsSink`] forwarding events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn log(&self, event: &str, metadata: &[(&str, String)]) {
        let fields: HashMap<&str, &str> = metadata
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        tracing::info!(event, ?fields, "[Analytics] event");
    }
}
