//! Shared scripted providers and helpers for integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use waymark::providers::{
    AnalyticsSink, DownloadHandle, DownloadStatus, OfflineMapInfo, OfflineMapProvider,
    PlaceProvider, ProviderCompletion, ProviderError, ProviderPlace, ProviderResult,
    ProviderRoute, ProviderRoutes,
};
use waymark::state::{BoundingRegion, LatLng, Place, StorageUsage, TransportMode};

/// Place provider returning scripted responses and counting calls.
pub struct ScriptedPlaceProvider {
    pub search_calls: AtomicUsize,
    pub route_calls: AtomicUsize,
    pub complete_calls: AtomicUsize,
    pub search_response: Mutex<Result<Vec<ProviderPlace>, String>>,
    pub complete_response: Mutex<Result<Vec<ProviderCompletion>, String>>,
    pub route_response: Mutex<Result<ProviderRoutes, String>>,
}

impl ScriptedPlaceProvider {
    pub fn new() -> Self {
        Self {
            search_calls: AtomicUsize::new(0),
            route_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
            search_response: Mutex::new(Ok(Vec::new())),
            complete_response: Mutex::new(Ok(Vec::new())),
            route_response: Mutex::new(Ok(routes("Route", 600.0, 5_000.0))),
        }
    }

    pub fn set_search_response(&self, response: Result<Vec<ProviderPlace>, &str>) {
        *self
            .search_response
            .lock()
            .expect("search_response lock poisoned") = response.map_err(str::to_string);
    }

    pub fn set_complete_response(&self, response: Result<Vec<ProviderCompletion>, &str>) {
        *self
            .complete_response
            .lock()
            .expect("complete_response lock poisoned") = response.map_err(str::to_string);
    }

    pub fn set_route_response(&self, response: Result<ProviderRoutes, &str>) {
        *self
            .route_response
            .lock()
            .expect("route_response lock poisoned") = response.map_err(str::to_string);
    }
}

#[async_trait]
impl PlaceProvider for ScriptedPlaceProvider {
    async fn search_places(
        &self,
        _query: &str,
        _near: Option<LatLng>,
        _categories: Option<&[&str]>,
    ) -> ProviderResult<Vec<ProviderPlace>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.search_response
            .lock()
            .expect("search_response lock poisoned")
            .clone()
            .map_err(ProviderError)
    }

    async fn complete(
        &self,
        _fragment: &str,
        _near: Option<LatLng>,
    ) -> ProviderResult<Vec<ProviderCompletion>> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.complete_response
            .lock()
            .expect("complete_response lock poisoned")
            .clone()
            .map_err(ProviderError)
    }

    async fn compute_route(
        &self,
        _origin: LatLng,
        _destination: LatLng,
        _mode: TransportMode,
        _want_alternatives: bool,
    ) -> ProviderResult<ProviderRoutes> {
        self.route_calls.fetch_add(1, Ordering::SeqCst);
        self.route_response
            .lock()
            .expect("route_response lock poisoned")
            .clone()
            .map_err(ProviderError)
    }
}

/// Offline provider handing out channel-backed download handles the test can
/// feed status events through.
pub struct ScriptedOfflineProvider {
    pub download_calls: AtomicUsize,
    next_id: AtomicUsize,
    pub regions: Mutex<Vec<OfflineMapInfo>>,
    pub cancelled: Mutex<Vec<String>>,
    pub handles: Mutex<Vec<(String, mpsc::Sender<DownloadStatus>)>>,
    pub storage: Mutex<StorageUsage>,
}

impl ScriptedOfflineProvider {
    pub fn new() -> Self {
        Self {
            download_calls: AtomicUsize::new(0),
            next_id: AtomicUsize::new(0),
            regions: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            storage: Mutex::new(StorageUsage {
                used_bytes: 0,
                available_bytes: 64 * 1024 * 1024 * 1024,
            }),
        }
    }

    fn new_handle(&self, prefix: &str) -> DownloadHandle {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("{prefix}-{n}");
        let (tx, rx) = mpsc::channel(16);
        self.handles
            .lock()
            .expect("handles lock poisoned")
            .push((id.clone(), tx));
        DownloadHandle { id, events: rx }
    }

    /// Sender for the most recently started download.
    pub fn latest_sender(&self) -> mpsc::Sender<DownloadStatus> {
        self.handles
            .lock()
            .expect("handles lock poisoned")
            .last()
            .map(|(_, tx)| tx.clone())
            .expect("no download handle issued yet")
    }

    pub fn add_region(&self, info: OfflineMapInfo) {
        self.regions
            .lock()
            .expect("regions lock poisoned")
            .push(info);
    }

    pub fn cancelled_ids(&self) -> Vec<String> {
        self.cancelled
            .lock()
            .expect("cancelled lock poisoned")
            .clone()
    }
}

#[async_trait]
impl OfflineMapProvider for ScriptedOfflineProvider {
    async fn download_region(
        &self,
        _name: &str,
        _region: BoundingRegion,
    ) -> ProviderResult<DownloadHandle> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.new_handle("prov"))
    }

    async fn list_downloaded(&self) -> ProviderResult<Vec<OfflineMapInfo>> {
        Ok(self.regions.lock().expect("regions lock poisoned").clone())
    }

    async fn delete_region(&self, info: &OfflineMapInfo) -> ProviderResult<()> {
        self.regions
            .lock()
            .expect("regions lock poisoned")
            .retain(|r| r.id != info.id);
        Ok(())
    }

    async fn update_region(&self, _info: &OfflineMapInfo) -> ProviderResult<DownloadHandle> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.new_handle("prov-upd"))
    }

    async fn cancel_download(&self, id: &str) {
        self.cancelled
            .lock()
            .expect("cancelled lock poisoned")
            .push(id.to_string());
    }

    async fn storage_usage(&self) -> ProviderResult<StorageUsage> {
        Ok(*self.storage.lock().expect("storage lock poisoned"))
    }
}

/// Analytics sink recording every event for assertions.
#[derive(Default)]
pub struct RecordingAnalytics {
    pub events: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl RecordingAnalytics {
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .expect("events lock poisoned")
            .iter()
            .filter(|(event, _)| event == name)
            .count()
    }
}

impl AnalyticsSink for RecordingAnalytics {
    fn log(&self, event: &str, metadata: &[(&str, String)]) {
        self.events
            .lock()
            .expect("events lock poisoned")
            .push((
                event.to_string(),
                metadata
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), v.clone()))
                    .collect(),
            ));
    }
}

/// Build a provider place at a coordinate.
pub fn provider_place(name: &str, lat: f64, lon: f64) -> ProviderPlace {
    ProviderPlace {
        id: Some(format!("node/{name}")),
        name: name.to_string(),
        subtitle: format!("{name} street"),
        coord: LatLng::new(lat, lon),
        locality: None,
        region: None,
        country: None,
        category: None,
        phone: None,
        url: None,
    }
}

/// Build an engine place at a coordinate.
pub fn place(id: &str, lat: f64, lon: f64) -> Place {
    Place {
        id: id.to_string(),
        name: id.to_string(),
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

/// Build a scripted routing response with one primary route.
pub fn routes(name: &str, duration_secs: f64, distance_meters: f64) -> ProviderRoutes {
    ProviderRoutes {
        primary: ProviderRoute {
            name: name.to_string(),
            duration_secs,
            distance_meters,
            advisories: Vec::new(),
        },
        alternatives: Vec::new(),
    }
}

/// Build a provider map record covering a square region.
pub fn map_info(id: &str, name: &str, center: LatLng, span: f64) -> OfflineMapInfo {
    OfflineMapInfo {
        id: id.to_string(),
        name: name.to_string(),
        region: BoundingRegion::around(center, span),
        size_bytes: Some(96 * 1024 * 1024),
        updated_at: Some(1_750_000_000),
        needs_update: false,
    }
}
