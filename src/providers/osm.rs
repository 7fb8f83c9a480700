//! OpenStreetMap-backed provider implementation.
//!
//! Search goes through Nominatim, completions through the Photon completer,
//! and routing through the public OSRM router. Hosts with a commercial map
//! stack implement [`PlaceProvider`] themselves; this implementation keeps
//! the engine usable out of the box.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::providers::{
    PlaceProvider, ProviderCompletion, ProviderError, ProviderPlace, ProviderResult,
    ProviderRoute, ProviderRoutes,
};
use crate::state::{LatLng, PlaceCategory, TransportMode};
use crate::util::{f64_of, s, ss};

/// Degrees of viewbox half-span applied when a search is geo-biased.
const NEARBY_VIEWBOX_SPAN: f64 = 0.3;

/// [`PlaceProvider`] over public OpenStreetMap services.
#[derive(Clone, Debug)]
pub struct OsmProvider {
    client: reqwest::Client,
    search_base: String,
    completer_base: String,
    router_base: String,
}

impl OsmProvider {
    /// What: Build a provider with the configured HTTP timeout.
    ///
    /// Inputs:
    /// - `config`: Engine configuration supplying `provider_timeout_secs`.
    ///
    /// Output: Ready provider talking to the public OSM endpoints.
    ///
    /// # Panics
    /// - Panics only if the TLS backend cannot be initialized at all.
    #[must_use]
    #[allow(clippy::missing_panics_doc, clippy::expect_used)]
    pub fn new(config: &EngineConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.provider_timeout_secs))
            .user_agent(concat!("waymark/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            search_base: "https://nominatim.openstreetmap.org".to_string(),
            completer_base: "https://photon.komoot.io".to_string(),
            router_base: "https://router.project-osrm.org".to_string(),
        }
    }

    /// What: Point the provider at alternate endpoint hosts.
    ///
    /// Inputs:
    /// - `search`, `completer`, `router`: Base URLs without trailing slash.
    ///
    /// Output: Provider using the given hosts (self-hosted stacks, tests).
    #[must_use]
    pub fn with_endpoints(mut self, search: &str, completer: &str, router: &str) -> Self {
        self.search_base = search.trim_end_matches('/').to_string();
        self.completer_base = completer.trim_end_matches('/').to_string();
        self.router_base = router.trim_end_matches('/').to_string();
        self
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> ProviderResult<Value> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError(format!("Network error: {e}")))?;
        if !resp.status().is_success() {
            return Err(ProviderError(format!(
                "request failed with status {}",
                resp.status()
            )));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ProviderError(format!("Failed to decode response: {e}")))
    }
}

/// What: Map a Nominatim class name onto the engine's category enum.
///
/// Inputs:
/// - `class`: Nominatim `category`/class field.
///
/// Output: `Some(PlaceCategory)` for recognized classes; `None` otherwise.
fn category_of_class(class: &str) -> Option<PlaceCategory> {
    match class {
        "amenity" => Some(PlaceCategory::Food),
        "tourism" => Some(PlaceCategory::Attraction),
        "railway" | "aeroway" | "public_transport" => Some(PlaceCategory::Transport),
        "shop" => Some(PlaceCategory::Shopping),
        "leisure" | "natural" => Some(PlaceCategory::Outdoor),
        _ => None,
    }
}

/// What: Convert one Nominatim result object into a provider place.
///
/// Inputs:
/// - `obj`: JSON object from the search response array.
///
/// Output: `Some(ProviderPlace)` when both coordinates parse; `None` otherwise.
fn place_of_value(obj: &Value) -> Option<ProviderPlace> {
    let lat = f64_of(obj, "lat")?;
    let lon = f64_of(obj, "lon")?;
    let display_name = s(obj, "display_name");
    let name = {
        let n = s(obj, "name");
        if n.is_empty() {
            display_name
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        } else {
            n
        }
    };
    if name.is_empty() {
        return None;
    }
    let address = obj.get("address").cloned().unwrap_or(Value::Null);
    let extratags = obj.get("extratags").cloned().unwrap_or(Value::Null);
    let osm_type = s(obj, "osm_type");
    let osm_id = obj.get("osm_id").and_then(Value::as_u64);
    let id = match (osm_type.is_empty(), osm_id) {
        (false, Some(oid)) => Some(format!("{osm_type}/{oid}")),
        _ => None,
    };
    Some(ProviderPlace {
        id,
        name,
        subtitle: display_name,
        coord: LatLng::new(lat, lon),
        locality: ss(&address, &["city", "town", "village", "municipality"]),
        region: ss(&address, &["state", "county"]),
        country: ss(&address, &["country"]),
        category: category_of_class(&s(obj, "category")),
        phone: ss(&extratags, &["phone", "contact:phone"]),
        url: ss(&extratags, &["website", "contact:website"]),
    })
}

/// What: Convert one Photon GeoJSON feature into a completion.
///
/// Inputs:
/// - `feature`: Feature object from the completer response.
///
/// Output: `Some(ProviderCompletion)` when a name exists; `None` otherwise.
fn completion_of_feature(feature: &Value) -> Option<ProviderCompletion> {
    let props = feature.get("properties")?;
    let title = s(props, "name");
    if title.is_empty() {
        return None;
    }
    let mut parts: Vec<String> = Vec::new();
    for key in ["city", "state", "country"] {
        let part = s(props, key);
        if !part.is_empty() {
            parts.push(part);
        }
    }
    let coord = feature
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(Value::as_array)
        .and_then(|arr| {
            let lon = arr.first().and_then(Value::as_f64)?;
            let lat = arr.get(1).and_then(Value::as_f64)?;
            Some(LatLng::new(lat, lon))
        });
    Some(ProviderCompletion {
        title,
        subtitle: parts.join(", "),
        coord,
    })
}

/// What: Convert one OSRM route object into a provider route.
///
/// Inputs:
/// - `obj`: Route object from the router response.
///
/// Output: Route summary; the name falls back to `"Route"` without a leg summary.
fn route_of_value(obj: &Value) -> ProviderRoute {
    let name = obj
        .get("legs")
        .and_then(Value::as_array)
        .and_then(|legs| legs.first())
        .map(|leg| s(leg, "summary"))
        .filter(|summary| !summary.is_empty())
        .unwrap_or_else(|| "Route".to_string());
    ProviderRoute {
        name,
        duration_secs: obj.get("duration").and_then(Value::as_f64).unwrap_or(0.0),
        distance_meters: obj.get("distance").and_then(Value::as_f64).unwrap_or(0.0),
        advisories: Vec::new(),
    }
}

#[async_trait]
impl PlaceProvider for OsmProvider {
    async fn search_places(
        &self,
        query: &str,
        near: Option<LatLng>,
        categories: Option<&[&str]>,
    ) -> ProviderResult<Vec<ProviderPlace>> {
        let url = format!("{}/search", self.search_base);
        let mut params: Vec<(&str, String)> = vec![
            ("q", query.to_string()),
            ("format", "jsonv2".to_string()),
            ("limit", "30".to_string()),
            ("addressdetails", "1".to_string()),
            ("extratags", "1".to_string()),
        ];
        if let Some(at) = near {
            // Soft bias: prefer the viewbox around the coordinate without
            // excluding results outside of it.
            params.push((
                "viewbox",
                format!(
                    "{},{},{},{}",
                    at.lon - NEARBY_VIEWBOX_SPAN,
                    at.lat + NEARBY_VIEWBOX_SPAN,
                    at.lon + NEARBY_VIEWBOX_SPAN,
                    at.lat - NEARBY_VIEWBOX_SPAN
                ),
            ));
            params.push(("bounded", "0".to_string()));
        }
        let v = self.get_json(&url, &params).await?;
        let mut arr = v.as_array().cloned().unwrap_or_default();
        if let Some(keys) = categories
            && let Some((class, types)) = keys.split_first()
        {
            arr.retain(|obj| {
                let c = s(obj, "category");
                let t = s(obj, "type");
                c == *class || types.contains(&t.as_str())
            });
        }
        Ok(arr.iter().filter_map(place_of_value).collect())
    }

    async fn complete(
        &self,
        fragment: &str,
        near: Option<LatLng>,
    ) -> ProviderResult<Vec<ProviderCompletion>> {
        let url = format!("{}/api", self.completer_base);
        let mut params: Vec<(&str, String)> = vec![
            ("q", fragment.to_string()),
            ("limit", "8".to_string()),
        ];
        if let Some(at) = near {
            params.push(("lat", at.lat.to_string()));
            params.push(("lon", at.lon.to_string()));
        }
        let v = self.get_json(&url, &params).await?;
        let features = v
            .get("features")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(features.iter().filter_map(completion_of_feature).collect())
    }

    async fn compute_route(
        &self,
        origin: LatLng,
        destination: LatLng,
        mode: TransportMode,
        want_alternatives: bool,
    ) -> ProviderResult<ProviderRoutes> {
        let profile = match mode {
            TransportMode::Driving => "driving",
            TransportMode::Walking => "walking",
            TransportMode::Transit => {
                return Err(ProviderError(
                    "transit routing is not supported by the public OSRM profiles".to_string(),
                ));
            }
        };
        let url = format!(
            "{}/route/v1/{}/{},{};{},{}",
            self.router_base, profile, origin.lon, origin.lat, destination.lon, destination.lat
        );
        let params: Vec<(&str, String)> = vec![
            ("alternatives", want_alternatives.to_string()),
            ("overview", "false".to_string()),
            ("steps", "false".to_string()),
        ];
        let v = self.get_json(&url, &params).await?;
        let code = s(&v, "code");
        if code != "Ok" {
            return Err(ProviderError(format!("router rejected the request: {code}")));
        }
        let routes = v
            .get("routes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut iter = routes.iter();
        let Some(first) = iter.next() else {
            return Err(ProviderError("router returned no routes".to_string()));
        };
        Ok(ProviderRoutes {
            primary: route_of_value(first),
            alternatives: iter.map(route_of_value).collect(),
        })
    }
}
