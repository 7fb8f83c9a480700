//! Core value types used by the engine state.

/// Decimal places used when reducing a coordinate to its de-duplication key.
///
/// Roughly 11 m of latitude. A tunable constant, not a semantic guarantee.
pub const COORD_KEY_PRECISION: usize = 4;

/// A WGS84 coordinate pair.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LatLng {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

impl LatLng {
    /// What: Construct a coordinate from decimal degrees.
    ///
    /// Inputs: `lat`, `lon` in decimal degrees.
    ///
    /// Output: New coordinate value.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// What: Reduce the coordinate to its fixed-precision identity key.
    ///
    /// Inputs: none
    ///
    /// Output: String like `"50.1109,8.6821"`, rounded to [`COORD_KEY_PRECISION`] places.
    ///
    /// Details:
    /// - Used for proximity-based identity matching when no stable id matches.
    #[must_use]
    pub fn coordinate_key(&self) -> String {
        format!(
            "{:.prec$},{:.prec$}",
            self.lat,
            self.lon,
            prec = COORD_KEY_PRECISION
        )
    }
}

/// Free-form link between a saved place and trip-planning context.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlaceAssociation {
    /// Identifier of the trip the place belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip: Option<String>,
    /// Planned day within the trip, if any (opaque to the engine).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
}

/// Category tag attached to a place, also usable as a search filter.
///
/// `All` is a sentinel that collapses to "no filter" when searching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PlaceCategory {
    /// No filtering; matches every category.
    All,
    /// Restaurants, cafes, bars.
    Food,
    /// Hotels, hostels, camp sites.
    Lodging,
    /// Museums, sights, viewpoints.
    Attraction,
    /// Stations, airports, ferry terminals.
    Transport,
    /// Shops and markets.
    Shopping,
    /// Parks, trails, beaches.
    Outdoor,
}

impl PlaceCategory {
    /// What: Map the filter to the provider-side category key set.
    ///
    /// Inputs: none
    ///
    /// Output: `None` for the `All` sentinel, otherwise the provider class names.
    #[must_use]
    pub const fn provider_keys(self) -> Option<&'static [&'static str]> {
        match self {
            Self::All => None,
            Self::Food => Some(&["amenity", "restaurant", "cafe", "bar", "fast_food"]),
            Self::Lodging => Some(&["tourism", "hotel", "hostel", "guest_house", "camp_site"]),
            Self::Attraction => Some(&["tourism", "attraction", "museum", "viewpoint", "artwork"]),
            Self::Transport => Some(&["railway", "aeroway", "station", "halt", "ferry_terminal"]),
            Self::Shopping => Some(&["shop", "mall", "supermarket", "marketplace"]),
            Self::Outdoor => Some(&["leisure", "park", "nature_reserve", "beach_resort"]),
        }
    }

    /// What: Return the string key used in persisted documents and analytics.
    ///
    /// Inputs: none
    ///
    /// Output: Static key string.
    #[must_use]
    pub const fn as_config_key(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Food => "food",
            Self::Lodging => "lodging",
            Self::Attraction => "attraction",
            Self::Transport => "transport",
            Self::Shopping => "shopping",
            Self::Outdoor => "outdoor",
        }
    }

    /// What: Parse a category from its key, case-insensitively.
    ///
    /// Inputs: `s` config string.
    ///
    /// Output: `Some(PlaceCategory)` on recognized value; `None` otherwise.
    #[must_use]
    pub fn from_config_key(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Some(Self::All),
            "food" | "restaurant" => Some(Self::Food),
            "lodging" | "hotel" => Some(Self::Lodging),
            "attraction" | "sight" => Some(Self::Attraction),
            "transport" | "transit_stop" => Some(Self::Transport),
            "shopping" | "shop" => Some(Self::Shopping),
            "outdoor" | "park" => Some(Self::Outdoor),
            _ => None,
        }
    }
}

/// Mode of travel for a route request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TransportMode {
    /// Car routing.
    Driving,
    /// Pedestrian routing.
    Walking,
    /// Public transit routing.
    Transit,
}

impl TransportMode {
    /// What: Return the string key used in persisted documents and analytics.
    ///
    /// Inputs: none
    ///
    /// Output: Static key string.
    #[must_use]
    pub const fn as_config_key(self) -> &'static str {
        match self {
            Self::Driving => "driving",
            Self::Walking => "walking",
            Self::Transit => "transit",
        }
    }

    /// What: Parse a transport mode from its key or common aliases.
    ///
    /// Inputs: `s` config string (case-insensitive).
    ///
    /// Output: `Some(TransportMode)` on recognized value; `None` otherwise.
    #[must_use]
    pub fn from_config_key(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "driving" | "car" => Some(Self::Driving),
            "walking" | "foot" => Some(Self::Walking),
            "transit" | "public_transport" => Some(Self::Transit),
            _ => None,
        }
    }
}

/// A named point of interest with a coordinate and optional metadata.
///
/// Created from a provider search result or manually; mutated in place when
/// bookmarked or re-saved with updated fields.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Place {
    /// Stable unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Address fragment or secondary line shown beneath the name.
    pub subtitle: String,
    /// Coordinate; always present.
    pub coord: LatLng,
    /// City or town, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    /// Administrative region, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Country, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Category tag, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<PlaceCategory>,
    /// Phone number, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Website, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Whether the user bookmarked this place.
    #[serde(default)]
    pub bookmarked: bool,
    /// Optional link to a trip and/or planned day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<PlaceAssociation>,
    /// Creation time, seconds since the Unix epoch.
    pub created_at: i64,
}

impl Place {
    /// What: The fixed-precision coordinate identity key for this place.
    ///
    /// Inputs: none
    ///
    /// Output: See [`LatLng::coordinate_key`].
    #[must_use]
    pub fn coordinate_key(&self) -> String {
        self.coord.coordinate_key()
    }
}

/// Serializable summary of a computed route; immutable once created.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RouteSnapshot {
    /// Short route name or description (e.g. the main road used).
    pub name: String,
    /// Expected travel time in seconds.
    pub duration_secs: f64,
    /// Route length in meters.
    pub distance_meters: f64,
    /// Advisory notices attached by the provider.
    #[serde(default)]
    pub advisories: Vec<String>,
}

/// A persisted route between two places for a specific transport mode.
///
/// At most one `SavedRoute` exists per (origin coordinate key, destination
/// coordinate key, mode) triple; re-saving the triple replaces the entry.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SavedRoute {
    /// Unique identifier.
    pub id: String,
    /// Starting place.
    pub origin: Place,
    /// Ending place.
    pub destination: Place,
    /// Transport mode the route was computed for.
    pub mode: TransportMode,
    /// Primary route summary.
    pub primary: RouteSnapshot,
    /// Alternative route summaries, when requested.
    #[serde(default)]
    pub alternatives: Vec<RouteSnapshot>,
    /// Creation time, seconds since the Unix epoch.
    pub created_at: i64,
}

impl SavedRoute {
    /// What: Test whether this entry matches a lookup triple.
    ///
    /// Inputs:
    /// - `origin_key`: Coordinate key of the requested origin.
    /// - `destination_key`: Coordinate key of the requested destination.
    /// - `mode`: Requested transport mode.
    ///
    /// Output: `true` when all three components match.
    #[must_use]
    pub fn matches(&self, origin_key: &str, destination_key: &str, mode: TransportMode) -> bool {
        self.mode == mode
            && self.origin.coordinate_key() == origin_key
            && self.destination.coordinate_key() == destination_key
    }
}

/// An autocomplete suggestion mapped 1:1 from a completer result.
#[derive(Clone, Debug, PartialEq)]
pub struct Suggestion {
    /// Primary suggestion text.
    pub title: String,
    /// Secondary line (locality, country).
    pub subtitle: String,
    /// Coordinate of the suggested place, when the completer provides one.
    pub coord: Option<LatLng>,
}

impl Suggestion {
    /// What: The text used when the suggestion is turned back into a search.
    ///
    /// Inputs: none
    ///
    /// Output: `"title, subtitle"`, or just the title when no subtitle exists.
    #[must_use]
    pub fn formatted_text(&self) -> String {
        if self.subtitle.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{}, {}", self.title, self.subtitle)
        }
    }
}

/// The replayable parameters of the most recent search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchRequest {
    /// Trimmed query text.
    pub query: String,
    /// Category filter applied.
    pub filter: PlaceCategory,
    /// Optional coordinate the search was biased toward.
    pub near: Option<LatLng>,
}

/// The replayable parameters of the most recent route request.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteRequest {
    /// Starting place.
    pub from: Place,
    /// Ending place.
    pub to: Place,
    /// Transport mode.
    pub mode: TransportMode,
    /// Whether alternate routes were requested.
    pub include_alternatives: bool,
}
