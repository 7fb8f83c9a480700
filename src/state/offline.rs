//! Offline map region model: bounding regions, download state machine, and
//! derived suggestions.

use crate::state::types::LatLng;

/// Decimal places used when hashing a region's center and span.
///
/// A tunable constant, not a semantic guarantee; nearby regions collapse to
/// the same hash at this precision and are treated as duplicates.
pub const REGION_HASH_PRECISION: usize = 3;

/// Rough estimate of map data volume per square degree, used for suggestion
/// size hints. Deliberately coarse.
pub const ESTIMATED_BYTES_PER_SQUARE_DEGREE: f64 = 1_000_000_000.0;

/// A rectangular geographic region described by center and span.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingRegion {
    /// Center coordinate.
    pub center: LatLng,
    /// North-south extent in degrees.
    pub span_lat: f64,
    /// East-west extent in degrees.
    pub span_lon: f64,
}

impl BoundingRegion {
    /// What: Build a square region centered on a coordinate.
    ///
    /// Inputs:
    /// - `center`: Center coordinate.
    /// - `span`: Extent in degrees applied to both axes.
    ///
    /// Output: Region of `span × span` degrees around `center`.
    #[must_use]
    pub const fn around(center: LatLng, span: f64) -> Self {
        Self {
            center,
            span_lat: span,
            span_lon: span,
        }
    }

    /// What: Build a padded region enclosing two coordinates.
    ///
    /// Inputs:
    /// - `a`, `b`: Coordinates to enclose.
    /// - `padding_factor`: Multiplier applied to the raw span (e.g. 1.3).
    /// - `min_span`: Lower bound enforced on each axis, in degrees.
    ///
    /// Output: Region centered between `a` and `b` covering both with padding.
    #[must_use]
    pub fn enclosing(a: LatLng, b: LatLng, padding_factor: f64, min_span: f64) -> Self {
        let center = LatLng::new((a.lat + b.lat) / 2.0, (a.lon + b.lon) / 2.0);
        let span_lat = ((a.lat - b.lat).abs() * padding_factor).max(min_span);
        let span_lon = ((a.lon - b.lon).abs() * padding_factor).max(min_span);
        Self {
            center,
            span_lat,
            span_lon,
        }
    }

    /// What: Reduce the region to its fixed-precision duplicate-detection hash.
    ///
    /// Inputs: none
    ///
    /// Output: String of rounded center + span at [`REGION_HASH_PRECISION`] places.
    #[must_use]
    pub fn region_hash(&self) -> String {
        format!(
            "{:.prec$},{:.prec$}x{:.prec$},{:.prec$}",
            self.center.lat,
            self.center.lon,
            self.span_lat,
            self.span_lon,
            prec = REGION_HASH_PRECISION
        )
    }

    /// What: Estimate the downloaded size of this region.
    ///
    /// Inputs: none
    ///
    /// Output: Approximate byte count derived from the covered area.
    #[must_use]
    pub fn estimated_bytes(&self) -> u64 {
        let area = (self.span_lat * self.span_lon).abs();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bytes = (area * ESTIMATED_BYTES_PER_SQUARE_DEGREE) as u64;
        bytes
    }
}

/// Lifecycle status of an offline map region.
///
/// `Available` and `NeedsUpdate` are terminal success states that re-enter
/// `Downloading` via an explicit update request.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RegionStatus {
    /// No local copy exists.
    NotDownloaded,
    /// Download accepted by the provider but not yet transferring.
    Queued,
    /// Transfer in progress with a completion fraction in `0..=1`.
    Downloading(f64),
    /// Fully downloaded and current.
    Available {
        /// When the local copy was last written, seconds since the Unix epoch.
        updated_at: i64,
    },
    /// Downloaded but the provider has fresher data.
    NeedsUpdate {
        /// When the local copy was last written, seconds since the Unix epoch.
        updated_at: i64,
    },
    /// Download ended with an error.
    Failed(String),
    /// Download was cancelled before completion.
    Cancelled,
}

/// A downloadable (or downloaded) map region as shown to the user.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OfflineRegion {
    /// Provider-assigned map identifier.
    pub id: String,
    /// Human-readable region name.
    pub name: String,
    /// Descriptive line (size, freshness), recomputed on refresh.
    pub subtitle: String,
    /// Geographic bounds of the region.
    pub region: BoundingRegion,
    /// Size on disk, unknown until reported by the provider.
    pub size_bytes: Option<u64>,
    /// Last update time, seconds since the Unix epoch.
    pub updated_at: Option<i64>,
    /// Current lifecycle status.
    pub status: RegionStatus,
}

/// Where a download suggestion came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuggestionSource {
    /// The place currently focused in the planner.
    SelectedDestination,
    /// A plain saved place.
    SavedPlace,
    /// A bookmarked saved place.
    BookmarkedPlace,
    /// The corridor of a saved route.
    SavedRoute,
}

impl SuggestionSource {
    /// What: Human label shown as the suggestion detail prefix.
    ///
    /// Inputs: none
    ///
    /// Output: Static label string.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SelectedDestination => "Selected destination",
            Self::SavedPlace => "Saved place",
            Self::BookmarkedPlace => "Bookmarked place",
            Self::SavedRoute => "Saved route",
        }
    }
}

/// A derived (never persisted) candidate for offline download.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionSuggestion {
    /// Suggested region name.
    pub name: String,
    /// Detail line describing why the region was suggested.
    pub detail: String,
    /// Geographic bounds to download.
    pub region: BoundingRegion,
    /// Approximate download size, when estimable.
    pub estimated_bytes: Option<u64>,
    /// Source of the suggestion.
    pub source: SuggestionSource,
}

impl RegionSuggestion {
    /// What: The duplicate-detection hash of the suggested region.
    ///
    /// Inputs: none
    ///
    /// Output: See [`BoundingRegion::region_hash`].
    #[must_use]
    pub fn region_hash(&self) -> String {
        self.region.region_hash()
    }
}

/// An in-flight download tracked by the offline region manager.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveDownload {
    /// Engine-assigned synthetic download identifier.
    pub id: String,
    /// Identifier used with the provider for cancellation.
    pub provider_id: String,
    /// Name of the region being downloaded.
    pub region_name: String,
    /// Duplicate-detection hash of the region being downloaded.
    pub region_hash: String,
    /// Current lifecycle status.
    pub status: RegionStatus,
    /// Completion fraction in `0..=1`.
    pub progress: f64,
    /// Human-readable status line updated at every transition.
    pub message: String,
}

/// Aggregate storage usage reported by the offline provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StorageUsage {
    /// Bytes consumed by downloaded maps.
    pub used_bytes: u64,
    /// Bytes still available on the device.
    pub available_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Region hashes collapse sub-precision differences
    ///
    /// - Input: Two regions differing below the third decimal, one differing above
    /// - Output: First pair share a hash, third differs
    fn offline_region_hash_precision() {
        let a = BoundingRegion::around(LatLng::new(50.1109, 8.6821), 0.25);
        let b = BoundingRegion::around(LatLng::new(50.11092, 8.68207), 0.2501);
        let c = BoundingRegion::around(LatLng::new(50.12, 8.6821), 0.25);
        assert_eq!(a.region_hash(), b.region_hash());
        assert_ne!(a.region_hash(), c.region_hash());
    }

    #[test]
    /// What: Enclosing regions are padded and never collapse below the minimum span
    ///
    /// - Input: Two nearby coordinates and two distant ones
    /// - Output: Minimum span enforced for the near pair; padded spans for the far pair
    fn offline_enclosing_padding_and_min_span() {
        let near = BoundingRegion::enclosing(
            LatLng::new(50.0, 8.0),
            LatLng::new(50.001, 8.001),
            1.3,
            0.05,
        );
        assert!((near.span_lat - 0.05).abs() < f64::EPSILON);
        assert!((near.span_lon - 0.05).abs() < f64::EPSILON);

        let far = BoundingRegion::enclosing(
            LatLng::new(50.0, 8.0),
            LatLng::new(51.0, 9.0),
            1.3,
            0.05,
        );
        assert!((far.span_lat - 1.3).abs() < 1e-9);
        assert!((far.span_lon - 1.3).abs() < 1e-9);
        assert!((far.center.lat - 50.5).abs() < f64::EPSILON);
    }

    #[test]
    /// What: Size estimates scale with area and stay nullable-friendly
    ///
    /// - Input: A quarter-degree square region
    /// - Output: Non-zero estimate proportional to the covered area
    fn offline_estimated_bytes_scales_with_area() {
        let region = BoundingRegion::around(LatLng::new(48.8566, 2.3522), 0.25);
        let expected = (0.25_f64 * 0.25 * ESTIMATED_BYTES_PER_SQUARE_DEGREE) as u64;
        assert_eq!(region.estimated_bytes(), expected);
    }
}
