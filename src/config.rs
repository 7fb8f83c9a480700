//! Engine configuration and data-directory resolution.
//!
//! All timing and geometry tunables used across the engine live here so that
//! embedders (and tests) can adjust them in one place. Paths follow the XDG
//! convention with a `$HOME` fallback.

use std::env;
use std::path::PathBuf;

/// Tunable configuration for a [`crate::engine::MapEngine`] instance.
///
/// `Default` produces the production values; tests typically shrink
/// `suggest_debounce_ms` and point `data_dir` at a temporary directory.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Directory holding the persisted saved-places and saved-routes documents.
    pub data_dir: PathBuf,
    /// Debounce window applied to suggestion input before the completer is called.
    pub suggest_debounce_ms: u64,
    /// Capacity of the in-memory search result cache.
    pub search_cache_capacity: usize,
    /// Timeout applied to provider HTTP calls, in seconds.
    pub provider_timeout_secs: u64,
    /// Expansion factor applied to the box around a saved route's endpoints.
    pub route_padding_factor: f64,
    /// Minimum span (degrees) enforced on derived offline regions.
    pub min_region_span_deg: f64,
    /// Span (degrees) of the square region suggested around a single place.
    pub place_region_span_deg: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            suggest_debounce_ms: 250,
            search_cache_capacity: 64,
            provider_timeout_secs: 10,
            route_padding_factor: 1.3,
            min_region_span_deg: 0.05,
            place_region_span_deg: 0.25,
        }
    }
}

impl EngineConfig {
    /// What: Path of the saved-places JSON document.
    ///
    /// Inputs: none
    ///
    /// Output: `data_dir/places.json`
    #[must_use]
    pub fn places_path(&self) -> PathBuf {
        self.data_dir.join("places.json")
    }

    /// What: Path of the saved-routes JSON document.
    ///
    /// Inputs: none
    ///
    /// Output: `data_dir/routes.json`
    #[must_use]
    pub fn routes_path(&self) -> PathBuf {
        self.data_dir.join("routes.json")
    }

    /// What: Directory for engine log files.
    ///
    /// Inputs: none
    ///
    /// Output: `data_dir/logs`, created if missing.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        let dir = self.data_dir.join("logs");
        let _ = std::fs::create_dir_all(&dir);
        dir
    }
}

/// What: Resolve an XDG base directory from environment or default to `$HOME` + segments.
///
/// Inputs:
/// - `var`: Environment variable to check (e.g., `XDG_DATA_HOME`).
/// - `home_default`: Fallback path segments relative to `$HOME` if `var` is unset/empty.
///
/// Output: Resolved base directory path.
fn xdg_base_dir(var: &str, home_default: &[&str]) -> PathBuf {
    if let Ok(p) = env::var(var)
        && !p.trim().is_empty()
    {
        return PathBuf::from(p);
    }
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let mut base = PathBuf::from(home);
    for seg in home_default {
        base = base.join(seg);
    }
    base
}

/// What: Default data directory for persisted documents.
///
/// Inputs: none
///
/// Output: `$XDG_DATA_HOME/waymark` (or `$HOME/.local/share/waymark`), ensured to exist.
fn default_data_dir() -> PathBuf {
    let dir = xdg_base_dir("XDG_DATA_HOME", &[".local", "share"]).join("waymark");
    let _ = std::fs::create_dir_all(&dir);
    dir
}
