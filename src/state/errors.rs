//! User-describable error taxonomy for the engine.
//!
//! Every provider or I/O failure is converted into one of these kinds at the
//! engine boundary; no raw provider error reaches the caller. Each kind
//! carries a recovery hint the UI can render next to the error.

/// Typed engine error surfaced through the `last_*_error` observables.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// No network; routing was skipped in favor of a fallback lookup.
    #[error("you appear to be offline")]
    Offline,
    /// The search provider call failed; prior results are retained.
    #[error("search failed: {message}")]
    SearchFailed {
        /// Provider failure description.
        message: String,
    },
    /// The routing provider call failed.
    #[error("could not calculate a route: {message}")]
    RoutingFailed {
        /// Provider failure description.
        message: String,
        /// Whether a saved route for the same triple was found as a fallback.
        fallback_available: bool,
    },
    /// Location permission transitioned to denied.
    #[error("location permission denied")]
    LocationPermissionDenied,
    /// The provider's status stream reported an error for a specific download.
    #[error("download of {region} failed: {message}")]
    DownloadFailed {
        /// Name of the affected region.
        region: String,
        /// Provider failure description.
        message: String,
    },
}

impl MapError {
    /// What: Suggest a recovery action the UI can show with the error.
    ///
    /// Inputs: none
    ///
    /// Output: Short, user-facing recovery hint.
    #[must_use]
    pub const fn recovery_hint(&self) -> &'static str {
        match self {
            Self::Offline => "Reconnect to the internet, or use a saved route.",
            Self::SearchFailed { .. } => "Check your connection and try the search again.",
            Self::RoutingFailed {
                fallback_available: true,
                ..
            } => "A previously saved route is shown instead; retry when back online.",
            Self::RoutingFailed {
                fallback_available: false,
                ..
            } => "Check your connection and retry the route request.",
            Self::LocationPermissionDenied => {
                "Enable location access in system settings to search nearby."
            }
            Self::DownloadFailed { .. } => "Free up space or retry the download on Wi-Fi.",
        }
    }
}

/// Location permission as last reported by the host application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PermissionStatus {
    /// The user has not been asked yet.
    #[default]
    NotDetermined,
    /// Location access granted.
    Granted,
    /// Location access denied.
    Denied,
}
