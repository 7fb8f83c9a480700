//! Small utility helpers for JSON extraction and display formatting.
//!
//! The functions in this module are intentionally lightweight and
//! dependency-free to keep hot paths fast and reduce compile times. They are
//! used by the provider, offline, and persistence layers.

use serde_json::Value;

/// What: Extract a string value from a JSON object by key, defaulting to empty string.
///
/// Inputs:
/// - `v`: JSON value to extract from.
/// - `key`: Key to look up in the JSON object.
///
/// Output:
/// - Returns the string value if found, or an empty string if the key is missing or not a string.
///
/// Details:
/// - Returns `""` if the key is missing or the value is not a string type.
#[must_use]
pub fn s(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// What: Extract the first available string from a list of candidate keys.
///
/// Inputs:
/// - `v`: JSON value to extract from.
/// - `keys`: Array of candidate keys to try in order.
///
/// Output:
/// - Returns `Some(String)` for the first key that maps to a JSON string, or `None` if none match.
///
/// Details:
/// - Tries keys in the order provided and returns the first match.
#[must_use]
pub fn ss(v: &Value, keys: &[&str]) -> Option<String> {
    for k in keys {
        if let Some(s) = v.get(*k).and_then(|x| x.as_str()) {
            return Some(s.to_owned());
        }
    }
    None
}

/// What: Extract a float from a JSON object, accepting numeric and stringified values.
///
/// Inputs:
/// - `v`: JSON value to extract from.
/// - `key`: Key to look up in the JSON object.
///
/// Output:
/// - Returns `Some(f64)` when the key holds a number or a parseable numeric string.
///
/// Details:
/// - Geocoding APIs frequently return coordinates as strings; both encodings are accepted.
#[must_use]
pub fn f64_of(v: &Value, key: &str) -> Option<f64> {
    let field = v.get(key)?;
    if let Some(n) = field.as_f64() {
        return Some(n);
    }
    field.as_str().and_then(|raw| raw.trim().parse::<f64>().ok())
}

/// What: Format a Unix timestamp as a UTC `YYYY-MM-DD HH:MM:SS` string.
///
/// Inputs:
/// - `ts`: Optional seconds since the Unix epoch.
///
/// Output:
/// - Returns the formatted date, or an empty string when `ts` is `None` or out of range.
#[must_use]
pub fn ts_to_date(ts: Option<i64>) -> String {
    let Some(t) = ts else {
        return String::new();
    };
    chrono::DateTime::from_timestamp(t, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// What: Format bytes into human-readable string with appropriate unit.
///
/// Inputs:
/// - `value`: Number of bytes to format.
///
/// Output:
/// - Returns a formatted string like "1.5 MiB" or "1024 B".
///
/// Details:
/// - Uses binary units (KiB, MiB, GiB, etc.) and shows integer for bytes < 1024, otherwise 1 decimal place.
#[must_use]
pub fn format_bytes(value: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    #[allow(clippy::cast_precision_loss)]
    let mut size = value as f64;
    let mut unit_index = 0usize;
    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }
    if unit_index == 0 {
        format!("{value} {}", UNITS[unit_index])
    } else {
        format!("{size:.1} {}", UNITS[unit_index])
    }
}
