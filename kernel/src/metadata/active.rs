// Active Override
//
// Reads the embedded JSON configuration of a metadata row.
// Lookups never fail: a malformed blob behaves like a missing key.

use serde_json::Value;

/// Whether a row is currently enabled.
///
/// Empty configuration is active. Otherwise the whole blob is
/// upper-cased and parsed, and only an `ACTIVE` value of exactly
/// `"N"` disables the row.
pub fn is_active(configuration: &str) -> bool {
    if configuration.is_empty() {
        return true;
    }

    !matches!(
        json_item(&configuration.to_uppercase(), "ACTIVE"),
        Some(Value::String(value)) if value == "N"
    )
}

/// Fetch a top-level key from a JSON configuration string.
pub fn json_item(configuration: &str, key: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(configuration) {
        Ok(Value::Object(mut map)) => map.remove(key),
        _ => None,
    }
}

/// Fetch a top-level string value, treating anything else as absent.
pub fn json_str(configuration: &str, key: &str) -> Option<String> {
    match json_item(configuration, key) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}
