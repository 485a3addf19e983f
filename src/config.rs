//! Runtime configuration
//!
//! The library can be configured at runtime using environment variables or
//! by using functions in this module. Options set by calling functions in this
//! module override options set in environment variables, and thread-local
//! options override process-wide ones.
//!
//! ```
//! use geoconvert::config::*;
//!
//! // Use bounding-box intersection for spatial filters
//! set_config_option("OGR_EXACT_SPATIAL_FILTER", "NO");
//!
//! assert_eq!(get_config_option("OGR_EXACT_SPATIAL_FILTER", ""), "NO");
//! assert!(!get_config_bool("OGR_EXACT_SPATIAL_FILTER", true));
//!
//! // Back to the default
//! clear_config_option("OGR_EXACT_SPATIAL_FILTER");
//!
//! assert_eq!(get_config_option("OGR_EXACT_SPATIAL_FILTER", "XXX"), "XXX");
//! ```
//!
//! Options read by the library:
//!
//! * `OGR_EXACT_SPATIAL_FILTER` (default `YES`): whether vector spatial filters
//!   test exact geometry intersection or only bounding boxes.
//! * `GTIFF_WRITE_GDAL_METADATA` (default `YES`): whether the GeoTIFF driver
//!   persists metadata domains in the GDAL metadata tag.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

static CONFIG_OPTIONS: LazyLock<Mutex<HashMap<String, String>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

thread_local! {
    static THREAD_LOCAL_OPTIONS: RefCell<HashMap<String, String>> = RefCell::new(HashMap::new());
}

fn normalize(key: &str) -> String {
    key.to_ascii_uppercase()
}

/// Set a process-wide configuration option.
pub fn set_config_option(key: &str, value: &str) {
    let mut options = CONFIG_OPTIONS.lock().unwrap_or_else(|e| e.into_inner());
    options.insert(normalize(key), value.to_string());
}

/// Get the value of a configuration option.
///
/// Lookup order is thread-local options, process-wide options, then the
/// environment. If the option is not found, `default` is returned.
pub fn get_config_option(key: &str, default: &str) -> String {
    let key = normalize(key);
    if let Some(value) = THREAD_LOCAL_OPTIONS.with(|o| o.borrow().get(&key).cloned()) {
        return value;
    }
    let global = CONFIG_OPTIONS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(&key)
        .cloned();
    global
        .or_else(|| std::env::var(&key).ok())
        .unwrap_or_else(|| default.to_string())
}

/// Clear a process-wide configuration option.
pub fn clear_config_option(key: &str) {
    let mut options = CONFIG_OPTIONS.lock().unwrap_or_else(|e| e.into_inner());
    options.remove(&normalize(key));
}

/// Set a configuration option with **thread local** scope.
pub fn set_thread_local_config_option(key: &str, value: &str) {
    THREAD_LOCAL_OPTIONS.with(|o| {
        o.borrow_mut().insert(normalize(key), value.to_string());
    });
}

/// Get the value of a configuration option with **thread local** scope only.
pub fn get_thread_local_config_option(key: &str, default: &str) -> String {
    THREAD_LOCAL_OPTIONS
        .with(|o| o.borrow().get(&normalize(key)).cloned())
        .unwrap_or_else(|| default.to_string())
}

/// Clear a configuration option with **thread local** scope.
pub fn clear_thread_local_config_option(key: &str) {
    THREAD_LOCAL_OPTIONS.with(|o| {
        o.borrow_mut().remove(&normalize(key));
    });
}

/// Interpret a configuration option as a boolean.
///
/// `YES`, `ON`, `TRUE` and `1` are true, `NO`, `OFF`, `FALSE` and `0` are false
/// (case-insensitive); anything else, or an unset option, yields `default`.
pub fn get_config_bool(key: &str, default: bool) -> bool {
    parse_bool(&get_config_option(key, "")).unwrap_or(default)
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_uppercase().as_str() {
        "YES" | "ON" | "TRUE" | "1" => Some(true),
        "NO" | "OFF" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_option() {
        set_config_option("GEOCONVERT_TEST_OPTION_A", "ON");
        assert_eq!(get_config_option("geoconvert_test_option_a", ""), "ON");
        assert!(get_config_bool("GEOCONVERT_TEST_OPTION_A", false));
        clear_config_option("GEOCONVERT_TEST_OPTION_A");
        assert_eq!(get_config_option("GEOCONVERT_TEST_OPTION_A", "DEFAULT"), "DEFAULT");
    }

    #[test]
    fn test_thread_local_overrides_global() {
        set_config_option("GEOCONVERT_TEST_OPTION_B", "global");
        set_thread_local_config_option("GEOCONVERT_TEST_OPTION_B", "local");
        assert_eq!(get_config_option("GEOCONVERT_TEST_OPTION_B", ""), "local");
        assert_eq!(
            get_thread_local_config_option("GEOCONVERT_TEST_OPTION_B", ""),
            "local"
        );
        clear_thread_local_config_option("GEOCONVERT_TEST_OPTION_B");
        assert_eq!(get_config_option("GEOCONVERT_TEST_OPTION_B", ""), "global");
        clear_config_option("GEOCONVERT_TEST_OPTION_B");
    }

    #[test]
    fn test_bool_parsing_falls_back_to_default() {
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("Off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert!(get_config_bool("GEOCONVERT_TEST_UNSET_OPTION", true));
    }
}
