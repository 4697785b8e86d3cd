pub mod check;
pub mod completions;
pub mod drivers;
pub mod man_pages;
pub mod resolve;
pub mod run;

use plumb_driver::{builtin_registry, DriverRegistry};
use plumb_schema::{parse_config_file, HarnessConfig};
use std::path::Path;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_DRIVER_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn load_config(path: &Path) -> Result<HarnessConfig, String> {
    parse_config_file(path).map_err(|e| format!("config error: {}: {e}", path.display()))
}

pub fn registry() -> Result<DriverRegistry, String> {
    builtin_registry().map_err(|e| format!("driver error: {e}"))
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "succeeded" | "passed" => Style::new().green().apply_to(status).to_string(),
        "failed" | "error" => Style::new().red().bold().apply_to(status).to_string(),
        "timed out" => Style::new().yellow().apply_to(status).to_string(),
        "cancelled" => Style::new().dim().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_array() {
        let val = vec!["pxd", "pso"];
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"pxd\""));
    }

    #[test]
    fn colorize_status_keeps_text() {
        for status in ["succeeded", "failed", "timed out", "cancelled"] {
            assert!(colorize_status(status).contains(status));
        }
        assert_eq!(colorize_status("unknown"), "unknown");
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_CONFIG_ERROR);
        assert_ne!(EXIT_CONFIG_ERROR, EXIT_DRIVER_ERROR);
    }

    #[test]
    fn missing_config_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.starts_with("config error:"));
    }

    #[test]
    fn builtin_registry_loads() {
        assert_eq!(registry().unwrap().len(), 4);
    }
}
