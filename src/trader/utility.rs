//! General utility functions.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Get trader directory
fn get_trader_dir(temp_name: &str) -> (PathBuf, PathBuf) {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let temp_path = cwd.join(temp_name);

    // If the folder exists in current working directory, use it
    if temp_path.exists() {
        return (cwd, temp_path);
    }

    // Otherwise use home path
    let home_path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let temp_path = home_path.join(temp_name);

    if !temp_path.exists() {
        let _ = fs::create_dir_all(&temp_path);
    }

    (home_path, temp_path)
}

/// Temp directory
pub static TEMP_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    let (_, temp_dir) = get_trader_dir(".chartengine");
    temp_dir
});

/// Get path for temp file with filename
pub fn get_file_path(filename: &str) -> PathBuf {
    TEMP_DIR.join(filename)
}

/// Get path for temp folder with folder name
pub fn get_folder_path(folder_name: &str) -> PathBuf {
    let folder_path = TEMP_DIR.join(folder_name);
    if !folder_path.exists() {
        let _ = fs::create_dir_all(&folder_path);
    }
    folder_path
}

/// Load a JSON object from `path`; missing or malformed files give an empty map.
pub fn load_json(path: &std::path::Path) -> HashMap<String, serde_json::Value> {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

/// Save a JSON object into `path`
pub fn save_json(path: &std::path::Path, data: &HashMap<String, serde_json::Value>) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    fs::write(path, json)
}

/// Round price to price tick value
pub fn round_to(value: f64, target: f64) -> f64 {
    let decimal_value = Decimal::from_f64(value).unwrap_or_default();
    let decimal_target = Decimal::from_f64(target).unwrap_or(Decimal::ONE);

    if decimal_target.is_zero() {
        return value;
    }

    let result = (decimal_value / decimal_target).round() * decimal_target;
    result.to_f64().unwrap_or(value)
}

/// Floor to target float number
pub fn floor_to(value: f64, target: f64) -> f64 {
    let decimal_value = Decimal::from_f64(value).unwrap_or_default();
    let decimal_target = Decimal::from_f64(target).unwrap_or(Decimal::ONE);

    if decimal_target.is_zero() {
        return value;
    }

    let result = (decimal_value / decimal_target).floor() * decimal_target;
    result.to_f64().unwrap_or(value)
}

/// Ceil to target float number
pub fn ceil_to(value: f64, target: f64) -> f64 {
    let decimal_value = Decimal::from_f64(value).unwrap_or_default();
    let decimal_target = Decimal::from_f64(target).unwrap_or(Decimal::ONE);

    if decimal_target.is_zero() {
        return value;
    }

    let result = (decimal_value / decimal_target).ceil() * decimal_target;
    result.to_f64().unwrap_or(value)
}

/// Smallest price step shown for `precision` decimal places.
///
/// `None` when `precision` exceeds what a decimal can represent.
pub fn precision_step(precision: u32) -> Option<f64> {
    Decimal::try_new(1, precision).ok()?.to_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 0.001), 1.235);
        assert_eq!(round_to(1.10004, 0.0001), 1.1);
        assert_eq!(round_to(5.0, 0.0), 5.0);
    }

    #[test]
    fn test_floor_ceil_to() {
        assert_eq!(floor_to(1.2399, 0.01), 1.23);
        assert_eq!(ceil_to(1.2301, 0.01), 1.24);
    }

    #[test]
    fn test_precision_step() {
        assert_eq!(precision_step(5), Some(0.00001));
        assert_eq!(precision_step(0), Some(1.0));
        assert!(precision_step(28).is_some());
        assert_eq!(precision_step(30), None);
    }

    #[test]
    fn test_json_roundtrip_in_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        assert!(load_json(&path).is_empty());

        let mut data = HashMap::new();
        data.insert("chart.max_candles".to_string(), serde_json::json!(300));
        save_json(&path, &data).unwrap();
        assert_eq!(load_json(&path).get("chart.max_candles"), Some(&serde_json::json!(300)));
    }
}
