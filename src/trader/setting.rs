//! Global setting of the chart engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{LazyLock, RwLock};

use super::utility::get_file_path;

/// Setting filename
const SETTING_FILENAME: &str = "chart_setting.json";

/// Decimal places shown for prices unless configured
pub const DEFAULT_PRICE_PRECISION: u32 = 5;

/// Default settings
fn default_settings() -> HashMap<String, SettingValue> {
    let mut settings = HashMap::new();

    // Log settings
    settings.insert("log.active".to_string(), SettingValue::Bool(true));
    settings.insert("log.level".to_string(), SettingValue::Int(20)); // INFO level
    settings.insert("log.console".to_string(), SettingValue::Bool(true));
    settings.insert("log.file".to_string(), SettingValue::Bool(false));

    // Chart settings
    settings.insert("chart.history_count".to_string(), SettingValue::Int(500));
    settings.insert("chart.max_candles".to_string(), SettingValue::Int(500));
    settings.insert("chart.commit_interval_ms".to_string(), SettingValue::Int(1000));
    settings.insert("chart.price_precision".to_string(), SettingValue::Int(DEFAULT_PRICE_PRECISION as i64));

    // Signal settings
    settings.insert("signal.interval_secs".to_string(), SettingValue::Int(5));

    settings
}

/// Setting value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl SettingValue {
    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Global settings container
pub struct Settings {
    settings: RwLock<HashMap<String, SettingValue>>,
}

impl Settings {
    /// Create new Settings with defaults, overridden by the setting file if present
    pub fn new() -> Self {
        let settings = Self::defaults();
        settings.merge_file(&get_file_path(SETTING_FILENAME));
        settings
    }

    /// Settings holding only the built-in defaults
    pub fn defaults() -> Self {
        Self {
            settings: RwLock::new(default_settings()),
        }
    }

    /// Overlay values from a JSON file; unreadable files are ignored.
    pub fn merge_file(&self, path: &Path) {
        let Ok(content) = fs::read_to_string(path) else {
            return;
        };
        match serde_json::from_str::<HashMap<String, SettingValue>>(&content) {
            Ok(file_settings) => self.update(file_settings),
            Err(e) => tracing::warn!(path = %path.display(), "ignoring malformed setting file: {}", e),
        }
    }

    /// Get a setting value
    pub fn get(&self, key: &str) -> Option<SettingValue> {
        self.settings.read().ok()?.get(key).cloned()
    }

    /// Get a string setting
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    /// Get an integer setting
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_int())
    }

    /// Get a float setting
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_float())
    }

    /// Get a bool setting
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Set a setting value
    pub fn set(&self, key: impl Into<String>, value: SettingValue) {
        if let Ok(mut settings) = self.settings.write() {
            settings.insert(key.into(), value);
        }
    }

    /// Update settings from a map
    pub fn update(&self, new_settings: HashMap<String, SettingValue>) {
        if let Ok(mut settings) = self.settings.write() {
            settings.extend(new_settings);
        }
    }

    /// Save settings to `path`
    pub fn save_to(&self, path: &Path) -> crate::ChartResult<()> {
        let json = {
            let settings = self
                .settings
                .read()
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            serde_json::to_string_pretty(&*settings)?
        };
        fs::write(path, json)?;
        Ok(())
    }

    /// Save settings to the default setting file
    pub fn save(&self) -> crate::ChartResult<()> {
        self.save_to(&get_file_path(SETTING_FILENAME))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

/// Global settings instance
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new);

/// Engine tunables resolved from [`Settings`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Candles requested from the history source on load
    pub history_count: usize,
    /// Retention cap of the live series
    pub max_candles: usize,
    /// Minimum spacing of committed in-place candle updates
    pub commit_interval_ms: i64,
    /// Spacing of signal recomputation
    pub signal_interval_secs: i64,
    /// Display precision in decimal places
    pub price_precision: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_count: 500,
            max_candles: 500,
            commit_interval_ms: 1000,
            signal_interval_secs: 5,
            price_precision: DEFAULT_PRICE_PRECISION,
        }
    }
}

impl EngineSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        let positive = |key: &str, fallback: i64| {
            settings.get_int(key).filter(|v| *v > 0).unwrap_or(fallback)
        };
        Self {
            history_count: positive("chart.history_count", defaults.history_count as i64) as usize,
            max_candles: positive("chart.max_candles", defaults.max_candles as i64) as usize,
            commit_interval_ms: positive("chart.commit_interval_ms", defaults.commit_interval_ms),
            signal_interval_secs: positive("signal.interval_secs", defaults.signal_interval_secs),
            price_precision: settings
                .get_int("chart.price_precision")
                .filter(|v| (0..=12).contains(v))
                .map(|v| v as u32)
                .unwrap_or(defaults.price_precision),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_value_types() {
        let s = SettingValue::String("test".to_string());
        assert_eq!(s.as_str(), Some("test"));

        let i = SettingValue::Int(42);
        assert_eq!(i.as_int(), Some(42));
        assert_eq!(i.as_float(), Some(42.0));

        let b = SettingValue::Bool(true);
        assert_eq!(b.as_bool(), Some(true));
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::defaults();
        assert!(settings.get_bool("log.active").unwrap_or(false));
        assert_eq!(settings.get_int("chart.max_candles"), Some(500));
        assert_eq!(EngineSettings::from_settings(&settings), EngineSettings::default());
    }

    #[test]
    fn test_merge_file_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart_setting.json");
        fs::write(&path, r#"{"chart.max_candles": 300, "signal.interval_secs": -1}"#).unwrap();

        let settings = Settings::defaults();
        settings.merge_file(&path);
        let engine = EngineSettings::from_settings(&settings);
        assert_eq!(engine.max_candles, 300);
        // Non-positive values fall back to defaults
        assert_eq!(engine.signal_interval_secs, 5);

        settings.set("chart.price_precision", SettingValue::Int(2));
        settings.save_to(&path).unwrap();
        let reloaded = Settings::defaults();
        reloaded.merge_file(&path);
        assert_eq!(reloaded.get_int("chart.price_precision"), Some(2));
    }
}
