use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "pulse_osc".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Where forwarded measurements go. The destination is fixed for the whole
/// run; there is no per-message routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OscSettings {
    #[serde(default = "default_osc_host")]
    pub host: String,
    #[serde(default = "default_osc_port")]
    pub port: u16,
    #[serde(default = "default_osc_path")]
    pub path: String,
}

impl OscSettings {
    pub fn destination(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for OscSettings {
    fn default() -> Self {
        Self {
            host: default_osc_host(),
            port: default_osc_port(),
            path: default_osc_path(),
        }
    }
}

fn default_osc_host() -> String {
    "127.0.0.1".to_string()
}
fn default_osc_port() -> u16 {
    9000
}
fn default_osc_path() -> String {
    "/chatbox/input".to_string()
}

/// Timing knobs for the discovery/subscription flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// How long the scan keeps running after the stop prompt, unless the
    /// operator cuts it short with a keypress.
    #[serde(default = "default_scan_grace_ms")]
    pub scan_grace_ms: u64,
    /// Granularity of the stop-flag check in the subscription loop.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl SessionSettings {
    pub fn scan_grace(&self) -> Duration {
        Duration::from_millis(self.scan_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            scan_grace_ms: default_scan_grace_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_scan_grace_ms() -> u64 {
    1000
}
fn default_poll_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub osc: OscSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub log_settings: LogSettings,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let service = Self {
            settings: Self::load_from_file(&settings_path).unwrap_or_default(),
            settings_path,
        };

        // Seed a settings file on first run so the defaults are editable.
        if !service.settings_path.exists() {
            if let Err(err) = service.save() {
                tracing::warn!("Could not write default settings file: {err}");
            }
        }

        Ok(service)
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("pulse-osc");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_configuration() {
        let settings = Settings::default();
        assert_eq!(settings.osc.destination(), "127.0.0.1:9000");
        assert_eq!(settings.osc.path, "/chatbox/input");
        assert_eq!(settings.session.scan_grace(), Duration::from_secs(1));
        assert_eq!(settings.session.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn partial_settings_file_fills_in_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"osc": {"port": 9001}}"#).unwrap();
        assert_eq!(settings.osc.port, 9001);
        assert_eq!(settings.osc.host, "127.0.0.1");
        assert_eq!(settings.log_settings.level, "info");
    }
}
