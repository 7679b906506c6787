use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
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
    "variolink".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Peripheral identity
    #[serde(default = "default_service_prefix")]
    pub service_prefix: String,
    #[serde(default = "default_altitude_uuid")]
    pub altitude_char_uuid: String,
    #[serde(default = "default_pressure_uuid")]
    pub pressure_char_uuid: String,
    #[serde(default = "default_angle_uuid")]
    pub angle_char_uuid: String,
    #[serde(default = "default_buzzer_uuid")]
    pub buzzer_char_uuid: String,

    // Discovery
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,

    // Telemetry display history
    #[serde(default = "default_history_capacity")]
    pub telemetry_history_capacity: usize,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_prefix: default_service_prefix(),
            altitude_char_uuid: default_altitude_uuid(),
            pressure_char_uuid: default_pressure_uuid(),
            angle_char_uuid: default_angle_uuid(),
            buzzer_char_uuid: default_buzzer_uuid(),
            discovery_timeout_secs: default_discovery_timeout_secs(),
            telemetry_history_capacity: default_history_capacity(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_service_prefix() -> String {
    crate::infrastructure::bluetooth::protocol::SERVICE_PREFIX.to_string()
}
fn default_altitude_uuid() -> String {
    crate::infrastructure::bluetooth::protocol::ALTITUDE_CHAR_UUID.to_string()
}
fn default_pressure_uuid() -> String {
    crate::infrastructure::bluetooth::protocol::PRESSURE_CHAR_UUID.to_string()
}
fn default_angle_uuid() -> String {
    crate::infrastructure::bluetooth::protocol::ANGLE_CHAR_UUID.to_string()
}
fn default_buzzer_uuid() -> String {
    crate::infrastructure::bluetooth::protocol::BUZZER_CHAR_UUID.to_string()
}
fn default_discovery_timeout_secs() -> u64 {
    20
}
fn default_history_capacity() -> usize {
    256
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("Variolink");
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

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
