use crate::calendar::{DEFAULT_UTC_OFFSET_MINUTES, DayClock};
use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".digital-diary";
const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_API_PORT: u16 = 7890;
pub const DEFAULT_ACTIVE_DAYS_WINDOW: u32 = 30;
pub const MAX_ACTIVE_DAYS_WINDOW: u32 = 3650;
pub const MAX_DIARY_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub api_port: u16,
    pub utc_offset_minutes: i32,
    pub active_days_window: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_root_dir().join("db").join("diary.db"),
            api_port: DEFAULT_API_PORT,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            active_days_window: DEFAULT_ACTIVE_DAYS_WINDOW,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.clock()?;
        validate_active_days_window(config.active_days_window)
            .context("Invalid active_days_window in config")?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        Ok(())
    }

    /// Day resolver for the configured offset.
    pub fn clock(&self) -> Result<DayClock> {
        DayClock::new(self.utc_offset_minutes)
            .context("Invalid utc_offset_minutes in config")
    }

    /// Clamps an explicit diary page size to `1..=500`. No limit lists every entry.
    pub fn diary_limit(requested: Option<usize>) -> Option<usize> {
        requested.map(|limit| limit.clamp(1, MAX_DIARY_LIMIT))
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "db_path" => {
                if value.trim().is_empty() {
                    bail!("db_path must not be empty");
                }
                self.db_path = expand_home(value.trim());
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "utc_offset_minutes" => {
                let parsed = value
                    .parse::<i32>()
                    .map_err(|_| anyhow!("utc_offset_minutes must be a number"))?;
                DayClock::new(parsed)?;
                self.utc_offset_minutes = parsed;
            }
            "active_days_window" => {
                let parsed = value
                    .parse::<u32>()
                    .map_err(|_| anyhow!("active_days_window must be a number"))?;
                validate_active_days_window(parsed)?;
                self.active_days_window = parsed;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: db_path|db.path, api_port|api.port, utc_offset_minutes|calendar.utc_offset_minutes, active_days_window|streaks.active_days_window"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "db_path" => Some(self.db_path.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "utc_offset_minutes" => Some(self.utc_offset_minutes.to_string()),
            "active_days_window" => Some(self.active_days_window.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "db_path" | "db.path" => "db_path",
        "api_port" | "api.port" => "api_port",
        "utc_offset_minutes" | "calendar.utc_offset_minutes" => "utc_offset_minutes",
        "active_days_window" | "streaks.active_days_window" => "active_days_window",
        _ => key,
    }
}

fn validate_active_days_window(days: u32) -> Result<()> {
    if !(1..=MAX_ACTIVE_DAYS_WINDOW).contains(&days) {
        bail!("active_days_window must be between 1 and {MAX_ACTIVE_DAYS_WINDOW}");
    }

    Ok(())
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
