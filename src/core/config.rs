use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_format() -> String {
    "text".to_string()
}
fn default_color() -> String {
    "auto".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            color: default_color(),
        }
    }
}

/// Which clock decides the calendar day of an event and of "today".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayBoundary {
    #[default]
    Local,
    Utc,
}

impl DayBoundary {
    pub fn day_of(&self, at: &DateTime<FixedOffset>) -> NaiveDate {
        match self {
            Self::Local => at.with_timezone(&Local).date_naive(),
            Self::Utc => at.with_timezone(&Utc).date_naive(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        match self {
            Self::Local => Local::now().date_naive(),
            Self::Utc => Utc::now().date_naive(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Overrides the sessions root; otherwise `$CODEX_HOME/sessions` or `~/.codex/sessions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub day_boundary: DayBoundary,
}

fn default_refresh_interval() -> u64 {
    60
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            root: None,
            refresh_interval_secs: default_refresh_interval(),
            day_boundary: DayBoundary::default(),
        }
    }
}

impl SessionsConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    /// Resolve the log tree root. An explicit override wins over the config.
    pub fn resolve_root(&self, override_root: Option<PathBuf>) -> PathBuf {
        if let Some(root) = override_root.or_else(|| self.root.clone()) {
            return expand_home(root);
        }
        if let Ok(codex_home) = std::env::var("CODEX_HOME") {
            if !codex_home.trim().is_empty() {
                return PathBuf::from(codex_home).join("sessions");
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join(".codex")
            .join("sessions")
    }
}

fn expand_home(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or(path),
        Err(_) => path,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("ctally").join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Serialize and write this config to the config file path.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !["text", "json"].contains(&self.settings.default_format.as_str()) {
            issues.push(format!(
                "Invalid default_format: '{}' (must be 'text' or 'json')",
                self.settings.default_format
            ));
        }
        if !["auto", "always", "never"].contains(&self.settings.color.as_str()) {
            issues.push(format!(
                "Invalid color: '{}' (must be 'auto', 'always', or 'never')",
                self.settings.color
            ));
        }
        if self.sessions.refresh_interval_secs == 0 {
            issues.push("sessions.refresh_interval_secs must be at least 1".to_string());
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let config = AppConfig::default();
        let issues = config.validate();
        assert!(issues.is_empty(), "Default config should be valid, got: {:?}", issues);
    }

    #[test]
    fn default_format_is_text() {
        let settings = Settings::default();
        assert_eq!(settings.default_format, "text");
    }

    #[test]
    fn default_refresh_is_one_minute_local_days() {
        let sessions = SessionsConfig::default();
        assert_eq!(sessions.refresh_interval(), Duration::from_secs(60));
        assert_eq!(sessions.day_boundary, DayBoundary::Local);
    }

    #[test]
    fn validate_catches_invalid_format() {
        let mut config = AppConfig::default();
        config.settings.default_format = "xml".to_string();
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("default_format")));
    }

    #[test]
    fn validate_catches_invalid_color() {
        let mut config = AppConfig::default();
        config.settings.color = "blue".to_string();
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("color")));
    }

    #[test]
    fn validate_catches_zero_interval() {
        let mut config = AppConfig::default();
        config.sessions.refresh_interval_secs = 0;
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("refresh_interval_secs")));
        assert_eq!(config.sessions.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn parse_sessions_toml() {
        let toml = r#"
[sessions]
root = "/var/log/codex"
refresh_interval_secs = 15
day_boundary = "utc"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.sessions.root, Some(PathBuf::from("/var/log/codex")));
        assert_eq!(config.sessions.refresh_interval_secs, 15);
        assert_eq!(config.sessions.day_boundary, DayBoundary::Utc);
    }

    #[test]
    fn parse_empty_toml_gives_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.settings.default_format, "text");
        assert_eq!(config.settings.color, "auto");
        assert!(config.sessions.root.is_none());
    }

    #[test]
    fn override_root_wins_over_config() {
        let sessions = SessionsConfig {
            root: Some(PathBuf::from("/from/config")),
            ..SessionsConfig::default()
        };
        assert_eq!(
            sessions.resolve_root(Some(PathBuf::from("/from/cli"))),
            PathBuf::from("/from/cli")
        );
        assert_eq!(sessions.resolve_root(None), PathBuf::from("/from/config"));
    }

    #[test]
    fn utc_boundary_uses_utc_calendar_day() {
        let at = DateTime::parse_from_rfc3339("2025-06-15T23:30:00-02:00").unwrap();
        assert_eq!(
            DayBoundary::Utc.day_of(&at),
            NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
        );
    }

    #[test]
    fn config_path_uses_xdg_when_set() {
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/test_xdg_config");
        let path = AppConfig::config_path();
        std::env::remove_var("XDG_CONFIG_HOME");
        assert_eq!(path, PathBuf::from("/tmp/test_xdg_config/ctally/config.toml"));
    }
}
