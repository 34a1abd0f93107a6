use chrono::Weekday;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level config (onair.toml + ONAIR_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnairConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Broadcast-week settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// First day of a broadcast week. Week anchors normalise to this day.
    #[serde(default)]
    pub week_start: WeekStart,
}

/// Day a broadcast week begins on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl WeekStart {
    pub fn weekday(self) -> Weekday {
        match self {
            WeekStart::Sunday => Weekday::Sun,
            WeekStart::Monday => Weekday::Mon,
            WeekStart::Tuesday => Weekday::Tue,
            WeekStart::Wednesday => Weekday::Wed,
            WeekStart::Thursday => Weekday::Thu,
            WeekStart::Friday => Weekday::Fri,
            WeekStart::Saturday => Weekday::Sat,
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.onair/onair.db", home)
}

impl OnairConfig {
    /// Load config from a TOML file with ONAIR_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `ONAIR_CONFIG` env var
    ///   3. ~/.onair/onair.toml
    ///
    /// A missing file is not an error; defaults fill every field.
    /// Nested keys use a double underscore: `ONAIR_SCHEDULE__WEEK_START=monday`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("ONAIR_CONFIG").ok())
            .unwrap_or_else(default_config_path);
        debug!(%path, "loading config");

        Figment::from(Serialized::defaults(OnairConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("ONAIR_").ignore(&["CONFIG"]).split("__"))
            .extract()
            .map_err(|e| crate::error::OnairError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.onair/onair.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_week_start_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "[database]\npath = \"/tmp/radio.db\"\n\n[schedule]\nweek_start = \"monday\""
        )
        .expect("write");

        let config = OnairConfig::load(file.path().to_str()).expect("load");
        assert_eq!(config.database.path, "/tmp/radio.db");
        assert_eq!(config.schedule.week_start, WeekStart::Monday);
        assert_eq!(config.schedule.week_start.weekday(), Weekday::Mon);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.toml");
        let config = OnairConfig::load(path.to_str()).expect("load");
        assert_eq!(config.schedule.week_start, WeekStart::Sunday);
        assert!(config.database.path.ends_with("onair.db"));
    }

    #[test]
    fn rejects_unknown_week_start() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[schedule]\nweek_start = \"someday\"").expect("write");
        let err = OnairConfig::load(file.path().to_str()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
