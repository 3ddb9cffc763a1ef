//! Settings at ~/.config/astrocron/config.toml
//!
//! Values can be overridden with `ASTROCRON_*` environment variables,
//! e.g. `ASTROCRON_LATITUDE=48.1`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use crate::astro::Location;
use crate::error::{AstroCronError, AstroCronResult};
use crate::server_clock::ServerClock;

static DEFAULT_EVENT_DIR: &str = "~/astrocron/events";
static DEFAULT_OBJECTS_FILE: &str = "~/astrocron/objects.json";

fn default_event_dir() -> PathBuf {
    PathBuf::from(DEFAULT_EVENT_DIR)
}

fn default_objects_file() -> PathBuf {
    PathBuf::from(DEFAULT_OBJECTS_FILE)
}

fn default_language() -> String {
    "en".to_string()
}

/// Which weekday leads in weekday pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirstDayOfWeek {
    Monday,
    #[default]
    Sunday,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,

    /// Scheduler host offset east of UTC. Takes precedence over `server_timezone`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_utc_offset_minutes: Option<i32>,

    /// IANA zone of the scheduler host, e.g. `Europe/Berlin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timezone: Option<String>,

    #[serde(default)]
    pub first_day_of_week: FirstDayOfWeek,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_event_dir")]
    pub event_dir: PathBuf,

    #[serde(default = "default_objects_file")]
    pub objects_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            latitude: 0.0,
            longitude: 0.0,
            server_utc_offset_minutes: None,
            server_timezone: None,
            first_day_of_week: FirstDayOfWeek::default(),
            language: default_language(),
            event_dir: default_event_dir(),
            objects_file: default_objects_file(),
        }
    }
}

impl Settings {
    pub fn config_path() -> AstroCronResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AstroCronError::Config("Could not determine config directory".into()))?
            .join("astrocron");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the user's settings, writing a commented default file on first run.
    pub fn load() -> AstroCronResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::build(
            Config::builder()
                .add_source(File::from(config_path).required(false))
                .add_source(Environment::with_prefix("ASTROCRON").try_parsing(true)),
        )
    }

    /// Load settings from a specific file only.
    pub fn load_from(path: &Path) -> AstroCronResult<Self> {
        Self::build(Config::builder().add_source(File::from(path).required(false)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> AstroCronResult<Self> {
        builder
            .build()
            .map_err(|e| AstroCronError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| AstroCronError::Config(e.to_string()))
    }

    /// Save the settings to ~/.config/astrocron/config.toml
    pub fn save(&self) -> AstroCronResult<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AstroCronResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| AstroCronError::Config(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| AstroCronError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> AstroCronResult<()> {
        let contents = format!(
            "\
# astrocron configuration

# Site used for sunrise, sunset and the other sun events:
# latitude = 52.52
# longitude = 13.405

# Clock of the scheduler host, either as a fixed offset or a zone name:
# server_utc_offset_minutes = 60
# server_timezone = \"Europe/Berlin\"

# First column of weekday pickers (monday or sunday):
# first_day_of_week = \"monday\"

# language = \"en\"

# Where event records are stored, one JSON file per event:
# event_dir = \"{}\"

# Device objects events can be bound to:
# objects_file = \"{}\"
",
            DEFAULT_EVENT_DIR, DEFAULT_OBJECTS_FILE
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AstroCronError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| AstroCronError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }

    /// The scheduler host's clock as of `now`.
    pub fn server_clock(&self, now: DateTime<Utc>) -> AstroCronResult<ServerClock> {
        if let Some(minutes) = self.server_utc_offset_minutes {
            return ServerClock::from_offset_minutes(minutes);
        }
        match &self.server_timezone {
            Some(name) => ServerClock::from_timezone_name(name, now),
            None => Ok(ServerClock::utc()),
        }
    }

    pub fn event_dir(&self) -> PathBuf {
        expand(&self.event_dir)
    }

    pub fn objects_file(&self) -> PathBuf {
        expand(&self.objects_file)
    }

    /// Weekday numbers (0 = Sunday) in display order.
    pub fn weekday_order(&self) -> [u8; 7] {
        match self.first_day_of_week {
            FirstDayOfWeek::Monday => [1, 2, 3, 4, 5, 6, 0],
            FirstDayOfWeek::Sunday => [0, 1, 2, 3, 4, 5, 6],
        }
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_config_file_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Settings::create_default_config(&path).unwrap();
        let settings = Settings::load_from(&path).unwrap();

        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "latitude = 48.1\nlongitude = 11.6\nserver_timezone = \"Europe/Berlin\"\nfirst_day_of_week = \"monday\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.location(), Location::new(48.1, 11.6));
        assert_eq!(settings.weekday_order()[0], 1);

        let winter = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert_eq!(settings.server_clock(winter).unwrap().offset_minutes(), 60);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let settings = Settings {
            latitude: 59.91,
            longitude: 10.75,
            server_utc_offset_minutes: Some(60),
            first_day_of_week: FirstDayOfWeek::Monday,
            ..Settings::default()
        };

        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_fixed_offset_wins_over_zone() {
        let settings = Settings {
            server_utc_offset_minutes: Some(-240),
            server_timezone: Some("Europe/Berlin".into()),
            ..Settings::default()
        };
        assert_eq!(settings.server_clock(Utc::now()).unwrap().offset_minutes(), -240);
    }

    #[test]
    fn test_invalid_value_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "first_day_of_week = \"friday\"\n").unwrap();

        assert!(matches!(
            Settings::load_from(&path),
            Err(AstroCronError::Config(_))
        ));
    }
}
