use crate::estimation::pedestrian::{
    BusyWindow, DEFAULT_BUSY_WINDOWS, DEFAULT_CROSSING_PROBABILITY, DEFAULT_PENALTY_SEC,
    PedestrianDelayModel,
};
use crate::signal::{DEFAULT_MATCH_TOLERANCE_DEG, LookupKind, effective_tolerance};
use crate::state::DEFAULT_GEOCODE_CACHE_CAPACITY;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use time::UtcOffset;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_CATALOG_REFRESH_SECS: u64 = 300;
pub const DEFAULT_OSRM_BASE_URL: &str = "http://router.project-osrm.org";
pub const DEFAULT_NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = "GreenWaveApp/1.0";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub signals: Option<SignalsSection>,
    #[serde(default)]
    pub pedestrians: Option<PedestriansSection>,
    #[serde(default)]
    pub routing: Option<RoutingSection>,
    #[serde(default)]
    pub geocoding: Option<GeocodingSection>,
    #[serde(default)]
    pub time: Option<TimeSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
    /// Seconds between signal catalog reloads (default: 300)
    pub catalog_refresh_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignalsSection {
    pub catalog_path: Option<PathBuf>,
    /// "linear" or "grid" (default: linear)
    pub lookup: Option<LookupKind>,
    pub match_tolerance_deg: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PedestriansSection {
    pub busy_windows: Option<Vec<BusyWindow>>,
    pub crossing_probability: Option<f64>,
    pub penalty_sec: Option<f64>,
    /// Fixed RNG seed for replayable estimates
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutingSection {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeocodingSection {
    pub base_url: Option<String>,
    /// Appended to every query, e.g. "Austin, TX"
    pub query_suffix: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Distinct queries kept in the LRU cache (default: 1000)
    pub cache_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimeSection {
    /// Offset of the zone signal plans are written in (default: 0)
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Unknown level names fall back to INFO.
    pub fn log_level(&self) -> tracing::Level {
        self.logging
            .level
            .trim()
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn catalog_refresh_interval(&self) -> Duration {
        let secs = self
            .server
            .as_ref()
            .and_then(|s| s.catalog_refresh_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_CATALOG_REFRESH_SECS);
        Duration::from_secs(secs)
    }

    pub fn catalog_path(&self) -> Option<&Path> {
        let path = self.signals.as_ref()?.catalog_path.as_deref()?;
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    pub fn lookup_kind(&self) -> LookupKind {
        self.signals
            .as_ref()
            .and_then(|s| s.lookup)
            .unwrap_or_default()
    }

    /// Non-positive or non-finite tolerances fall back to the default.
    pub fn match_tolerance_deg(&self) -> f64 {
        self.signals
            .as_ref()
            .and_then(|s| s.match_tolerance_deg)
            .map_or(DEFAULT_MATCH_TOLERANCE_DEG, effective_tolerance)
    }

    pub fn pedestrian_model(&self) -> PedestrianDelayModel {
        let section = self.pedestrians.as_ref();
        PedestrianDelayModel::new(
            section
                .and_then(|s| s.busy_windows.clone())
                .unwrap_or_else(|| DEFAULT_BUSY_WINDOWS.to_vec()),
            section
                .and_then(|s| s.crossing_probability)
                .unwrap_or(DEFAULT_CROSSING_PROBABILITY),
            section
                .and_then(|s| s.penalty_sec)
                .unwrap_or(DEFAULT_PENALTY_SEC),
        )
    }

    pub fn rng_seed(&self) -> Option<u64> {
        self.pedestrians.as_ref().and_then(|s| s.seed)
    }

    pub fn osrm_base_url(&self) -> &str {
        self.routing
            .as_ref()
            .and_then(|s| s.base_url.as_deref())
            .unwrap_or(DEFAULT_OSRM_BASE_URL)
    }

    pub fn routing_timeout(&self) -> Duration {
        let secs = self
            .routing
            .as_ref()
            .and_then(|s| s.timeout_secs)
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn nominatim_base_url(&self) -> &str {
        self.geocoding
            .as_ref()
            .and_then(|s| s.base_url.as_deref())
            .unwrap_or(DEFAULT_NOMINATIM_BASE_URL)
    }

    pub fn geocoding_query_suffix(&self) -> Option<String> {
        self.geocoding.as_ref().and_then(|s| s.query_suffix.clone())
    }

    pub fn user_agent(&self) -> &str {
        self.geocoding
            .as_ref()
            .and_then(|s| s.user_agent.as_deref())
            .unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn geocoding_timeout(&self) -> Duration {
        let secs = self
            .geocoding
            .as_ref()
            .and_then(|s| s.timeout_secs)
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Zero falls back to the default capacity.
    pub fn geocode_cache_capacity(&self) -> NonZeroUsize {
        self.geocoding
            .as_ref()
            .and_then(|s| s.cache_capacity)
            .and_then(NonZeroUsize::new)
            .unwrap_or(DEFAULT_GEOCODE_CACHE_CAPACITY)
    }

    /// Fixed offset with no daylight saving rules.
    pub fn utc_offset(&self) -> Result<UtcOffset, ConfigError> {
        let minutes = self
            .time
            .as_ref()
            .and_then(|s| s.utc_offset_minutes)
            .unwrap_or(0);
        UtcOffset::from_whole_seconds(minutes.saturating_mul(60))
            .map_err(|err| ConfigError::Invalid(format!("utc_offset_minutes {minutes}: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    const MINIMAL: &str = r#"
[app]
name = "greenwave"

[logging]
level = "info"
"#;

    fn write_temp(label: &str, contents: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir().join(format!("greenwave-config-{label}-{unique}.toml"));
        fs::write(&path, contents)?;
        Ok(path)
    }

    #[test]
    fn default_config_includes_catalog_path() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_default()?;
        assert!(config.catalog_path().is_some());
        config.utc_offset()?;
        Ok(())
    }

    #[test]
    fn minimal_config_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config: Config = toml::from_str(MINIMAL)?;

        assert_eq!(config.server_port(), DEFAULT_SERVER_PORT);
        assert_eq!(config.catalog_path(), None);
        assert_eq!(config.lookup_kind(), LookupKind::Linear);
        assert_eq!(config.match_tolerance_deg(), DEFAULT_MATCH_TOLERANCE_DEG);
        assert_eq!(config.pedestrian_model(), PedestrianDelayModel::default());
        assert_eq!(config.rng_seed(), None);
        assert_eq!(config.osrm_base_url(), DEFAULT_OSRM_BASE_URL);
        assert_eq!(config.user_agent(), DEFAULT_USER_AGENT);
        assert_eq!(config.geocode_cache_capacity(), DEFAULT_GEOCODE_CACHE_CAPACITY);
        assert_eq!(config.utc_offset()?, UtcOffset::UTC);
        assert_eq!(config.log_level(), tracing::Level::INFO);
        Ok(())
    }

    #[test]
    fn sections_override_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!(
            "{MINIMAL}{}",
            r#"
[server]
port = 9090
catalog_refresh_secs = 30

[signals]
catalog_path = "data/signals.json"
lookup = "grid"
match_tolerance_deg = 0.0003

[pedestrians]
busy_windows = [{ start_hour = 7, end_hour = 9 }]
crossing_probability = 0.5
penalty_sec = 20.0
seed = 11

[geocoding]
cache_capacity = 250

[time]
utc_offset_minutes = -360
"#
        );
        let config: Config = toml::from_str(&contents)?;

        assert_eq!(config.server_port(), 9090);
        assert_eq!(config.catalog_refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.lookup_kind(), LookupKind::Grid);
        assert_eq!(config.match_tolerance_deg(), 0.0003);
        assert_eq!(config.rng_seed(), Some(11));
        assert!(config.pedestrian_model().is_busy_hour(8));
        assert!(!config.pedestrian_model().is_busy_hour(12));
        assert_eq!(config.utc_offset()?.whole_hours(), -6);
        assert_eq!(config.geocode_cache_capacity().get(), 250);
        Ok(())
    }

    #[test]
    fn empty_catalog_path_is_treated_as_missing() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp("empty-catalog", &format!("{MINIMAL}\n[signals]\ncatalog_path = \"\"\n"))?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(result?.catalog_path().is_none());
        Ok(())
    }

    #[test]
    fn out_of_range_offset_is_invalid() -> Result<(), Box<dyn std::error::Error>> {
        let config: Config = toml::from_str(&format!("{MINIMAL}\n[time]\nutc_offset_minutes = 6000\n"))?;

        assert!(matches!(config.utc_offset(), Err(ConfigError::Invalid(_))));
        Ok(())
    }

    #[test]
    fn bad_tolerance_and_level_fall_back() -> Result<(), Box<dyn std::error::Error>> {
        let contents = r#"
[app]
name = "greenwave"

[logging]
level = "chatty"

[signals]
match_tolerance_deg = -1.0

[geocoding]
cache_capacity = 0
"#;
        let config: Config = toml::from_str(contents)?;

        assert_eq!(config.match_tolerance_deg(), DEFAULT_MATCH_TOLERANCE_DEG);
        assert_eq!(config.geocode_cache_capacity(), DEFAULT_GEOCODE_CACHE_CAPACITY);
        assert_eq!(config.log_level(), tracing::Level::INFO);
        Ok(())
    }

    #[test]
    fn unknown_lookup_kind_is_a_parse_error() {
        let result: Result<Config, _> =
            toml::from_str(&format!("{MINIMAL}\n[signals]\nlookup = \"quadtree\"\n"));

        assert!(result.is_err());
    }

    #[test]
    fn missing_config_file_returns_read_error() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("greenwave-config-missing-{unique}.toml"));

        let result = load_from_path(&path);

        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn invalid_toml_returns_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp("invalid", "not = [valid")?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }
}
