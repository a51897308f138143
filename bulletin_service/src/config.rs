/// Configuration file loading and validation.
///
/// The file lists every gauge and station to report on, plus where output
/// goes and how speech is produced. JSON is the native format; a file
/// ending in `.toml` is read as TOML with the same keys.
///
/// ```json
/// {
///   "settings": { "relative_outputdir": "output" },
///   "usgsriver": { "gauges": [ { "id": 12150800, "friendlyName": "Snohomish River", "cmdCode": "*901" } ] },
///   "wxunder": { "api_key": "...", "stations": [ { "id": "KWAMONRO5", "friendlyName": "Monroe", "cmdCode": "*911" } ] }
/// }
/// ```

use crate::model::SourceDescriptor;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `wxunder.api_key`.
pub const API_KEY_ENV: &str = "WXUNDER_API_KEY";

pub const DEFAULT_CONFIG_FILE: &str = "bulletin_config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Source id {0} is configured more than once")]
    DuplicateSource(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

// ---------------------------------------------------------------------------
// File structure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    pub settings: AppSettings,
    #[serde(default)]
    pub usgsriver: UsgsRiverConfig,
    #[serde(default)]
    pub wxunder: WxUndergroundConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    pub relative_outputdir: String,
    /// Upper bound on each HTTP request.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Size of the worker pool; one worker per source when absent.
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// Directory the repeater controller plays reports from.
    #[serde(default = "default_playback_dir")]
    pub playback_dir: String,
    #[serde(default = "default_conf_filename")]
    pub conf_filename: String,
    #[serde(default)]
    pub speech: SpeechSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_flite")]
    pub flite: String,
    #[serde(default = "default_sox")]
    pub sox: String,
    #[serde(default = "default_voice")]
    pub voice: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            flite: default_flite(),
            sox: default_sox(),
            voice: default_voice(),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_playback_dir() -> String {
    "/etc/asterisk/custom/bulletin_output".to_string()
}

fn default_conf_filename() -> String {
    "bulletin_cmdtree.conf".to_string()
}

fn default_true() -> bool {
    true
}

fn default_flite() -> String {
    "flite".to_string()
}

fn default_sox() -> String {
    "sox".to_string()
}

fn default_voice() -> String {
    "slt".to_string()
}

/// DTMF command code as written in the config, e.g. `*901`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct CmdCode(pub String);

impl CmdCode {
    /// The code as the repeater conf expects it, without the leading `*`.
    pub fn for_conf(&self) -> &str {
        self.0.strip_prefix('*').unwrap_or(&self.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsgsRiverConfig {
    #[serde(default)]
    pub gauges: Vec<GaugeConf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GaugeConf {
    pub id: u32,
    #[serde(rename = "friendlyName")]
    pub friendly_name: String,
    #[serde(rename = "cmdCode")]
    pub cmd_code: CmdCode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WxUndergroundConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub stations: Vec<StationConf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationConf {
    pub id: String,
    #[serde(rename = "friendlyName")]
    pub friendly_name: String,
    #[serde(rename = "cmdCode")]
    pub cmd_code: CmdCode,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Configuration {
    /// Reads, applies environment overrides, and validates.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(&contents, ConfigFormat::from_path(path))?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        Ok(match format {
            ConfigFormat::Json => serde_json::from_str(contents)?,
            ConfigFormat::Toml => toml::from_str(contents)?,
        })
    }

    /// Takes the API key from the environment when one is set there.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.wxunder.api_key = key;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let settings = &self.settings;
        if settings.relative_outputdir.trim().is_empty() {
            return Err(ConfigError::Invalid("settings.relative_outputdir is empty".into()));
        }
        if settings.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("settings.fetch_timeout_secs must be positive".into()));
        }
        if settings.max_workers == Some(0) {
            return Err(ConfigError::Invalid("settings.max_workers must be positive".into()));
        }
        if self.usgsriver.gauges.is_empty() && self.wxunder.stations.is_empty() {
            return Err(ConfigError::Invalid("no gauges or stations configured".into()));
        }
        if !self.wxunder.stations.is_empty() && self.wxunder.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "stations are configured but wxunder.api_key is empty (set it or {})",
                API_KEY_ENV
            )));
        }

        let entries = self
            .usgsriver
            .gauges
            .iter()
            .map(|g| (g.id.to_string(), &g.friendly_name, &g.cmd_code))
            .chain(
                self.wxunder
                    .stations
                    .iter()
                    .map(|s| (s.id.clone(), &s.friendly_name, &s.cmd_code)),
            );

        let mut seen = HashSet::new();
        for (id, name, code) in entries {
            if id.trim().is_empty() {
                return Err(ConfigError::Invalid("a station has an empty id".into()));
            }
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("source {} has no friendlyName", id)));
            }
            if code.for_conf().trim().is_empty() {
                return Err(ConfigError::Invalid(format!("source {} has no cmdCode", id)));
            }
            if !seen.insert(id.clone()) {
                return Err(ConfigError::DuplicateSource(id));
            }
        }

        Ok(())
    }

    /// Every configured source, gauges first. All station descriptors
    /// share one copy of the API key.
    pub fn sources(&self) -> Vec<SourceDescriptor> {
        let api_key: Arc<str> = Arc::from(self.wxunder.api_key.as_str());

        self.usgsriver
            .gauges
            .iter()
            .map(|g| SourceDescriptor::gauge(g.id, g.friendly_name.clone()))
            .chain(self.wxunder.stations.iter().map(|s| {
                SourceDescriptor::station(
                    s.id.clone(),
                    s.friendly_name.clone(),
                    Arc::clone(&api_key),
                )
            }))
            .collect()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.fetch_timeout_secs)
    }

    pub fn output_dir(&self) -> &Path {
        Path::new(&self.settings.relative_outputdir)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
