use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tapper_types::{Region, RegionError};

use self::click::ClickConfig;
use self::ocr::OcrConfig;
use self::polling::{INTERVAL_RANGE_SECS, MatcherConfig, PollingConfig};

pub mod click;
pub mod ocr;
pub mod polling;

/// What the loop searches for; the two modes are exclusive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Case-insensitive substring of an OCR word
    Text(String),
    /// Path to a reference image
    Template(PathBuf),
}

impl Target {
    pub fn describe(&self) -> String {
        match self {
            Target::Text(text) => text.clone(),
            Target::Template(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No target configured, set a text or a template")]
    MissingTarget,

    #[error("Target text is empty")]
    EmptyText,

    #[error("Confidence must be within [0, 1], got {0}")]
    Confidence(f32),

    #[error("Interval must be within [1, 3600] seconds, got {0}")]
    Interval(u64),

    #[error("Invalid region: {0}")]
    Region(#[from] RegionError),

    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Settings for one run, fixed once the loop starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub matcher: MatcherConfig,
    pub ocr: OcrConfig,
    pub click: ClickConfig,
    pub polling: PollingConfig,

    pub target: Option<Target>,
    /// Search area, whole primary screen when absent
    pub region: Option<Region>,
}

impl Config {
    /// Defaults with environment overrides applied
    pub fn new() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();
        config.apply_overrides(lookup);
        config
    }

    /// Load a JSON profile; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        tracing::info!("Loading config from {}", path.display());
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(confidence) = parse_var(&lookup, "TAPPER_CONFIDENCE") {
            self.matcher.confidence = confidence;
        }
        if let Some(interval) = parse_var(&lookup, "TAPPER_INTERVAL_SECS") {
            self.polling.interval_secs = interval;
        }
        if let Some(pause) = parse_var(&lookup, "TAPPER_CLICK_PAUSE_MS") {
            self.click.pause_ms = pause;
        }
        if let Some(path) = lookup("TAPPER_TESSERACT") {
            self.ocr.engine_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("TAPPER_TESSDATA") {
            self.ocr.tessdata_dir = Some(PathBuf::from(dir));
        }
        if let Some(language) = lookup("TAPPER_OCR_LANG") {
            self.ocr.language = language;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.target {
            None => return Err(ConfigError::MissingTarget),
            Some(Target::Text(text)) if text.trim().is_empty() => {
                return Err(ConfigError::EmptyText);
            }
            Some(_) => {}
        }

        let confidence = self.matcher.confidence;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ConfigError::Confidence(confidence));
        }

        if !INTERVAL_RANGE_SECS.contains(&self.polling.interval_secs) {
            return Err(ConfigError::Interval(self.polling.interval_secs));
        }

        if let Some(region) = &self.region {
            region.validate()?;
        }

        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("Ignoring {key}={value}: not a valid value");
            None
        }
    }
}
