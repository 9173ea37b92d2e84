//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IgcLoggerError, Result};
use crate::igc::protocol::{GRecordLayout, HeaderFields};
use crate::recorder::session::SessionOptions;
use crate::recorder::RecorderSettings;
use crate::storage::writer::CommitStrategy;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub igcheader: IgcHeaderConfig,
    #[serde(default)]
    pub gps: GpsConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pilot and glider metadata for the H records
#[derive(Debug, Deserialize, Clone, Default)]
pub struct IgcHeaderConfig {
    #[serde(default)]
    pub pilot: String,

    #[serde(default)]
    pub copilot: String,

    #[serde(default)]
    pub glider: String,

    #[serde(default)]
    pub registration: String,

    #[serde(default)]
    pub competition_id: String,

    #[serde(default)]
    pub competition_class: String,
}

/// GNSS receiver description
#[derive(Debug, Deserialize, Clone)]
pub struct GpsConfig {
    #[serde(default = "default_gps_receiver")]
    pub receiver: String,
}

/// Flight log placement and recording behavior
#[derive(Debug, Deserialize, Clone)]
pub struct LoggerConfig {
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_counter_key")]
    pub counter_key: String,

    #[serde(default = "default_log_interval_s")]
    pub log_interval_s: u32,

    #[serde(default = "default_liftoff_detection")]
    pub liftoff_detection: bool,

    #[serde(default = "default_liftoff_threshold")]
    pub liftoff_threshold: f32,

    #[serde(default)]
    pub commit: CommitStrategy,

    #[serde(default)]
    pub g_record_layout: GRecordLayout,
}

/// Diagnostic log output
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Directory for the log file; console only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

// Default value functions
fn default_gps_receiver() -> String { "unknown".to_string() }

fn default_root_dir() -> PathBuf { PathBuf::from("./flights") }
fn default_file_prefix() -> String { "lg".to_string() }
fn default_counter_key() -> String { "index".to_string() }
fn default_log_interval_s() -> u32 { 2 }
fn default_liftoff_detection() -> bool { true }
fn default_liftoff_threshold() -> f32 { 1.5 }

fn default_log_file() -> String { "igc-logger.log".to_string() }

impl Default for GpsConfig {
    fn default() -> Self {
        Self { receiver: default_gps_receiver() }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            file_prefix: default_file_prefix(),
            counter_key: default_counter_key(),
            log_interval_s: default_log_interval_s(),
            liftoff_detection: default_liftoff_detection(),
            liftoff_threshold: default_liftoff_threshold(),
            commit: CommitStrategy::default(),
            g_record_layout: GRecordLayout::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_file: default_log_file(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> IgcLoggerError {
    IgcLoggerError::Config(toml::de::Error::custom(message))
}

/// Usable as a file name component on FAT media
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use igc_logger::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.logger.root_dir.as_os_str().is_empty() {
            return Err(invalid("root_dir cannot be empty"));
        }

        // File names stay within 8.3 on the logger's FAT card
        if !is_plain_name(&self.logger.file_prefix) || self.logger.file_prefix.len() > 5 {
            return Err(invalid(
                "file_prefix must be 1 to 5 characters of A-Z, a-z, 0-9, '_' or '-'",
            ));
        }

        if !is_plain_name(&self.logger.counter_key) {
            return Err(invalid("counter_key must contain only A-Z, a-z, 0-9, '_' or '-'"));
        }

        if self.logger.log_interval_s > 3600 {
            return Err(invalid("log_interval_s must be between 0 and 3600"));
        }

        if !self.logger.liftoff_threshold.is_finite() || self.logger.liftoff_threshold <= 0.0 {
            return Err(invalid("liftoff_threshold must be a positive climb rate in m/s"));
        }

        if self.logging.log_dir.is_some() && self.logging.log_file.is_empty() {
            return Err(invalid("log_file cannot be empty when log_dir is set"));
        }

        Ok(())
    }

    /// H-record metadata
    pub fn header_fields(&self) -> HeaderFields {
        HeaderFields {
            pilot: self.igcheader.pilot.clone(),
            copilot: self.igcheader.copilot.clone(),
            glider_type: self.igcheader.glider.clone(),
            registration: self.igcheader.registration.clone(),
            competition_id: self.igcheader.competition_id.clone(),
            competition_class: self.igcheader.competition_class.clone(),
            gps_receiver: self.gps.receiver.clone(),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            root_dir: self.logger.root_dir.clone(),
            file_prefix: self.logger.file_prefix.clone(),
            commit: self.logger.commit,
            layout: self.logger.g_record_layout,
        }
    }

    pub fn recorder_settings(&self) -> RecorderSettings {
        RecorderSettings {
            fields: self.header_fields(),
            session: self.session_options(),
            log_interval_s: self.logger.log_interval_s,
            liftoff_detection: self.logger.liftoff_detection,
            liftoff_threshold: self.logger.liftoff_threshold,
        }
    }
}
