use crate::timers::{HEARTBEAT_INTERVAL_MS, STATUS_INTERVAL_MS};
use crate::transition::DEFAULT_FALLBACK_DURATION_MS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Current config schema version for future migration support
const CONFIG_VERSION: u32 = 1;

pub const APP_NAME: &str = "obs-sim";

/// Simulator settings. Every section is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Schema version for migration support
    #[serde(default = "default_version")]
    pub version: u32,
    /// When set, clients must authenticate before most requests
    pub password: Option<String>,
    pub timing: TimingConfig,
    pub output: OutputConfig,
    pub video: VideoConfig,
    pub recording: RecordingConfig,
    pub profiles: ProfilesConfig,
    pub stream: StreamConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            password: None,
            timing: TimingConfig::default(),
            output: OutputConfig::default(),
            video: VideoConfig::default(),
            recording: RecordingConfig::default(),
            profiles: ProfilesConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

/// Delays and intervals, in milliseconds of virtual time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub output_start_ms: u64,
    pub output_stop_ms: u64,
    pub replay_save_ms: u64,
    /// Duration used by transition types without a configurable duration
    pub transition_fallback_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub status_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            output_start_ms: 500,
            output_stop_ms: 500,
            replay_save_ms: 500,
            transition_fallback_ms: DEFAULT_FALLBACK_DURATION_MS,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            status_interval_ms: STATUS_INTERVAL_MS,
        }
    }
}

/// Constants the output counters are derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub fps: f64,
    pub bitrate_kbps: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            bitrate_kbps: 2500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub base_width: u32,
    pub base_height: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub scale_type: String,
    pub video_format: String,
    pub color_space: String,
    pub color_range: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            base_width: 1920,
            base_height: 1080,
            output_width: 1280,
            output_height: 720,
            scale_type: "VIDEO_SCALE_BICUBIC".to_string(),
            video_format: "VIDEO_FORMAT_NV12".to_string(),
            color_space: "VIDEO_CS_709".to_string(),
            color_range: "VIDEO_RANGE_PARTIAL".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub folder: String,
    pub filename_formatting: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            folder: "/home/user/Videos".to_string(),
            filename_formatting: "%CCYY-%MM-%DD %hh-%mm-%ss".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilesConfig {
    /// Profile names, in listing order. The first one is current at start.
    pub names: Vec<String>,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            names: vec!["Untitled".to_string(), "Recording".to_string()],
        }
    }
}

/// Stream service settings as `GetStreamSettings` reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    #[serde(rename = "type")]
    pub service_type: String,
    pub server: String,
    pub key: String,
    pub use_auth: bool,
    pub username: String,
    pub password: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            service_type: "rtmp_custom".to_string(),
            server: "rtmp://localhost/live".to_string(),
            key: "live_sim".to_string(),
            use_auth: false,
            username: String::new(),
            password: String::new(),
        }
    }
}

impl StreamConfig {
    /// `settings` object in protocol casing.
    pub fn settings_json(&self) -> Value {
        json!({
            "server": self.server,
            "key": self.key,
            "use_auth": self.use_auth,
            "username": self.username,
            "password": self.password,
        })
    }
}

impl SimulatorConfig {
    fn validate(&self) -> Result<()> {
        if !(self.output.fps > 0.0) {
            anyhow::bail!("output.fps must be positive, got {}", self.output.fps);
        }
        if self.timing.heartbeat_interval_ms == 0 || self.timing.status_interval_ms == 0 {
            anyhow::bail!("timer intervals must be non-zero");
        }
        if self.profiles.names.is_empty() {
            anyhow::bail!("at least one profile is required");
        }
        Ok(())
    }
}

/// Returns the path to the config file: ~/.config/obs-sim/simulator.toml
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_NAME).join("simulator.toml"))
}

/// Load the config from `path` (or the default location), falling back to
/// defaults when no file exists. If the main file is corrupted, attempts
/// to load from backup.
pub fn load_config(path: Option<&Path>) -> Result<SimulatorConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match config_path() {
            Some(p) => p,
            None => return Ok(SimulatorConfig::default()),
        },
    };
    let bak_path = path.with_extension("toml.bak");

    if !path.exists() {
        // Try backup if main config doesn't exist
        if bak_path.exists() {
            log::warn!("Main config missing, loading from backup: {}", bak_path.display());
            return load_from_path(&bak_path);
        }
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(SimulatorConfig::default());
    }

    match load_from_path(&path) {
        Ok(config) => Ok(config),
        Err(e) => {
            if bak_path.exists() {
                log::warn!("Main config corrupted ({:#}), loading from backup", e);
                return load_from_path(&bak_path);
            }
            Err(e)
        }
    }
}

fn load_from_path(path: &Path) -> Result<SimulatorConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

/// Parse and validate config text.
pub fn parse_config(contents: &str) -> Result<SimulatorConfig> {
    let config: SimulatorConfig = toml::from_str(contents).context("Invalid TOML")?;

    // Future: handle migrations based on config.version
    if config.version > CONFIG_VERSION {
        log::warn!(
            "Config version {} is newer than supported version {}",
            config.version,
            CONFIG_VERSION
        );
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").expect("parse");
        assert_eq!(config, SimulatorConfig::default());
        assert_eq!(config.timing.output_start_ms, 500);
        assert_eq!(config.timing.transition_fallback_ms, 300);
        assert_eq!(config.timing.heartbeat_interval_ms, 100);
        assert_eq!(config.timing.status_interval_ms, 2000);
    }

    #[test]
    fn version_defaults_to_one() {
        let config = parse_config("password = \"hunter2\"").expect("parse");
        assert_eq!(config.version, 1);
        assert_eq!(config.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let toml_str = r#"
            [timing]
            output_start_ms = 50

            [output]
            bitrate_kbps = 6000

            [stream]
            type = "rtmp_common"
            server = "rtmp://a.example/app"
        "#;
        let config = parse_config(toml_str).expect("parse");
        assert_eq!(config.timing.output_start_ms, 50);
        assert_eq!(config.timing.output_stop_ms, 500);
        assert_eq!(config.output.bitrate_kbps, 6000);
        assert_eq!(config.output.fps, 30.0);
        assert_eq!(config.stream.service_type, "rtmp_common");
        assert_eq!(config.stream.key, "live_sim");
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = SimulatorConfig::default();
        config.profiles.names = vec!["Main".into()];
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        assert_eq!(parse_config(&toml_str).expect("parse"), config);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse_config("[output]\nfps = 0").is_err());
        assert!(parse_config("[profiles]\nnames = []").is_err());
        assert!(parse_config("this is not = = toml").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("simulator.toml"))).unwrap();
        assert_eq!(config, SimulatorConfig::default());
    }

    #[test]
    fn corrupt_file_falls_back_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simulator.toml");
        fs::write(&path, "[[[broken").unwrap();
        fs::write(path.with_extension("toml.bak"), "password = \"from-backup\"").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.password.as_deref(), Some("from-backup"));
    }

    #[test]
    fn corrupt_file_without_backup_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simulator.toml");
        fs::write(&path, "[[[broken").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
