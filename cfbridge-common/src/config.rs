use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::defaults;
use crate::error::{BridgeError, Result};

/// Top-level bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    /// How to invoke the cloudfuse executable
    #[serde(default)]
    pub tool: ToolConfig,

    /// Where the bucket is exposed locally
    #[serde(default)]
    pub target: MountTarget,

    /// Bounds for waiting on mount visibility
    #[serde(default)]
    pub poll: PollConfig,

    /// Fallback bucket parameters for settings left blank
    #[serde(default)]
    pub bucket: BucketDefaults,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How child environments are built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvMode {
    /// Child sees only the variables we pass
    Replace,
    /// Child inherits our environment with our variables on top
    Overlay,
}

/// External tool invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Path to the cloudfuse executable
    #[serde(default = "defaults::cloudfuse_executable")]
    pub executable: PathBuf,

    /// Environment construction mode for every spawn
    #[serde(default = "defaults::env_mode")]
    pub env_mode: EnvMode,

    /// `PATH` handed to the tool, if any
    #[serde(default = "defaults::search_path")]
    pub search_path: Option<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            executable: defaults::cloudfuse_executable(),
            env_mode: defaults::env_mode(),
            search_path: defaults::search_path(),
        }
    }
}

/// Identifies where the cloud bucket is exposed.
///
/// Locations left out of the `[target]` section keep the platform default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountTarget {
    /// Local mount point
    pub mount_dir: PathBuf,

    /// Local cache for file contents
    pub file_cache_dir: PathBuf,

    /// Encrypted configuration generated by `gen-config`
    pub config_file: PathBuf,

    /// Versioned template the config is generated from
    pub template_file: PathBuf,
}

impl MountTarget {
    /// Derive the standard layout below a base directory
    pub fn under<P: AsRef<Path>>(base: P, mount_dir: PathBuf) -> Self {
        let base = base.as_ref();
        Self {
            mount_dir,
            file_cache_dir: base.join("cloudfuse_cache"),
            config_file: base.join("nx_plugin_config.aes"),
            template_file: base.join("nx_plugin_config.yaml"),
        }
    }

    /// Use explicit paths for every location
    pub fn explicit(
        mount_dir: PathBuf,
        file_cache_dir: PathBuf,
        config_file: PathBuf,
        template_file: PathBuf,
    ) -> Self {
        Self {
            mount_dir,
            file_cache_dir,
            config_file,
            template_file,
        }
    }
}

impl Default for MountTarget {
    fn default() -> Self {
        defaults::mount_target()
    }
}

/// Poll loop bounds used after `mount` returns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between checks in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Number of sleeps before giving up
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_attempts: default_poll_attempts(),
        }
    }
}

/// Bucket values used when the user leaves a setting blank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketDefaults {
    /// S3-compatible endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Region passed to the storage backend
    #[serde(default = "default_region")]
    pub region: String,

    /// Capacity reported by the mount, in GB
    #[serde(default = "default_capacity_gb")]
    pub capacity_gb: u64,

    /// Only credentials are user editable; endpoint and bucket stay default
    #[serde(default)]
    pub credentials_only: bool,
}

impl BucketDefaults {
    /// Default capacity in MB, saturating for values `validate` rejects
    pub fn capacity_mb(&self) -> u64 {
        self.capacity_gb.saturating_mul(1024)
    }
}

impl Default for BucketDefaults {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            region: default_region(),
            capacity_gb: default_capacity_gb(),
            credentials_only: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "plain" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional log file; rotated daily
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

pub const DEFAULT_ENDPOINT: &str = "https://s3.us-east-1.lyvecloud.seagate.com";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_CAPACITY_GB: u64 = 1024;
/// Largest capacity whose MB value still fits in a `u64`
pub const MAX_CAPACITY_GB: u64 = u64::MAX / 1024;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// Default value functions
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_poll_attempts() -> u32 { 10 }
fn default_endpoint() -> String { DEFAULT_ENDPOINT.to_string() }
fn default_region() -> String { DEFAULT_REGION.to_string() }
fn default_capacity_gb() -> u64 { DEFAULT_CAPACITY_GB }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "plain".to_string() }

/// Error for a relative target path, naming a missing home directory when
/// that is the likely cause
fn not_absolute(name: &str, path: &Path, home_known: bool) -> BridgeError {
    let mut message = format!("{} must be an absolute path: {}", name, path.display());
    if !home_known {
        message.push_str(
            " (home directory is unknown; set HOME or give every [target] path explicitly)",
        );
    }
    BridgeError::Configuration(message)
}

impl BridgeConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tool.executable.as_os_str().is_empty() {
            return Err(BridgeError::Configuration(
                "cloudfuse executable path cannot be empty".to_string(),
            ));
        }

        let target = &self.target;
        for (name, path) in [
            ("config_file", &target.config_file),
            ("template_file", &target.template_file),
            ("file_cache_dir", &target.file_cache_dir),
        ] {
            if !path.is_absolute() {
                return Err(not_absolute(name, path, defaults::home_dir().is_some()));
            }
        }
        if target.mount_dir.as_os_str().is_empty() {
            return Err(BridgeError::Configuration(
                "mount_dir cannot be empty".to_string(),
            ));
        }

        if self.poll.max_attempts == 0 {
            return Err(BridgeError::Configuration(
                "poll.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.bucket.capacity_gb == 0 {
            return Err(BridgeError::Configuration(
                "bucket.capacity_gb must be greater than 0".to_string(),
            ));
        }
        if self.bucket.capacity_gb > MAX_CAPACITY_GB {
            return Err(BridgeError::Configuration(format!(
                "bucket.capacity_gb must be at most {}",
                MAX_CAPACITY_GB
            )));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(BridgeError::Configuration(format!(
                "Invalid log level '{}'. Valid levels: {}",
                self.logging.level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if !["plain", "json"].contains(&self.logging.format.as_str()) {
            return Err(BridgeError::Configuration(format!(
                "Invalid log format '{}'. Valid formats: plain, json",
                self.logging.format
            )));
        }

        Ok(())
    }
}

/// Load configuration from file
pub fn load_config<T, P>(config_path: P) -> Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let config_path = config_path.as_ref();
    let content = std::fs::read_to_string(config_path).map_err(|e| {
        BridgeError::Configuration(format!(
            "Failed to read config file {}: {}",
            config_path.display(),
            e
        ))
    })?;

    toml::from_str(&content).map_err(|e| {
        BridgeError::Configuration(format!(
            "Failed to parse config file {}: {}",
            config_path.display(),
            e
        ))
    })
}

/// Save configuration to file
pub fn save_config<T, P>(config: &T, config_path: P) -> Result<()>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    let config_path = config_path.as_ref();
    let content = toml::to_string_pretty(config).map_err(|e| {
        BridgeError::Configuration(format!("Failed to serialize config: {}", e))
    })?;

    // Create parent directory if it doesn't exist
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            BridgeError::Configuration(format!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    std::fs::write(config_path, content).map_err(|e| {
        BridgeError::Configuration(format!(
            "Failed to write config file {}: {}",
            config_path.display(),
            e
        ))
    })?;

    Ok(())
}

/// Load the bridge configuration and validate it
pub fn load_bridge_config<P: AsRef<Path>>(path: P) -> Result<BridgeConfig> {
    let config: BridgeConfig = load_config(path)?;
    config.validate()?;
    Ok(config)
}
