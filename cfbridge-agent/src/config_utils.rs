use crate::settings::Settings;
use cfbridge_common::{
    config::{load_config, BridgeConfig},
    config_utils::create_default_bridge_config,
    defaults,
    error::{BridgeError, Result},
};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Determine the configuration file path
pub fn determine_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path
        .or_else(|| env::var("CFBRIDGE_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(defaults::bridge_config_path)
}

/// Load the bridge configuration, falling back to defaults when the file is
/// missing or unreadable
pub fn load_or_default(config_path: &Path) -> BridgeConfig {
    if !config_path.exists() {
        warn!(
            "Configuration file {} not found. Using default configuration.",
            config_path.display()
        );
        return create_default_bridge_config();
    }

    match load_config(config_path) {
        Ok(config) => {
            info!("Loaded configuration from: {}", config_path.display());
            config
        }
        Err(e) => {
            warn!(
                "Failed to load config from {}: {}. Using default configuration.",
                config_path.display(),
                e
            );
            create_default_bridge_config()
        }
    }
}

/// Apply `CFBRIDGE_*` environment variable overrides to configuration
pub fn apply_env_overrides(config: &mut BridgeConfig) {
    apply_overrides(config, |key| env::var(key).ok());
}

/// Apply overrides using `lookup` in place of the process environment
pub fn apply_overrides<F>(config: &mut BridgeConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = lookup("CFBRIDGE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(path) = lookup("CFBRIDGE_CLOUDFUSE_PATH") {
        config.tool.executable = PathBuf::from(path);
    }
    if let Some(dir) = lookup("CFBRIDGE_MOUNT_DIR") {
        config.target.mount_dir = PathBuf::from(dir);
    }
    if let Some(dir) = lookup("CFBRIDGE_CACHE_DIR") {
        config.target.file_cache_dir = PathBuf::from(dir);
    }
}

/// Load a settings snapshot, with `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
/// from the environment taking precedence over the file
pub fn load_settings(path: &Path) -> Result<Settings> {
    load_settings_with(path, |key| env::var(key).ok())
}

pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings: Settings = load_config(path)?;

    if let Some(key_id) = lookup("AWS_ACCESS_KEY_ID") {
        settings.key_id = key_id;
    }
    if let Some(secret) = lookup("AWS_SECRET_ACCESS_KEY") {
        settings.secret_key = secret;
    }

    if settings.is_empty() {
        warn!("No credentials in {}", path.display());
    }
    Ok(settings)
}

/// Fail unless `path` exists, with a message pointing at the flag to fix it
pub fn require_file(path: &Path, what: &str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(BridgeError::Configuration(format!(
            "{} does not exist: {}",
            what,
            path.display()
        )))
    }
}
