//! cloudfuse-bridge Common Library
//!
//! Shared functionality used by the mount and agent crates:
//! - Error taxonomy for launch, tool, filesystem and timeout failures
//! - Configuration structures and TOML handling
//! - Platform default paths
//! - Bounded polling and host helpers

pub mod config;
pub mod error;
pub mod utils;

// Re-export commonly used types
pub use config::{
    load_bridge_config, load_config, save_config, BridgeConfig, BucketDefaults, EnvMode,
    LoggingConfig, MountTarget, PollConfig, ToolConfig,
};
pub use error::{BridgeError, Result, ToolErrorKind};
pub use utils::poll::{poll_until, PollOutcome, PollPolicy};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration paths
pub mod defaults {
    use crate::config::{EnvMode, MountTarget};
    use std::path::PathBuf;
    #[cfg(not(windows))]
    use tracing::warn;

    /// Get default configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cfbridge")
    }

    /// Get default bridge config path
    pub fn bridge_config_path() -> PathBuf {
        config_dir().join("bridge.toml")
    }

    /// Get default settings path
    pub fn settings_path() -> PathBuf {
        config_dir().join("settings.toml")
    }

    /// Get the home directory, if one can be determined
    pub fn home_dir() -> Option<PathBuf> {
        dirs::home_dir()
    }

    #[cfg(not(windows))]
    pub fn mount_target() -> MountTarget {
        let home = home_dir().unwrap_or_else(|| {
            warn!("Home directory is unknown; default cloudfuse paths will be relative");
            PathBuf::new()
        });
        MountTarget::under(&home, home.join("cloudfuse"))
    }

    #[cfg(windows)]
    pub fn mount_target() -> MountTarget {
        // dirs::config_dir is %APPDATA% (Roaming) on Windows
        let base = dirs::config_dir().unwrap_or_default().join("Cloudfuse");
        MountTarget::under(&base, PathBuf::from(available_drive_letter()))
    }

    /// Highest unused drive letter, searching down from Z:
    #[cfg(windows)]
    pub fn available_drive_letter() -> String {
        ('A'..='Z')
            .rev()
            .map(|letter| format!("{}:", letter))
            .find(|drive| !std::path::Path::new(&format!("{}\\", drive)).exists())
            .unwrap_or_else(|| "Z:".to_string())
    }

    #[cfg(not(windows))]
    pub fn cloudfuse_executable() -> PathBuf {
        PathBuf::from("/usr/bin/cloudfuse")
    }

    #[cfg(windows)]
    pub fn cloudfuse_executable() -> PathBuf {
        PathBuf::from("cloudfuse.exe")
    }

    #[cfg(not(windows))]
    pub fn env_mode() -> EnvMode {
        EnvMode::Replace
    }

    #[cfg(windows)]
    pub fn env_mode() -> EnvMode {
        EnvMode::Overlay
    }

    #[cfg(not(windows))]
    pub fn search_path() -> Option<String> {
        Some("/usr/bin:/usr".to_string())
    }

    #[cfg(windows)]
    pub fn search_path() -> Option<String> {
        None
    }
}

/// Utility functions for working with configurations
pub mod config_utils {
    use crate::{config::*, defaults, Result};
    use std::path::Path;
    use tracing::info;

    /// Create default bridge configuration
    pub fn create_default_bridge_config() -> BridgeConfig {
        BridgeConfig {
            logging: LoggingConfig {
                file: Some(defaults::config_dir().join("logs").join("cfbridge.log")),
                ..LoggingConfig::default()
            },
            ..BridgeConfig::default()
        }
    }

    /// Write the default configuration unless a file already exists at `path`
    pub fn init_config(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        save_config(&create_default_bridge_config(), path)?;
        info!("Wrote default configuration to {}", path.display());
        Ok(true)
    }
}
