//! Lifecycle of one cloudfuse mount: config generation, credential
//! validation, mounting and unmounting.

use crate::diagnostics;
use crate::mount_check::{FsProbe, MountProbe};
use crate::process::{Environment, ProcessResult, ProcessRunner, SystemRunner};
use crate::template;
use cfbridge_common::config::{BridgeConfig, EnvMode, MountTarget, ToolConfig};
use cfbridge_common::error::{BridgeError, Result};
use cfbridge_common::utils::host::host_name;
use cfbridge_common::utils::poll::{poll_until, PollOutcome, PollPolicy};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ENV_BUCKET_NAME: &str = "BUCKET_NAME";
const ENV_ENDPOINT: &str = "ENDPOINT";
const ENV_REGION: &str = "AWS_REGION";
const ENV_DISPLAY_CAPACITY: &str = "DISPLAY_CAPACITY";
const ENV_PASSPHRASE: &str = "CLOUDFUSE_SECURE_CONFIG_PASSPHRASE";
const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

/// S3 access key pair
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Bucket parameters baked into the generated config
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BucketParams {
    pub region: String,
    pub endpoint: String,
    /// Empty lets the tool pick the first bucket the credentials can see
    pub bucket_name: String,
    /// Capacity reported to the OS, in megabytes
    pub capacity_mb: u64,
}

/// Drives the `cloudfuse` executable for a single [`MountTarget`].
///
/// Operations that change mount state take `&mut self`; share a manager
/// between threads behind a mutex.
pub struct CloudfuseManager<R: ProcessRunner = SystemRunner> {
    runner: R,
    tool: ToolConfig,
    target: MountTarget,
    template: String,
    probe: Arc<dyn MountProbe>,
    poll: PollPolicy,
    config_ready: bool,
}

impl CloudfuseManager<SystemRunner> {
    /// Manager that launches real processes and checks the real filesystem
    pub fn new(config: &BridgeConfig) -> Self {
        Self::with_runner(config, SystemRunner)
    }
}

impl<R: ProcessRunner> CloudfuseManager<R> {
    pub fn with_runner(config: &BridgeConfig, runner: R) -> Self {
        Self {
            runner,
            tool: config.tool.clone(),
            target: config.target.clone(),
            template: template::render(&host_name()),
            probe: Arc::new(FsProbe),
            poll: PollPolicy::from(&config.poll),
            config_ready: false,
        }
    }

    /// Replace the mount visibility check
    pub fn with_probe<P: MountProbe + 'static>(mut self, probe: P) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn mount_dir(&self) -> &Path {
        &self.target.mount_dir
    }

    pub fn file_cache_dir(&self) -> &Path {
        &self.target.file_cache_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.target.config_file
    }

    pub fn template_file(&self) -> &Path {
        &self.target.template_file
    }

    pub fn target(&self) -> &MountTarget {
        &self.target
    }

    /// Whether the last `gen_config` on this manager succeeded
    pub fn config_ready(&self) -> bool {
        self.config_ready
    }

    /// Run `cloudfuse version`. A tool that cannot be launched is not installed.
    pub fn is_installed(&self) -> bool {
        match self.run(vec!["version".to_string()], self.base_env()) {
            Ok(result) => {
                if !result.success() {
                    debug!("cloudfuse version exited with {}", result.exit_code);
                }
                result.success()
            }
            Err(e) => {
                debug!("cloudfuse is not available: {}", e);
                false
            }
        }
    }

    /// Refresh the template if needed and run `cloudfuse gen-config`.
    ///
    /// Must be re-run whenever the bucket parameters or the passphrase change.
    pub fn gen_config(&mut self, params: &BucketParams, passphrase: &str) -> Result<ProcessResult> {
        self.config_ready = false;
        template::ensure(&self.target.template_file, &self.template)?;

        let args = vec![
            "gen-config".to_string(),
            format!("--config-file={}", self.target.template_file.display()),
            format!("--output-file={}", self.target.config_file.display()),
            format!("--temp-path={}", self.target.file_cache_dir.display()),
        ];
        let capacity = params.capacity_mb.to_string();
        let env = self.env_with(&[
            (ENV_BUCKET_NAME, params.bucket_name.as_str()),
            (ENV_ENDPOINT, params.endpoint.as_str()),
            (ENV_REGION, params.region.as_str()),
            (ENV_DISPLAY_CAPACITY, capacity.as_str()),
            (ENV_PASSPHRASE, passphrase),
        ]);

        let result = self.run(args, env)?;
        self.config_ready = result.success();
        if self.config_ready {
            info!("Generated {}", self.target.config_file.display());
        } else {
            warn!("gen-config exited with {}", result.exit_code);
        }
        Ok(result)
    }

    /// Run `cloudfuse mount --dry-run` against the generated config
    pub fn dry_run(&self, credentials: &Credentials, passphrase: &str) -> Result<ProcessResult> {
        self.require_config("dry run")?;
        let mut args = self.mount_args();
        args.push("--dry-run".to_string());
        self.run(args, self.secret_env(credentials, passphrase))
    }

    /// Dry run, turning a non-zero exit into a classified `BridgeError::Tool`
    pub fn validate_credentials(&self, credentials: &Credentials, passphrase: &str) -> Result<()> {
        let result = self.dry_run(credentials, passphrase)?;
        if result.success() {
            debug!("Credentials accepted by dry run");
            Ok(())
        } else {
            Err(diagnostics::tool_error(&result))
        }
    }

    /// Unmount anything left over, prepare directories and run `cloudfuse mount`.
    ///
    /// Returns once the tool returns; the mount may not be visible yet.
    pub fn mount(&mut self, credentials: &Credentials, passphrase: &str) -> Result<ProcessResult> {
        self.require_config("mount")?;

        // Always reset; a crashed mount is invisible to both exists() and is_mounted()
        let reset = self.unmount()?;
        if !reset.success() {
            debug!(
                "Unmount before mount exited with {}: {}",
                reset.exit_code,
                reset.output.trim()
            );
        }
        self.prepare_directories()?;

        info!("Mounting {}", self.target.mount_dir.display());
        self.run(self.mount_args(), self.secret_env(credentials, passphrase))
    }

    /// `mount`, then wait for the mount point to show up
    pub fn mount_and_wait(&mut self, credentials: &Credentials, passphrase: &str) -> Result<()> {
        let result = self.mount(credentials, passphrase)?;
        if !result.success() {
            return Err(diagnostics::tool_error(&result));
        }
        self.wait_for_mount()
    }

    /// Run `cloudfuse unmount <dir> -z`
    pub fn unmount(&mut self) -> Result<ProcessResult> {
        let args = vec![
            "unmount".to_string(),
            self.target.mount_dir.display().to_string(),
            "-z".to_string(),
        ];
        let result = self.run(args, self.base_env())?;
        if result.success() {
            info!("Unmounted {}", self.target.mount_dir.display());
        }
        Ok(result)
    }

    pub fn is_mounted(&self) -> bool {
        self.probe.is_mounted(&self.target.mount_dir)
    }

    /// The mount point is held by a mount whose daemon is gone
    pub fn is_stale(&self) -> bool {
        self.probe.is_stale(&self.target.mount_dir)
    }

    /// Poll until the mount point is visible
    pub fn wait_for_mount(&self) -> Result<()> {
        match poll_until(self.poll, || self.is_mounted()) {
            PollOutcome::Success { checks } => {
                info!("{} mounted after {} checks", self.target.mount_dir.display(), checks);
                Ok(())
            }
            PollOutcome::Timeout { checks } => Err(BridgeError::Timeout(format!(
                "{} did not appear after {} checks",
                self.target.mount_dir.display(),
                checks
            ))),
        }
    }

    /// Poll until the mount point is gone
    pub fn wait_for_unmount(&self) -> Result<()> {
        match poll_until(self.poll, || !self.is_mounted()) {
            PollOutcome::Success { .. } => Ok(()),
            PollOutcome::Timeout { checks } => Err(BridgeError::Timeout(format!(
                "{} still mounted after {} checks",
                self.target.mount_dir.display(),
                checks
            ))),
        }
    }

    /// Create the mount and cache directories and open their permissions
    pub fn prepare_directories(&self) -> Result<()> {
        prepare_mount_dir(&self.target.mount_dir)?;

        if !self.target.file_cache_dir.exists() {
            fs::create_dir_all(&self.target.file_cache_dir).map_err(|e| {
                BridgeError::filesystem(
                    format!(
                        "Failed to create file cache directory {}",
                        self.target.file_cache_dir.display()
                    ),
                    e,
                )
            })?;
        }
        open_permissions(&self.target.file_cache_dir)
    }

    fn require_config(&self, operation: &str) -> Result<()> {
        if self.config_ready {
            Ok(())
        } else {
            Err(BridgeError::Configuration(format!(
                "Cannot {} before a config file was generated successfully",
                operation
            )))
        }
    }

    fn mount_args(&self) -> Vec<String> {
        vec![
            "mount".to_string(),
            self.target.mount_dir.display().to_string(),
            format!("--config-file={}", self.target.config_file.display()),
        ]
    }

    fn secret_env(&self, credentials: &Credentials, passphrase: &str) -> Environment {
        self.env_with(&[
            (ENV_ACCESS_KEY_ID, credentials.access_key_id.as_str()),
            (ENV_SECRET_ACCESS_KEY, credentials.secret_access_key.as_str()),
            (ENV_PASSPHRASE, passphrase),
        ])
    }

    fn base_env(&self) -> Environment {
        self.env_with(&[])
    }

    fn env_with(&self, vars: &[(&str, &str)]) -> Environment {
        let mut env: BTreeMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        if let Some(path) = &self.tool.search_path {
            env.insert("PATH".to_string(), path.clone());
        }

        match self.tool.env_mode {
            EnvMode::Replace => Environment::Replace(env),
            EnvMode::Overlay if env.is_empty() => Environment::Inherit,
            EnvMode::Overlay => Environment::Overlay(env),
        }
    }

    fn run(&self, args: Vec<String>, env: Environment) -> Result<ProcessResult> {
        self.runner.spawn(&self.tool.executable, &args, &env)
    }
}

impl<R: ProcessRunner> fmt::Debug for CloudfuseManager<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudfuseManager")
            .field("executable", &self.tool.executable)
            .field("target", &self.target)
            .field("poll", &self.poll)
            .field("config_ready", &self.config_ready)
            .finish()
    }
}

// The tool creates the drive itself on Windows
#[cfg(windows)]
fn prepare_mount_dir(_mount_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(not(windows))]
fn prepare_mount_dir(mount_dir: &Path) -> Result<()> {
    if !mount_dir.exists() {
        match fs::create_dir(mount_dir) {
            Ok(()) => debug!("Created mount directory {}", mount_dir.display()),
            // A dead FUSE endpoint reports not-found yet still occupies the name
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(BridgeError::filesystem(
                    format!("Failed to create mount directory {}", mount_dir.display()),
                    e,
                ))
            }
        }
    }
    open_permissions(mount_dir)
}

#[cfg(unix)]
fn open_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permission_error = |e: io::Error| {
        BridgeError::filesystem(
            format!("Failed to set permissions on {}", path.display()),
            e,
        )
    };

    let mut permissions = fs::metadata(path).map_err(permission_error)?.permissions();
    let mode = permissions.mode();
    if mode & 0o777 != 0o777 {
        permissions.set_mode(mode | 0o777);
        fs::set_permissions(path, permissions).map_err(permission_error)?;
        debug!("Opened permissions on {}", path.display());
    }
    Ok(())
}

#[cfg(not(unix))]
fn open_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
