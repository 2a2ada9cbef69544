//! Reconciles settings snapshots against the mount.
//!
//! Every new snapshot goes through [`remount_decision`]. When a remount is
//! needed the engine runs the full sequence: new passphrase, unmount,
//! directories, install check, config generation, credential dry run, mount
//! and wait. Dropping the engine unmounts.

use crate::session::Session;
use crate::settings::{remount_decision, Decision, Settings};
use crate::status::StatusReport;
use cfbridge_common::config::{BridgeConfig, BucketDefaults};
use cfbridge_common::error::{BridgeError, Result};
use cfbridge_mount::{CloudfuseManager, ProcessRunner, SystemRunner};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct Engine<R: ProcessRunner = SystemRunner> {
    id: Uuid,
    manager: CloudfuseManager<R>,
    defaults: BucketDefaults,
    shut_down: bool,
}

impl Engine<SystemRunner> {
    pub fn new(config: &BridgeConfig) -> Self {
        Self::with_manager(CloudfuseManager::new(config), config.bucket.clone())
    }
}

impl<R: ProcessRunner> Engine<R> {
    pub fn with_manager(manager: CloudfuseManager<R>, defaults: BucketDefaults) -> Self {
        let id = Uuid::new_v4();
        info!("[{}] Engine created for {}", id, manager.mount_dir().display());
        Self {
            id,
            manager,
            defaults,
            shut_down: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn manager(&self) -> &CloudfuseManager<R> {
        &self.manager
    }

    pub fn defaults(&self) -> &BucketDefaults {
        &self.defaults
    }

    /// Bring the mount in line with `settings` and report the outcome
    pub fn reconcile(&mut self, session: &mut Session, mut settings: Settings) -> StatusReport {
        settings.normalize(&self.defaults);

        let mounted = self.manager.is_mounted();
        let decision = remount_decision(session.previous(), &settings, mounted, &self.defaults);
        session.record(settings.clone());

        match decision {
            Decision::Remount(reason) => {
                info!("[{}] Remounting: {}", self.id, reason);
                match self.connect(session, &settings) {
                    Ok(()) => {
                        info!("[{}] Cloud storage connected", self.id);
                        StatusReport::connected()
                    }
                    Err(e) => {
                        if e.is_invalid_params() {
                            warn!("[{}] Mount aborted, check the settings: {}", self.id, e);
                        } else if e.is_retryable() {
                            warn!("[{}] Mount not visible yet, will retry: {}", self.id, e);
                        } else {
                            error!("[{}] Mount failed: {}", self.id, e);
                        }
                        StatusReport::failed(&e)
                    }
                }
            }
            Decision::Keep => {
                debug!("[{}] Settings have not changed", self.id);
                StatusReport::from_mounted(self.manager.is_mounted())
            }
            Decision::Ignore => {
                info!("[{}] Settings are empty, ignoring", self.id);
                StatusReport::from_mounted(self.manager.is_mounted())
            }
        }
    }

    /// Run the full mount sequence for `settings`
    pub fn connect(&mut self, session: &mut Session, settings: &Settings) -> Result<()> {
        let passphrase = session.rotate_passphrase()?.to_string();

        if self.manager.is_mounted() || self.manager.is_stale() {
            info!("[{}] Bucket is mounted, unmounting", self.id);
            let result = self.manager.unmount()?;
            if !result.success() {
                return Err(BridgeError::Internal(format!(
                    "Failed to unmount: {}",
                    result.output.trim()
                )));
            }
            self.manager.wait_for_unmount()?;
        }

        self.manager.prepare_directories()?;

        if !self.manager.is_installed() {
            return Err(BridgeError::NotInstalled(
                "cloudfuse is not installed".to_string(),
            ));
        }

        let params = settings.bucket_params(&self.defaults);
        let result = self.manager.gen_config(&params, &passphrase)?;
        if !result.success() {
            return Err(BridgeError::Internal(format!(
                "Unable to generate config file with error: {}",
                result.output.trim()
            )));
        }

        debug!("[{}] Checking cloud credentials", self.id);
        let credentials = settings.credentials();
        self.manager.validate_credentials(&credentials, &passphrase)?;

        info!("[{}] Starting cloud storage mount", self.id);
        self.manager.mount_and_wait(&credentials, &passphrase)
    }

    /// Best-effort unmount. Only the first call does anything.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        info!("[{}] Shutting down, unmounting cloudfuse", self.id);
        match self.manager.unmount() {
            Ok(result) if result.success() => {}
            Ok(result) => warn!(
                "[{}] Failed to unmount cloudfuse with error: {}",
                self.id,
                result.output.trim()
            ),
            Err(e) => warn!("[{}] Failed to unmount cloudfuse: {}", self.id, e),
        }
    }

    /// Give up the engine and leave the mount in place
    pub fn detach(mut self) {
        self.shut_down = true;
        debug!("[{}] Detached, mount left in place", self.id);
    }
}

impl<R: ProcessRunner> Drop for Engine<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
