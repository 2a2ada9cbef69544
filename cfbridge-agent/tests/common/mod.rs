#![allow(dead_code)]

use cfbridge_agent::{Engine, Settings};
use cfbridge_common::config::{BridgeConfig, BucketDefaults, EnvMode, MountTarget, DEFAULT_ENDPOINT};
use cfbridge_common::error::Result;
use cfbridge_common::utils::poll::PollPolicy;
use cfbridge_mount::{CloudfuseManager, Environment, MountProbe, ProcessResult, ProcessRunner};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Runner standing in for the cloudfuse executable.
///
/// Answers each step (`version`, `gen-config`, `dry-run`, `mount`,
/// `unmount`) from a script and keeps a mounted flag in sync.
#[derive(Clone, Default)]
pub struct FakeCloudfuse {
    responses: Arc<Mutex<HashMap<String, ProcessResult>>>,
    calls: Arc<Mutex<Vec<(Vec<String>, Environment)>>>,
    mounted: Arc<AtomicBool>,
    stale: Arc<AtomicBool>,
}

impl FakeCloudfuse {
    pub fn respond(&self, step: &str, exit_code: i32, output: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(step.to_string(), ProcessResult::new(exit_code, output));
    }

    pub fn steps(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(args, _)| step_of(args))
            .collect()
    }

    pub fn calls(&self) -> Vec<(Vec<String>, Environment)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub fn set_mounted(&self, mounted: bool) {
        self.mounted.store(mounted, Ordering::SeqCst);
    }

    /// Leave a dead mount behind, as after a crash of the cloudfuse daemon
    pub fn set_stale(&self) {
        self.set_mounted(false);
        self.stale.store(true, Ordering::SeqCst);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    pub fn probe(&self) -> FakeProbe {
        FakeProbe {
            mounted: self.mounted.clone(),
            stale: self.stale.clone(),
        }
    }
}

fn step_of(args: &[String]) -> String {
    match args.first().map(String::as_str) {
        Some("mount") if args.iter().any(|a| a == "--dry-run") => "dry-run".to_string(),
        Some(subcommand) => subcommand.to_string(),
        None => String::new(),
    }
}

impl ProcessRunner for FakeCloudfuse {
    fn spawn(&self, _command: &Path, args: &[String], env: &Environment) -> Result<ProcessResult> {
        let step = step_of(args);
        self.calls.lock().unwrap().push((args.to_vec(), env.clone()));

        let result = self
            .responses
            .lock()
            .unwrap()
            .get(&step)
            .cloned()
            .unwrap_or_else(|| ProcessResult::new(0, ""));

        if result.success() {
            match step.as_str() {
                "mount" => self.set_mounted(true),
                "unmount" => {
                    self.set_mounted(false);
                    self.stale.store(false, Ordering::SeqCst);
                }
                _ => {}
            }
        }
        Ok(result)
    }
}

#[derive(Clone)]
pub struct FakeProbe {
    mounted: Arc<AtomicBool>,
    stale: Arc<AtomicBool>,
}

impl MountProbe for FakeProbe {
    fn is_mounted(&self, _path: &Path) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn is_stale(&self, _path: &Path) -> bool {
        self.stale.load(Ordering::SeqCst)
    }
}

/// Create a temporary directory for tests
pub fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

pub fn create_test_config(base: &Path) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.tool.executable = PathBuf::from("/usr/bin/cloudfuse");
    config.tool.env_mode = EnvMode::Replace;
    config.tool.search_path = Some("/usr/bin:/usr".to_string());
    config.target = MountTarget::under(base, base.join("cloudfuse"));
    config
}

/// Engine driving a fake cloudfuse inside `base`
pub fn create_test_engine(base: &Path) -> (Engine<FakeCloudfuse>, FakeCloudfuse) {
    let fake = FakeCloudfuse::default();
    let manager = CloudfuseManager::with_runner(&create_test_config(base), fake.clone())
        .with_probe(fake.probe())
        .with_poll_policy(PollPolicy::new(Duration::from_millis(5), 3));
    (Engine::with_manager(manager, BucketDefaults::default()), fake)
}

pub fn test_settings() -> Settings {
    Settings {
        key_id: "AKIATESTKEY".to_string(),
        secret_key: "s3cr3t-value".to_string(),
        endpoint_url: DEFAULT_ENDPOINT.to_string(),
        bucket_name: "footage".to_string(),
        bucket_capacity: "2048".to_string(),
    }
}

/// Setup test environment with logging
pub fn setup_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_new("debug").unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
