#![allow(dead_code)]

use cfbridge_common::config::{BridgeConfig, EnvMode, MountTarget};
use cfbridge_common::error::{BridgeError, Result};
use cfbridge_common::utils::poll::PollPolicy;
use cfbridge_mount::{CloudfuseManager, Environment, MountProbe, ProcessResult, ProcessRunner};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// One recorded call into the runner
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: Environment,
}

impl Invocation {
    /// `version`, `gen-config`, `dry-run`, `mount` or `unmount`
    pub fn step(&self) -> &str {
        match self.args.first().map(String::as_str) {
            Some("mount") if self.args.iter().any(|a| a == "--dry-run") => "dry-run",
            Some(subcommand) => subcommand,
            None => "",
        }
    }
}

#[derive(Debug, Clone)]
enum Response {
    Exit(ProcessResult),
    LaunchFailure,
}

#[derive(Default)]
struct Script {
    responses: HashMap<String, Response>,
    invocations: Vec<Invocation>,
    mount_visible: bool,
}

/// Runner that answers from a script and flips a shared mount flag the way
/// the real tool would.
#[derive(Clone)]
pub struct ScriptedRunner {
    script: Arc<Mutex<Script>>,
    mounted: Arc<AtomicBool>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        let script = Script {
            mount_visible: true,
            ..Default::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
            mounted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Answer `step` with this exit code and output from now on
    pub fn respond(&self, step: &str, exit_code: i32, output: &str) {
        self.script.lock().unwrap().responses.insert(
            step.to_string(),
            Response::Exit(ProcessResult::new(exit_code, output)),
        );
    }

    /// Make `step` fail to launch from now on
    pub fn fail_launch(&self, step: &str) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(step.to_string(), Response::LaunchFailure);
    }

    /// Whether a successful `mount` makes the mount point visible
    pub fn set_mount_visible(&self, visible: bool) {
        self.script.lock().unwrap().mount_visible = visible;
    }

    pub fn probe(&self) -> ToggleProbe {
        ToggleProbe {
            mounted: self.mounted.clone(),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.script.lock().unwrap().invocations.clone()
    }

    pub fn steps(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(|i| i.step().to_string())
            .collect()
    }

    pub fn last(&self, step: &str) -> Option<Invocation> {
        self.invocations().into_iter().rev().find(|i| i.step() == step)
    }

    pub fn clear(&self) {
        self.script.lock().unwrap().invocations.clear();
    }
}

impl ProcessRunner for ScriptedRunner {
    fn spawn(&self, command: &Path, args: &[String], env: &Environment) -> Result<ProcessResult> {
        let invocation = Invocation {
            command: command.to_path_buf(),
            args: args.to_vec(),
            env: env.clone(),
        };
        let step = invocation.step().to_string();

        let mut script = self.script.lock().unwrap();
        script.invocations.push(invocation);

        let result = match script.responses.get(&step) {
            Some(Response::LaunchFailure) => {
                return Err(BridgeError::Launch {
                    command: command.display().to_string(),
                    source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
                })
            }
            Some(Response::Exit(result)) => result.clone(),
            None => ProcessResult::new(0, ""),
        };

        if result.success() {
            match step.as_str() {
                "mount" if script.mount_visible => self.mounted.store(true, Ordering::SeqCst),
                "unmount" => self.mounted.store(false, Ordering::SeqCst),
                _ => {}
            }
        }
        Ok(result)
    }
}

/// Probe reading the flag a [`ScriptedRunner`] maintains
#[derive(Clone)]
pub struct ToggleProbe {
    mounted: Arc<AtomicBool>,
}

impl ToggleProbe {
    pub fn set(&self, mounted: bool) {
        self.mounted.store(mounted, Ordering::SeqCst);
    }
}

impl MountProbe for ToggleProbe {
    fn is_mounted(&self, _path: &Path) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

/// Create a temporary directory for tests
pub fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Bridge configuration rooted in `base` with POSIX-style environment handling
pub fn create_test_config(base: &Path) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.tool.executable = PathBuf::from("/usr/bin/cloudfuse");
    config.tool.env_mode = EnvMode::Replace;
    config.tool.search_path = Some("/usr/bin:/usr".to_string());
    config.target = MountTarget::under(base, base.join("cloudfuse"));
    config
}

/// Poll quickly so timeouts finish in milliseconds
pub fn fast_poll() -> PollPolicy {
    PollPolicy::new(Duration::from_millis(5), 3)
}

/// Manager wired to a fresh scripted runner
pub fn create_test_manager(base: &Path) -> (CloudfuseManager<ScriptedRunner>, ScriptedRunner) {
    let runner = ScriptedRunner::new();
    let manager = CloudfuseManager::with_runner(&create_test_config(base), runner.clone())
        .with_probe(runner.probe())
        .with_poll_policy(fast_poll());
    (manager, runner)
}

/// Setup test environment with logging
pub fn setup_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_new("debug").unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
