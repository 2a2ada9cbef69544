//! Launching external executables and capturing their output.
//!
//! A [`ProcessRunner`] spawns one child, waits for it, and hands back the
//! exit code together with everything the child wrote to stdout and stderr.
//! [`SystemRunner`] is the implementation for the platform we were built for.

use cfbridge_common::error::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as imp;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as imp;

/// Exit code and combined output of a finished child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// 0 if successful, failed otherwise
    pub exit_code: i32,
    /// Everything the child wrote to stdout and stderr
    pub output: String,
}

impl ProcessResult {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Environment handed to a child process
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Environment {
    /// Inherit the current environment unmodified
    #[default]
    Inherit,
    /// Inherit the current environment and set these variables on top
    Overlay(BTreeMap<String, String>),
    /// The child sees only these variables
    Replace(BTreeMap<String, String>),
}

impl Environment {
    /// Look up a variable explicitly set by this environment
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars().and_then(|vars| vars.get(key)).map(String::as_str)
    }

    /// Variables explicitly set by this environment
    pub fn vars(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Environment::Inherit => None,
            Environment::Overlay(vars) | Environment::Replace(vars) => Some(vars),
        }
    }

    pub(crate) fn apply(&self, cmd: &mut Command) {
        match self {
            Environment::Inherit => {}
            Environment::Overlay(vars) => {
                cmd.envs(vars);
            }
            Environment::Replace(vars) => {
                cmd.env_clear().envs(vars);
            }
        }
    }
}

// Values routinely carry credentials, so only names are printed.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Inherit => f.write_str("Inherit"),
            Environment::Overlay(vars) => f
                .debug_tuple("Overlay")
                .field(&vars.keys().collect::<Vec<_>>())
                .finish(),
            Environment::Replace(vars) => f
                .debug_tuple("Replace")
                .field(&vars.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// Capability to run an external command to completion
pub trait ProcessRunner: Send + Sync {
    /// Run `command` with `args` (not including the program name) and `env`,
    /// blocking until it exits.
    ///
    /// Returns `BridgeError::Launch` if the pipe or the process could not be
    /// created; any exit status of a process that did start is an `Ok`.
    fn spawn(&self, command: &Path, args: &[String], env: &Environment) -> Result<ProcessResult>;
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for Arc<T> {
    fn spawn(&self, command: &Path, args: &[String], env: &Environment) -> Result<ProcessResult> {
        (**self).spawn(command, args, env)
    }
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for Box<T> {
    fn spawn(&self, command: &Path, args: &[String], env: &Environment) -> Result<ProcessResult> {
        (**self).spawn(command, args, env)
    }
}

/// Runs commands as real OS processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn spawn(&self, command: &Path, args: &[String], env: &Environment) -> Result<ProcessResult> {
        // Argument values may hold paths with user names; the subcommand is enough
        debug!(
            "Spawning {} {}",
            command.display(),
            args.first().map(String::as_str).unwrap_or("")
        );

        let result = imp::spawn(command, args, env)?;

        debug!(
            "{} exited with code {} ({} bytes of output)",
            command.display(),
            result.exit_code,
            result.output.len()
        );
        Ok(result)
    }
}
