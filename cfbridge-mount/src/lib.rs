//! cloudfuse-bridge mount library
//!
//! Drives the external `cloudfuse` executable so an S3-compatible bucket
//! appears as a local directory:
//! - [`process`] launches the tool and captures its combined output
//! - [`manager`] knows the tool's command grammar and the mount lifecycle
//! - [`template`] maintains the versioned config template
//! - [`mount_check`] decides whether the mount is visible
//! - [`diagnostics`] classifies the tool's error output

pub mod diagnostics;
pub mod manager;
pub mod mount_check;
pub mod process;
pub mod template;

// Re-export commonly used types
pub use diagnostics::{bracketed_fragment, classify_tool_error};
pub use manager::{BucketParams, CloudfuseManager, Credentials};
pub use mount_check::{is_mount_point, is_stale_mount, FsProbe, MountProbe};
pub use process::{Environment, ProcessResult, ProcessRunner, SystemRunner};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
