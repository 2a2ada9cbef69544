//! cloudfuse-bridge agent library
//!
//! Reconciles user-entered bucket settings against a cloudfuse mount and
//! reports the connection status.

pub mod config_utils;
pub mod engine;
pub mod passphrase;
pub mod session;
pub mod settings;
pub mod status;
pub mod watch;

// Re-export commonly used types
pub use engine::Engine;
pub use session::Session;
pub use settings::{remount_decision, Decision, RemountReason, Settings};
pub use status::{set_status_banner, ConnectionStatus, StatusReport};
pub use watch::watch;
