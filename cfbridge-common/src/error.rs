use std::fmt;
use thiserror::Error;

/// Coarse classification of a failed `cloudfuse` invocation.
///
/// The tool embeds a short tag such as `[Bucket Error]` in its free-text
/// output; the mount crate maps that text onto one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolErrorKind {
    /// Bucket could not be reached or authenticated against
    Bucket,
    /// Credentials are wrong or the endpoint does not match them
    CredentialOrEndpoint,
    /// Endpoint URL is invalid or unreachable
    Endpoint,
    /// Secret access key was rejected
    Secret,
    /// Output carried no known tag
    Unknown,
}

impl ToolErrorKind {
    /// The tag the tool prints for this kind, if any
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            ToolErrorKind::Bucket => Some("Bucket Error"),
            ToolErrorKind::CredentialOrEndpoint => Some("Credential or Endpoint Error"),
            ToolErrorKind::Endpoint => Some("Endpoint Error"),
            ToolErrorKind::Secret => Some("Secret Error"),
            ToolErrorKind::Unknown => None,
        }
    }

    /// Human readable description shown to the user
    pub fn description(&self) -> &'static str {
        match self {
            ToolErrorKind::Bucket => "Unable to authenticate with bucket",
            ToolErrorKind::CredentialOrEndpoint => {
                "Error with cloud credentials or incorrect endpoint"
            }
            ToolErrorKind::Endpoint => "Error with provided endpoint",
            ToolErrorKind::Secret => "Secret key provided is incorrect",
            ToolErrorKind::Unknown => "Unable to validate credentials with error",
        }
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Main error type for cloudfuse-bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind}: {output}")]
    Tool {
        kind: ToolErrorKind,
        exit_code: i32,
        output: String,
    },

    #[error("{message}: {source}")]
    FileSystem {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Not installed: {0}")]
    NotInstalled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Build a filesystem error with context
    pub fn filesystem(message: impl Into<String>, source: std::io::Error) -> Self {
        BridgeError::FileSystem {
            message: message.into(),
            source,
        }
    }

    /// Check if error is retryable
    ///
    /// Only a mount that never became visible is worth retrying on the next
    /// settings cycle; launch failures and rejected credentials will fail the
    /// same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::Timeout(_))
    }

    /// Check if the error was caused by user supplied parameters
    pub fn is_invalid_params(&self) -> bool {
        matches!(
            self,
            BridgeError::Tool { kind, .. } if *kind != ToolErrorKind::Unknown
        )
    }

    /// Exit code of the external tool, when the tool actually ran
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            BridgeError::Tool { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

/// Result type alias for cloudfuse-bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
