//! Turning the tool's free-text failure output into typed errors.

use crate::process::ProcessResult;
use cfbridge_common::error::{BridgeError, ToolErrorKind};

// Order matters: "Credential or Endpoint Error" also contains "Endpoint Error".
const CLASSIFICATION_ORDER: [ToolErrorKind; 4] = [
    ToolErrorKind::Bucket,
    ToolErrorKind::CredentialOrEndpoint,
    ToolErrorKind::Endpoint,
    ToolErrorKind::Secret,
];

/// Map tool output onto the first known error tag it mentions
pub fn classify_tool_error(output: &str) -> ToolErrorKind {
    CLASSIFICATION_ORDER
        .into_iter()
        .find(|kind| kind.tag().is_some_and(|tag| output.contains(tag)))
        .unwrap_or(ToolErrorKind::Unknown)
}

/// The most specific part of a tool error: the text from the last `[` through
/// the last `]`. Falls back to the whole output when there is no such span.
pub fn bracketed_fragment(output: &str) -> &str {
    match (output.rfind('['), output.rfind(']')) {
        (Some(start), Some(end)) if start < end => &output[start..=end],
        _ => output,
    }
}

/// Convert a failed invocation into `BridgeError::Tool`
pub fn tool_error(result: &ProcessResult) -> BridgeError {
    BridgeError::Tool {
        kind: classify_tool_error(&result.output),
        exit_code: result.exit_code,
        output: bracketed_fragment(&result.output).trim().to_string(),
    }
}
