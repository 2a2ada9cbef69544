//! The versioned YAML template `cloudfuse gen-config` expands into the real
//! mount configuration.
//!
//! Placeholders of the form `{ NAME }` are filled in by the tool from its
//! environment; `{ 0 }` is the `--temp-path` argument.

use cfbridge_common::error::{BridgeError, Result};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// First line of every template we write. Bump when the body changes.
pub const TEMPLATE_VERSION: &str = "template-version: 0.5";

#[cfg(not(windows))]
const PLATFORM_OPTIONS: &str = "nonempty: true\n";
#[cfg(windows)]
const PLATFORM_OPTIONS: &str = "";

/// Render the template body for this host
pub fn render(host_name: &str) -> String {
    format!(
        r#"{version}
allow-other: true
{platform}
logging:
  type: base
  max-file-size-mb: 32

components:
- libfuse
- file_cache
- attr_cache
- s3storage

libfuse:
  attribute-expiration-sec: 1800
  entry-expiration-sec: 1800
  negative-entry-expiration-sec: 1800
  ignore-open-flags: true
  network-share: true
  display-capacity-mb: {{ DISPLAY_CAPACITY }}

file_cache:
  path: {{ 0 }}
  timeout-sec: 180
  allow-non-empty-temp: true
  cleanup-on-start: false

attr_cache:
  timeout-sec: 3600

s3storage:
  bucket-name: {{ BUCKET_NAME }}
  endpoint: {{ ENDPOINT }}
  region: {{ AWS_REGION }}
  subdirectory: {host}
"#,
        version = TEMPLATE_VERSION,
        platform = PLATFORM_OPTIONS,
        host = host_name,
    )
}

/// True if the file at `path` starts with exactly `version` on its first line
pub fn is_current(path: &Path, version: &str) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    let mut first_line = String::new();
    match BufReader::new(file).read_line(&mut first_line) {
        Ok(0) | Err(_) => false,
        Ok(_) => first_line.trim_end_matches(['\r', '\n']) == version,
    }
}

/// Make sure the template at `path` carries `contents`' version.
///
/// An outdated, unreadable or missing template is overwritten in full.
/// Returns whether the file was written.
pub fn ensure(path: &Path, contents: &str) -> Result<bool> {
    let version = contents.lines().next().unwrap_or_default();
    if is_current(path, version) {
        debug!("Config template {} is current", path.display());
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BridgeError::filesystem(
                format!("Failed to create template directory {}", parent.display()),
                e,
            )
        })?;
    }
    fs::write(path, contents).map_err(|e| {
        BridgeError::filesystem(
            format!("Failed to overwrite invalid template file {}", path.display()),
            e,
        )
    })?;

    info!("Wrote config template {} ({})", path.display(), version);
    Ok(true)
}
