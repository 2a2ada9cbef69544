use super::{Environment, ProcessResult};
use cfbridge_common::error::{BridgeError, Result};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

pub(super) fn spawn(command: &Path, args: &[String], env: &Environment) -> Result<ProcessResult> {
    let launch_error = |source: io::Error| BridgeError::Launch {
        command: command.display().to_string(),
        source,
    };

    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    env.apply(&mut cmd);

    let mut child = cmd.spawn().map_err(launch_error)?;

    // Drain stderr on its own thread so neither pipe can fill up and stall the child
    let stderr = child.stderr.take();
    let stderr_reader = thread::spawn(move || -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        if let Some(mut stderr) = stderr {
            stderr.read_to_end(&mut buffer)?;
        }
        Ok(buffer)
    });

    let mut output = Vec::new();
    let stdout_result = match child.stdout.take() {
        Some(mut stdout) => stdout.read_to_end(&mut output).map(|_| ()),
        None => Ok(()),
    };
    let stderr_result = stderr_reader
        .join()
        .map_err(|_| BridgeError::Internal("stderr reader thread panicked".to_string()))?;

    let status = child.wait().map_err(launch_error)?;
    stdout_result.map_err(launch_error)?;
    output.extend(stderr_result.map_err(launch_error)?);

    Ok(ProcessResult {
        exit_code: status.code().unwrap_or(-1),
        output: String::from_utf8_lossy(&output).into_owned(),
    })
}
