use super::{Environment, ProcessResult};
use cfbridge_common::error::{BridgeError, Result};
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

/// Create a pipe whose two ends are closed across exec
fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [0; 2];
    // SAFETY: `fds` is a valid buffer for two descriptors
    if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: pipe() succeeded, so both descriptors are open and owned by nobody else
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    set_cloexec(&read)?;
    set_cloexec(&write)?;
    Ok((read, write))
}

fn set_cloexec(fd: &OwnedFd) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: `raw` is a descriptor we own for the duration of the call
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFD) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above
    if unsafe { libc::fcntl(raw, libc::F_SETFD, flags | libc::FD_CLOEXEC) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Exit status as a single integer; signals map to 128 + signo
fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

pub(super) fn spawn(command: &Path, args: &[String], env: &Environment) -> Result<ProcessResult> {
    let launch_error = |source: io::Error| BridgeError::Launch {
        command: command.display().to_string(),
        source,
    };

    // stdout and stderr share one pipe so the capture keeps emission order
    let (reader, writer) = pipe().map_err(launch_error)?;
    let stderr_writer = writer.try_clone().map_err(launch_error)?;

    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(writer))
        .stderr(Stdio::from(stderr_writer));
    env.apply(&mut cmd);

    let spawned = cmd.spawn();
    // The Command still holds our copies of the write end; without dropping
    // them the read below never sees EOF.
    drop(cmd);
    let mut child = spawned.map_err(launch_error)?;

    let mut output = Vec::new();
    let read_result = File::from(reader).read_to_end(&mut output);

    // Reap the child even if reading failed
    let status = child.wait().map_err(launch_error)?;
    read_result.map_err(launch_error)?;

    Ok(ProcessResult {
        exit_code: exit_code(status),
        output: String::from_utf8_lossy(&output).into_owned(),
    })
}
