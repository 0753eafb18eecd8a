// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Scratch directory and bounded process execution for one oracle call.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};
use tempfile::TempDir;

use super::{BackendError, OracleInput};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Captured result of a finished tool run.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

#[derive(Debug)]
pub enum ToolOutcome {
    Finished(ToolOutput),
    TimedOut,
}

/// Owns the scratch files of one oracle invocation. The directory is removed
/// on drop; [`EncoderSession::close`] surfaces removal failures.
#[derive(Debug)]
pub struct EncoderSession {
    dir: TempDir,
    timeout: Duration,
}

impl EncoderSession {
    pub fn open(timeout: Duration) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("plan9enc-").tempdir()?;
        trace!("opened encoder session in {}", dir.path().display());
        Ok(Self { dir, timeout })
    }

    /// Runs `body` inside a fresh session and releases it afterwards. Cleanup
    /// errors are reported only when `body` succeeded.
    pub fn scoped<T>(
        timeout: Duration,
        body: impl FnOnce(&EncoderSession) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let session = Self::open(timeout)
            .map_err(|err| BackendError::resource("failed to create encoder work directory", err))?;
        let value = body(&session)?;
        session
            .close()
            .map_err(|err| BackendError::resource("failed to remove encoder work directory", err))?;
        Ok(value)
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn work_file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_work_file(&self, name: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.work_file(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Runs `command` with output captured to files in the session directory,
    /// killing it once the session timeout expires.
    pub fn run(&self, mut command: Command) -> io::Result<ToolOutcome> {
        let stdout_path = self.work_file("tool.stdout");
        let stderr_path = self.work_file("tool.stderr");
        command
            .stdin(Stdio::null())
            .stdout(File::create(&stdout_path)?)
            .stderr(File::create(&stderr_path)?);

        let mut child = command.spawn()?;
        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                if let Err(err) = child.kill() {
                    debug!("failed to kill timed-out process {}: {err}", child.id());
                }
                if let Err(err) = child.wait() {
                    debug!("failed to reap timed-out process {}: {err}", child.id());
                }
                return Ok(ToolOutcome::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(ToolOutcome::Finished(ToolOutput {
            status,
            stdout: read_lossy(&stdout_path)?,
            stderr: read_lossy(&stderr_path)?,
        }))
    }

    /// Runs an assembler and maps the launch failures every backend shares:
    /// a missing program, a timeout and a silent non-zero exit.
    pub fn invoke(
        &self,
        backend: &'static str,
        program: &str,
        command: Command,
        blamed: &OracleInput,
    ) -> Result<ToolOutput, BackendError> {
        debug!("{backend}: running '{program}' in {}", self.dir().display());
        let outcome = match self.run(command) {
            Ok(outcome) => outcome,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(BackendError::Unavailable {
                    backend,
                    detail: format!("'{program}' not found"),
                })
            }
            Err(err) => {
                return Err(BackendError::resource(
                    format!("failed to run '{program}'"),
                    err,
                ))
            }
        };
        let output = match outcome {
            ToolOutcome::Finished(output) => output,
            ToolOutcome::TimedOut => {
                return Err(BackendError::rejected(
                    backend,
                    blamed,
                    format!(
                        "'{program}' did not finish within {} ms",
                        self.timeout.as_millis()
                    ),
                ))
            }
        };
        if !output.success() && output.combined().trim().is_empty() {
            return Err(BackendError::Unavailable {
                backend,
                detail: format!("'{program}' exited with {} and printed nothing", output.status),
            });
        }
        Ok(output)
    }

    pub fn close(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        trace!("closed encoder session in {}", path.display());
        Ok(())
    }
}

fn read_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
