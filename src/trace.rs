//! Trace collection by running a command under an external syscall tracer
//!
//! The tracer (strace by default) follows forks, logs the configured event set
//! into a file inside a private temporary directory, and the whole log is read
//! back once the traced command exits. The directory never outlives
//! [`collect_trace`].

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use crate::error::{ReductError, Result};
use crate::trace_set::TraceSet;

/// Name of the log file written by the tracer inside the temporary directory
pub const LOG_FILE_NAME: &str = "strace_output.log";

/// How to invoke the tracer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracerConfig {
    /// Tracer program, looked up on PATH unless it contains a slash
    pub program: String,
    /// Syscalls the tracer should log
    pub trace_set: TraceSet,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            program: "strace".to_string(),
            trace_set: TraceSet::default(),
        }
    }
}

/// Full text of a tracer log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceLog {
    text: String,
}

impl TraceLog {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Load a previously captured tracer log
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| ReductError::io("read trace log", path, e))?;
        Ok(Self::from_bytes(&bytes))
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        // strace escapes non-printable bytes, so lossy decoding only affects
        // logs that were not produced by it
        Self::from_text(String::from_utf8_lossy(bytes))
    }

    pub fn lines(&self) -> std::str::Lines<'_> {
        self.text.lines()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Arguments passed to the tracer, the traced command included
pub fn tracer_args(trace_set: TraceSet, log_file: &Path, command: &[String]) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-f".into(),
        "-e".into(),
        trace_set.as_expr().into(),
        "-o".into(),
        log_file.as_os_str().to_owned(),
    ];
    args.extend(command.iter().map(OsString::from));
    args
}

/// Run `command` under the tracer and return its log
///
/// A tracer that exits non-zero (or is killed) is reported but does not fail
/// the collection: whatever it managed to log is returned. A missing log file
/// yields an empty log.
pub fn collect_trace(command: &[String], config: &TracerConfig) -> Result<TraceLog> {
    if command.is_empty() {
        return Err(ReductError::EmptyCommand);
    }

    let tracer = which::which(&config.program).map_err(|_| ReductError::TracerNotFound {
        tracer: config.program.clone(),
    })?;

    let workdir = tempfile::Builder::new()
        .prefix("reduct-")
        .tempdir()
        .map_err(|e| ReductError::io("create temporary directory", std::env::temp_dir(), e))?;
    let log_file = workdir.path().join(LOG_FILE_NAME);
    let args = tracer_args(config.trace_set, &log_file, command);

    println!("Running: {}", render_command_line(&tracer, &args));
    tracing::debug!(tracer = %tracer.display(), log = %log_file.display(), "spawning tracer");

    let status = Command::new(&tracer)
        .args(&args)
        .status()
        .map_err(|source| ReductError::TracerSpawn {
            tracer: config.program.clone(),
            source,
        })?;

    if !status.success() {
        tracing::warn!(%status, "tracer exited unsuccessfully, using partial log");
        eprintln!(
            "[reduct: {} exited with {}, continuing with partial log]",
            config.program, status
        );
    }

    let log = read_log(&log_file)?;
    release(workdir)?;
    Ok(log)
}

fn read_log(log_file: &Path) -> Result<TraceLog> {
    match fs::read(log_file) {
        Ok(bytes) => Ok(TraceLog::from_bytes(&bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(log = %log_file.display(), "tracer produced no log");
            Ok(TraceLog::default())
        }
        Err(e) => Err(ReductError::io("read trace log", log_file, e)),
    }
}

/// Remove the temporary directory, tolerating one that is already gone
fn release(workdir: TempDir) -> Result<()> {
    let path: PathBuf = workdir.path().to_path_buf();
    match workdir.close() {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(dir = %path.display(), "temporary directory already removed");
            Ok(())
        }
        Err(e) => Err(ReductError::io("remove temporary directory", path, e)),
    }
}

fn render_command_line(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
