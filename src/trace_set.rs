//! Tracer event sets for `-e trace=` expressions
//!
//! Supports the three sets reduct knows how to consume:
//! - `trace=file`: every file-related syscall (broadest, catches loader probing)
//! - `trace=open,execve`: opens and execs only
//! - `trace=open,execve,access`: as above plus `access` probes

use serde::Deserialize;
use std::fmt;

use crate::error::{ReductError, Result};

/// Which syscalls the tracer is asked to log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum TraceSet {
    /// strace's `file` class
    #[default]
    File,
    /// `open,execve`
    OpenExec,
    /// `open,execve,access`
    OpenExecAccess,
}

impl TraceSet {
    /// Parse a filter expression like "trace=file" or "trace=open,execve"
    pub fn from_expr(expr: &str) -> Result<Self> {
        match expr.strip_prefix("trace=") {
            Some(spec) => Self::from_spec(spec),
            None => Err(ReductError::InvalidTraceExpr(expr.to_string())),
        }
    }

    /// Parse a trace specification (the part after "trace=")
    ///
    /// Syscall order does not matter and `%file` is accepted as an alias of
    /// `file`, matching strace's own syntax.
    pub fn from_spec(spec: &str) -> Result<Self> {
        let mut names: Vec<&str> = spec
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        names.sort_unstable();
        names.dedup();

        match names.as_slice() {
            ["%file"] | ["file"] => Ok(Self::File),
            ["execve", "open"] => Ok(Self::OpenExec),
            ["access", "execve", "open"] => Ok(Self::OpenExecAccess),
            _ => Err(ReductError::InvalidTraceExpr(format!("trace={}", spec))),
        }
    }

    /// The set as passed to the tracer after `trace=`
    pub fn as_spec(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::OpenExec => "open,execve",
            Self::OpenExecAccess => "open,execve,access",
        }
    }

    /// The full `-e` argument, e.g. `trace=file`
    pub fn as_expr(&self) -> String {
        format!("trace={}", self.as_spec())
    }

    /// Check if a logged syscall belongs to this set
    ///
    /// The `file` class admits any syscall: whatever the tracer logged with a
    /// path argument is a file access. The narrow sets only admit their own
    /// names, which matters when replaying a log captured with a broader set.
    pub fn admits(&self, syscall_name: &str) -> bool {
        match self {
            Self::File => true,
            Self::OpenExec => matches!(syscall_name, "open" | "execve"),
            Self::OpenExecAccess => matches!(syscall_name, "open" | "execve" | "access"),
        }
    }
}

impl fmt::Display for TraceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_spec())
    }
}

impl TryFrom<String> for TraceSet {
    type Error = ReductError;

    fn try_from(value: String) -> Result<Self> {
        match value.strip_prefix("trace=") {
            Some(spec) => Self::from_spec(spec),
            None => Self::from_spec(&value),
        }
    }
}
