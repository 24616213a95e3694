//! Error types for reduct
//!
//! Only the failures that abort a run live here. Expected conditions such as a
//! traced path that has since vanished, or a truncated tail in the tracer log,
//! are handled in place and never become an error.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort a reduction
#[derive(Error, Debug)]
pub enum ReductError {
    #[error("Command array is empty")]
    EmptyCommand,

    #[error("Tracer `{tracer}` not found on PATH")]
    TracerNotFound { tracer: String },

    #[error("Failed to launch tracer `{tracer}`: {source}")]
    TracerSpawn {
        tracer: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid trace expression: {0}. Expected format: trace=SET")]
    InvalidTraceExpr(String),

    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("Missing required option: {0}")]
    MissingOption(&'static str),

    #[error("Failed to parse config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Cyclic symlink chain at {}", .0.display())]
    CyclicLink(PathBuf),

    #[error("Failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ReductError {
    /// Wrap an I/O failure with the operation and path it concerned
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReductError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_message_names_action_and_path() {
        let err = ReductError::io(
            "copy",
            "/opt/tool/bin/run",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("copy"));
        assert!(msg.contains("/opt/tool/bin/run"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_cyclic_link_message() {
        let err = ReductError::CyclicLink(PathBuf::from("/opt/tool/lib/a"));
        assert_eq!(err.to_string(), "Cyclic symlink chain at /opt/tool/lib/a");
    }

    #[test]
    fn test_invalid_expr_mentions_expected_format() {
        let err = ReductError::InvalidTraceExpr("bogus".to_string());
        assert!(err.to_string().contains("trace=SET"));
    }
}
