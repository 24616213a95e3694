// Run configuration
//
// Settings come from three layers: built-in defaults, an optional TOML file
// (`--config`), and explicit command-line options, later layers winning.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ReductError, Result};
use crate::materialize::MaterializeConfig;
use crate::paths;
use crate::trace::TracerConfig;
use crate::trace_set::TraceSet;

/// User-facing configuration, as read from a file or assembled from the CLI
///
/// # Example
/// ```
/// use reduct::config::ReductConfig;
///
/// let config = ReductConfig::from_toml_str(
///     r#"
///     source = "/opt/tool"
///     dest = "/tmp/reduced"
///     trace_set = "open,execve"
///     "#,
///     "reduct.toml",
/// )
/// .unwrap();
/// assert_eq!(config.tracer, None);
/// assert!(!config.dry_run);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReductConfig {
    /// Directory whose used files are being discovered
    pub source: Option<PathBuf>,
    /// Directory the reduced copy is written to
    pub dest: Option<PathBuf>,
    /// Decide and narrate without modifying any files
    pub dry_run: bool,
    /// Tracer program (default: strace)
    pub tracer: Option<String>,
    /// Syscalls to trace (default: file)
    pub trace_set: Option<TraceSet>,
}

/// Validated settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub materialize: MaterializeConfig,
    pub tracer: TracerConfig,
}

impl ReductConfig {
    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ReductError::io("read config", path, e))?;

        Self::from_toml_str(&content, path)
    }

    /// Parse configuration from TOML text; `origin` names it in errors
    pub fn from_toml_str(content: &str, origin: impl AsRef<Path>) -> Result<Self> {
        toml::from_str(content).map_err(|source| ReductError::Config {
            path: origin.as_ref().to_path_buf(),
            source,
        })
    }

    /// Layer `overrides` on top of `self`
    ///
    /// Options set in `overrides` win; `dry_run` is enabled if either layer
    /// enables it.
    pub fn merge(self, overrides: ReductConfig) -> Self {
        Self {
            source: overrides.source.or(self.source),
            dest: overrides.dest.or(self.dest),
            dry_run: overrides.dry_run || self.dry_run,
            tracer: overrides.tracer.or(self.tracer),
            trace_set: overrides.trace_set.or(self.trace_set),
        }
    }

    /// Check required options and normalize paths
    ///
    /// The source root must be an existing directory and is canonicalized; the
    /// destination only needs to be expressible as an absolute path.
    pub fn validate(self) -> Result<Settings> {
        let source = self.source.ok_or(ReductError::MissingOption("--source"))?;
        if !source.is_dir() {
            return Err(ReductError::SourceNotDirectory(source));
        }
        let source_root = source
            .canonicalize()
            .map_err(|e| ReductError::io("resolve", &source, e))?;

        let dest = self.dest.ok_or(ReductError::MissingOption("--dest"))?;
        let dest_root = paths::absolute(&dest).map_err(|e| ReductError::io("resolve", &dest, e))?;

        let trace_set = self.trace_set.unwrap_or_default();
        let defaults = TracerConfig::default();

        Ok(Settings {
            materialize: MaterializeConfig {
                source_root,
                dest_root,
                dry_run: self.dry_run,
                trace_set,
            },
            tracer: TracerConfig {
                program: self.tracer.unwrap_or(defaults.program),
                trace_set,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_is_default() {
        let config = ReductConfig::from_toml_str("", "empty.toml").unwrap();
        assert_eq!(config, ReductConfig::default());
    }

    #[test]
    fn test_parse_all_fields() {
        let config = ReductConfig::from_toml_str(
            r#"
            source = "/opt/tool"
            dest = "/tmp/out"
            dry_run = true
            tracer = "/usr/local/bin/strace"
            trace_set = "trace=open,execve,access"
            "#,
            "reduct.toml",
        )
        .unwrap();

        assert_eq!(config.source, Some(PathBuf::from("/opt/tool")));
        assert_eq!(config.dest, Some(PathBuf::from("/tmp/out")));
        assert!(config.dry_run);
        assert_eq!(config.tracer.as_deref(), Some("/usr/local/bin/strace"));
        assert_eq!(config.trace_set, Some(TraceSet::OpenExecAccess));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = ReductConfig::from_toml_str("sourcee = \"/opt\"", "typo.toml");
        let err = result.unwrap_err();
        assert!(matches!(err, ReductError::Config { .. }));
        assert!(err.to_string().contains("typo.toml"));
    }

    #[test]
    fn test_bad_trace_set_is_rejected() {
        let result = ReductConfig::from_toml_str("trace_set = \"network\"", "bad.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let file = ReductConfig {
            source: Some(PathBuf::from("/from/file")),
            dest: Some(PathBuf::from("/file/dest")),
            dry_run: true,
            tracer: Some("strace".to_string()),
            trace_set: Some(TraceSet::OpenExec),
        };
        let cli = ReductConfig {
            source: Some(PathBuf::from("/from/cli")),
            tracer: Some("/opt/strace".to_string()),
            ..ReductConfig::default()
        };

        let merged = file.merge(cli);
        assert_eq!(merged.source, Some(PathBuf::from("/from/cli")));
        assert_eq!(merged.dest, Some(PathBuf::from("/file/dest")));
        assert!(merged.dry_run);
        assert_eq!(merged.tracer.as_deref(), Some("/opt/strace"));
        assert_eq!(merged.trace_set, Some(TraceSet::OpenExec));
    }

    #[test]
    fn test_validate_requires_source_and_dest() {
        let missing_source = ReductConfig::default().validate();
        assert!(matches!(
            missing_source,
            Err(ReductError::MissingOption("--source"))
        ));

        let tmp = TempDir::new().unwrap();
        let missing_dest = ReductConfig {
            source: Some(tmp.path().to_path_buf()),
            ..ReductConfig::default()
        }
        .validate();
        assert!(matches!(missing_dest, Err(ReductError::MissingOption("--dest"))));
    }

    #[test]
    fn test_validate_rejects_non_directory_source() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file");
        fs::write(&file, b"").unwrap();

        let result = ReductConfig {
            source: Some(file),
            dest: Some(tmp.path().join("out")),
            ..ReductConfig::default()
        }
        .validate();
        assert!(matches!(result, Err(ReductError::SourceNotDirectory(_))));
    }

    #[test]
    fn test_validate_normalizes_paths_and_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = ReductConfig {
            source: Some(tmp.path().join("./")),
            dest: Some(tmp.path().join("out/../reduced")),
            ..ReductConfig::default()
        }
        .validate()
        .unwrap();

        let canonical = tmp.path().canonicalize().unwrap();
        assert_eq!(settings.materialize.source_root, canonical);
        assert_eq!(settings.materialize.dest_root, tmp.path().join("reduced"));
        assert!(!settings.materialize.dry_run);
        assert_eq!(settings.tracer.program, "strace");
        assert_eq!(settings.tracer.trace_set, TraceSet::File);
    }
}
