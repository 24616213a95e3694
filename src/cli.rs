//! CLI argument parsing for reduct

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::ReductConfig;
use crate::trace_set::TraceSet;

/// Output format for the end-of-run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table on stderr (default)
    Text,
    /// JSON on stdout for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "reduct")]
#[command(version)]
#[command(
    about = "Reduce a toolchain to the bare minimum set of files a command uses",
    long_about = None
)]
pub struct Cli {
    /// Source directory containing the tool
    #[arg(long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Destination directory for the reduced tool
    #[arg(long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Dry run without modifying any files
    #[arg(long = "dry")]
    pub dry_run: bool,

    /// Tracer program to run the command under
    #[arg(long, value_name = "PROG")]
    pub tracer: Option<String>,

    /// Syscalls to trace: trace=file, trace=open,execve or trace=open,execve,access
    #[arg(short = 'e', long = "expr", value_name = "EXPR", value_parser = TraceSet::from_expr)]
    pub trace_set: Option<TraceSet>,

    /// Materialize from a previously captured tracer log instead of running a command
    #[arg(long = "from-log", value_name = "FILE", conflicts_with = "command")]
    pub from_log: Option<PathBuf>,

    /// TOML configuration file; command-line options take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Summary format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug tracing output to stderr
    #[arg(long)]
    pub debug: bool,

    /// Command to trace, passed through verbatim
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// The options given on the command line, as a configuration layer
    pub fn overrides(&self) -> ReductConfig {
        ReductConfig {
            source: self.source.clone(),
            dest: self.dest.clone(),
            dry_run: self.dry_run,
            tracer: self.tracer.clone(),
            trace_set: self.trace_set,
        }
    }
}
