//! reduct - reduce a toolchain to the files a workload actually uses
//!
//! A command is run under a syscall tracer (strace), every file access in the
//! resulting log is filtered to a source directory, and the files found there
//! are reproduced in a destination directory with the same relative layout and
//! the same relative symlink structure.

pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod materialize;
pub mod paths;
pub mod report;
pub mod trace;
pub mod trace_set;
