//! Replicating traced files into the destination tree
//!
//! Every trace line is parsed into a [`TraceEvent`], its path normalized and
//! filtered to the source root, and the file is then reproduced under the
//! destination root at the same relative position. Regular files are copied
//! with their permissions and timestamps. Symlinks are recreated hop by hop as
//! relative links, each hop's target being materialized first so a copied
//! link never dangles.
//!
//! Symlink-ness is always decided on the entry itself (its directory resolved,
//! its last component untouched); root filtering is always applied to the
//! fully resolved path.

use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{ReductError, Result};
use crate::event::TraceEvent;
use crate::paths;
use crate::trace_set::TraceSet;

/// Where to read from and write to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeConfig {
    /// Canonical source directory
    pub source_root: PathBuf,
    /// Absolute destination directory, created on demand
    pub dest_root: PathBuf,
    /// Decide and narrate, but never touch the filesystem
    pub dry_run: bool,
    /// Syscalls whose events are acted upon
    pub trace_set: TraceSet,
}

/// Counters accumulated over one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeStats {
    /// Parsed trace lines
    pub events: u64,
    /// Lines without a quoted path argument
    pub without_path: u64,
    /// Events for syscalls outside the trace set
    pub filtered: u64,
    /// Paths that no longer resolve to a regular file
    pub not_files: u64,
    /// Paths resolving outside the source root
    pub ignored: u64,
    /// Regular files copied
    pub copied: u64,
    /// Symlinks created
    pub linked: u64,
    /// Destination directories created
    pub dirs_created: u64,
    /// Destination entries that already existed
    pub already_present: u64,
    /// Whether the walk stopped at a truncated line
    pub truncated: bool,
}

/// Walks a trace once and reproduces the touched files
#[derive(Debug)]
pub struct Materializer {
    config: MaterializeConfig,
    stats: MaterializeStats,
    /// Entries a dry run would have created
    planned: HashSet<PathBuf>,
}

impl Materializer {
    pub fn new(config: MaterializeConfig) -> Self {
        Self {
            config,
            stats: MaterializeStats::default(),
            planned: HashSet::new(),
        }
    }

    pub fn config(&self) -> &MaterializeConfig {
        &self.config
    }

    pub fn stats(&self) -> &MaterializeStats {
        &self.stats
    }

    /// Process every trace line in order
    ///
    /// Stops quietly at the first line with fewer than two tokens, which is
    /// how a truncated log tail looks.
    pub fn run<'a, I>(mut self, lines: I) -> Result<MaterializeStats>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let dest_root = self.config.dest_root.clone();
        self.ensure_dir(&dest_root)?;

        for line in lines {
            let Some(event) = TraceEvent::parse(line) else {
                println!("Failed on {}", line);
                self.stats.truncated = true;
                break;
            };
            self.handle_event(&event)?;
        }

        Ok(self.stats)
    }

    /// Filter one event and materialize its path if it belongs to the source root
    pub fn handle_event(&mut self, event: &TraceEvent) -> Result<()> {
        self.stats.events += 1;

        let Some(path) = &event.path else {
            self.stats.without_path += 1;
            return Ok(());
        };

        if !self.config.trace_set.admits(&event.syscall) {
            tracing::debug!(syscall = %event.syscall, "syscall outside trace set");
            self.stats.filtered += 1;
            return Ok(());
        }

        let raw = paths::traced(path).map_err(|e| ReductError::io("resolve", path, e))?;
        let Some(resolved) = paths::resolve(&raw).filter(|p| p.is_file()) else {
            tracing::debug!("{} isn't a file ({})", raw.display(), event.syscall);
            self.stats.not_files += 1;
            return Ok(());
        };

        if !paths::is_under(&resolved, &self.config.source_root) {
            println!(
                "Ignoring {} (doesn't start with {})",
                resolved.display(),
                self.config.source_root.display()
            );
            self.stats.ignored += 1;
            return Ok(());
        }

        match paths::anchor(&raw) {
            Some(entry) if self.is_source_link(&entry) => {
                let mut visited = HashSet::new();
                self.make_link(&entry, &mut visited)?;
                Ok(())
            }
            _ => self.copy_full(&resolved),
        }
    }

    fn is_source_link(&self, path: &Path) -> bool {
        paths::is_under(path, &self.config.source_root) && is_symlink(path)
    }

    /// Destination position of a path under the source root
    fn dest_path(&self, source: &Path) -> Option<PathBuf> {
        paths::relative_to(source, &self.config.source_root)
            .map(|relative| self.config.dest_root.join(relative))
    }

    /// Copy a regular file under the source root into the destination tree
    ///
    /// Sources that vanished or cannot be read are skipped. Failures on the
    /// destination side abort.
    fn copy_full(&mut self, source: &Path) -> Result<()> {
        let Some(dest) = self.dest_path(source) else {
            tracing::debug!(path = %source.display(), "not under source root");
            return Ok(());
        };

        let input = match File::open(source) {
            Ok(input) => input,
            Err(e) if is_skippable(&e) => {
                tracing::debug!(
                    path = %source.display(),
                    error = %e,
                    "source unreadable, skipping"
                );
                self.stats.not_files += 1;
                return Ok(());
            }
            Err(e) => return Err(ReductError::io("open", source, e)),
        };

        if let Some(parent) = dest.parent() {
            self.ensure_dir(parent)?;
        }

        if self.would_exist(&dest) {
            println!("Already exists: {}", dest.display());
            self.stats.already_present += 1;
            return Ok(());
        }

        println!("Copying {}", source.display());
        if self.config.dry_run {
            self.planned.insert(dest);
        } else {
            copy_with_metadata(input, source, &dest)?;
        }
        self.stats.copied += 1;
        Ok(())
    }

    /// Recreate a symlink under the source root as a relative link
    ///
    /// Returns whether the link is present (or would be, in a dry run) in the
    /// destination afterwards.
    fn make_link(&mut self, link: &Path, visited: &mut HashSet<PathBuf>) -> Result<bool> {
        if !visited.insert(link.to_path_buf()) {
            return Err(ReductError::CyclicLink(link.to_path_buf()));
        }

        let text = match fs::read_link(link) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(link = %link.display(), error = %e, "link vanished");
                self.stats.not_files += 1;
                return Ok(false);
            }
        };

        let hop = paths::next_hop(link, &text)
            .filter(|hop| paths::is_under(hop, &self.config.source_root));

        let target = match hop {
            Some(hop) if is_symlink(&hop) => {
                if !self.make_link(&hop, visited)? {
                    return Ok(false);
                }
                hop
            }
            Some(hop) if hop.is_file() => {
                self.copy_full(&hop)?;
                hop
            }
            _ => match paths::resolve(link).filter(|t| t.is_file()) {
                Some(resolved) if paths::is_under(&resolved, &self.config.source_root) => {
                    self.copy_full(&resolved)?;
                    resolved
                }
                _ => {
                    println!(
                        "Ignoring {} (link target doesn't start with {})",
                        link.display(),
                        self.config.source_root.display()
                    );
                    self.stats.ignored += 1;
                    return Ok(false);
                }
            },
        };

        let Some(dest_link) = self.dest_path(link) else {
            return Ok(false);
        };
        if let Some(parent) = dest_link.parent() {
            self.ensure_dir(parent)?;
        }

        if self.would_exist(&dest_link) {
            println!("Already exists: {}", dest_link.display());
            self.stats.already_present += 1;
            return Ok(true);
        }

        let new_text = paths::link_text(link, &target);
        println!(
            "Making softlink from {} -> {}",
            dest_link.display(),
            new_text.display()
        );
        if self.config.dry_run {
            self.planned.insert(dest_link);
        } else {
            std::os::unix::fs::symlink(&new_text, &dest_link)
                .map_err(|e| ReductError::io("create symlink", &dest_link, e))?;
        }
        self.stats.linked += 1;
        Ok(true)
    }

    fn ensure_dir(&mut self, dir: &Path) -> Result<()> {
        if dir.is_dir() || self.planned.contains(dir) {
            return Ok(());
        }

        println!("Making dirs to {}", dir.display());
        if self.config.dry_run {
            for ancestor in dir.ancestors() {
                if ancestor.is_dir() {
                    break;
                }
                self.planned.insert(ancestor.to_path_buf());
            }
        } else {
            fs::create_dir_all(dir).map_err(|e| ReductError::io("create directory", dir, e))?;
        }
        self.stats.dirs_created += 1;
        Ok(())
    }

    /// Whether anything (a dangling link included) occupies `path`
    fn would_exist(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok() || self.planned.contains(path)
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

fn is_skippable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    )
}

/// Copy bytes, then timestamps, then permission bits
///
/// Everything is written to a temporary file next to `dest`, which only takes
/// the final name once complete; a failed copy never leaves a truncated file
/// that a later run would take as already present. Permissions go last so
/// read-only sources still get their times copied.
fn copy_with_metadata(mut input: File, source: &Path, dest: &Path) -> Result<()> {
    let meta = input
        .metadata()
        .map_err(|e| ReductError::io("stat", source, e))?;
    let dir = dest.parent().unwrap_or(Path::new("/"));
    let mut staged = NamedTempFile::new_in(dir)
        .map_err(|e| ReductError::io("create temporary file in", dir, e))?;

    io::copy(&mut input, &mut staged).map_err(|e| ReductError::io("copy", source, e))?;

    let mut times = FileTimes::new();
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    let output = staged.as_file();
    output
        .set_times(times)
        .map_err(|e| ReductError::io("set times on", dest, e))?;
    output
        .set_permissions(meta.permissions())
        .map_err(|e| ReductError::io("set permissions on", dest, e))?;

    staged
        .persist_noclobber(dest)
        .map_err(|e| ReductError::io("create", dest, e.error))?;
    Ok(())
}
