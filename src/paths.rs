//! Path normalization helpers
//!
//! Two forms of every traced path are used: the raw form (made absolute, its
//! symlinks and `..` components untouched) and the resolved form (every
//! symlink followed). Root containment is always component-wise, so `/usr/bin2` is not
//! under `/usr/bin`.

use path_clean::PathClean;
use std::env;
use std::io;
use std::path::{Path, PathBuf};

/// Make a path absolute against the current directory and clean it lexically
pub fn absolute(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    let path = path.as_ref();
    if path.is_absolute() {
        Ok(path.clean())
    } else {
        Ok(env::current_dir()?.join(path).clean())
    }
}

/// Make a traced path absolute without cleaning it
///
/// `..` is left for the kernel to interpret, since lexically it would undo a
/// directory symlink instead of climbing out of its target.
pub fn traced(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    let path = path.as_ref();
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// Resolve every symlink in an absolute path
///
/// Returns `None` when the path no longer exists or cannot be resolved,
/// which is the common case for speculative lookups in a trace.
pub fn resolve(path: &Path) -> Option<PathBuf> {
    path.canonicalize().ok()
}

/// Resolve the directory part of a path but keep its last component as is
///
/// The result names the same directory entry as `path`, so a symlink stays a
/// symlink, while its position is expressed in canonical directories that can
/// be compared against a canonical root.
pub fn anchor(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let dir = path.parent()?.canonicalize().ok()?;
    Some(dir.join(name))
}

/// Component-aware prefix check
pub fn is_under(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// The part of `path` below `root`, if `path` is under it
pub fn relative_to<'a>(path: &'a Path, root: &Path) -> Option<&'a Path> {
    path.strip_prefix(root).ok()
}

/// The directory entry a link's text names, anchored like [`anchor`]
///
/// The text is joined to the link's directory without lexical cleaning: a
/// `..` after a directory symlink climbs out of the symlink's target, and only
/// the kernel knows where that is. Text ending in `..` names a directory, which
/// is resolved outright.
pub fn next_hop(link: &Path, link_text: &Path) -> Option<PathBuf> {
    let joined = match link.parent() {
        Some(dir) => dir.join(link_text),
        None => link_text.to_path_buf(),
    };
    anchor(&joined).or_else(|| resolve(&joined))
}

/// Link text that reaches `target` from a link placed at `link`
///
/// Both paths must be absolute. Falls back to the target itself when no
/// relative form exists.
pub fn link_text(link: &Path, target: &Path) -> PathBuf {
    let base = link.parent().unwrap_or(Path::new("/"));
    pathdiff::diff_paths(target, base).unwrap_or_else(|| target.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_absolute_cleans_dot_segments() {
        let path = absolute("/opt/tool/bin/../lib/./libc.so").unwrap();
        assert_eq!(path, PathBuf::from("/opt/tool/lib/libc.so"));
    }

    #[test]
    fn test_traced_keeps_parent_components() {
        let path = traced("/opt/tool/lib/sub/../libc.so").unwrap();
        assert_eq!(path, PathBuf::from("/opt/tool/lib/sub/../libc.so"));
    }

    #[test]
    #[serial]
    fn test_absolute_joins_current_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let previous = env::current_dir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        let path = absolute("bin/run");
        env::set_current_dir(previous).unwrap();

        let expected = tmp.path().canonicalize().unwrap().join("bin/run");
        assert_eq!(path.unwrap(), expected);
    }

    #[test]
    fn test_is_under_is_component_aware() {
        let root = Path::new("/usr/bin");
        assert!(is_under(Path::new("/usr/bin/ls"), root));
        assert!(is_under(Path::new("/usr/bin"), root));
        assert!(!is_under(Path::new("/usr/bin2/ls"), root));
        assert!(!is_under(Path::new("/usr"), root));
    }

    #[test]
    fn test_relative_to() {
        let root = Path::new("/opt/tool");
        assert_eq!(
            relative_to(Path::new("/opt/tool/bin/run"), root),
            Some(Path::new("bin/run"))
        );
        assert_eq!(relative_to(Path::new("/opt/tool2/bin/run"), root), None);
    }

    #[test]
    fn test_next_hop_relative_and_absolute_targets() {
        let tmp = tempfile::TempDir::new().unwrap();
        let base = tmp.path().canonicalize().unwrap();
        std::fs::create_dir_all(base.join("tool/lib")).unwrap();
        std::fs::create_dir_all(base.join("tool/lib64")).unwrap();
        let link = base.join("tool/lib/libfoo.so");

        assert_eq!(
            next_hop(&link, Path::new("libfoo.so.1")),
            Some(base.join("tool/lib/libfoo.so.1"))
        );
        assert_eq!(
            next_hop(&link, Path::new("../lib64/libfoo.so.1")),
            Some(base.join("tool/lib64/libfoo.so.1"))
        );
        assert_eq!(
            next_hop(&link, &base.join("other/libfoo.so")),
            None,
            "a missing directory cannot be anchored"
        );
    }

    #[test]
    fn test_next_hop_climbs_out_of_directory_symlink() {
        let tmp = tempfile::TempDir::new().unwrap();
        let base = tmp.path().canonicalize().unwrap();
        std::fs::create_dir_all(base.join("lib")).unwrap();
        std::fs::create_dir_all(base.join("other/deep")).unwrap();
        std::os::unix::fs::symlink("../other/deep", base.join("lib/sub")).unwrap();

        let link = base.join("lib/L");
        assert_eq!(
            next_hop(&link, Path::new("sub/../x")),
            Some(base.join("other/x"))
        );
        assert_eq!(next_hop(&link, Path::new("sub/..")), Some(base.join("other")));
    }

    #[test]
    fn test_link_text_same_directory() {
        assert_eq!(
            link_text(Path::new("/d/lib/libfoo.so"), Path::new("/d/lib/libfoo.so.1")),
            PathBuf::from("libfoo.so.1")
        );
    }

    #[test]
    fn test_link_text_other_directory() {
        assert_eq!(
            link_text(Path::new("/d/bin/cc"), Path::new("/d/libexec/gcc/cc1")),
            PathBuf::from("../libexec/gcc/cc1")
        );
    }

    #[test]
    fn test_anchor_keeps_symlink_entry() {
        let tmp = tempfile::TempDir::new().unwrap();
        let base = tmp.path().canonicalize().unwrap();
        std::fs::create_dir(base.join("lib64")).unwrap();
        std::os::unix::fs::symlink("lib64", base.join("lib")).unwrap();
        std::fs::write(base.join("lib64/libc.so.6"), b"").unwrap();
        std::os::unix::fs::symlink("libc.so.6", base.join("lib64/libc.so")).unwrap();

        let anchored = anchor(&base.join("lib/libc.so")).unwrap();
        assert_eq!(anchored, base.join("lib64/libc.so"));
        assert!(std::fs::symlink_metadata(&anchored)
            .unwrap()
            .file_type()
            .is_symlink());
        assert_eq!(resolve(&anchored), Some(base.join("lib64/libc.so.6")));
    }

    #[test]
    fn test_anchor_of_root_is_none() {
        assert!(anchor(Path::new("/")).is_none());
    }

    #[test]
    fn test_resolve_missing_path() {
        assert!(resolve(Path::new("/definitely/not/here/reduct")).is_none());
    }
}
