//! Parsing of tracer log lines into trace events
//!
//! A line looks like `12345 openat(AT_FDCWD, "/opt/tool/bin/run", O_RDONLY) = 3`.
//! Only two things are assumed about it: the second whitespace token starts
//! with the syscall name, and the first double-quoted string is the path.

use regex::Regex;
use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;
use std::sync::LazyLock;

/// First double-quoted string, honouring backslash escapes inside it
static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("quoted string pattern is valid")
});

/// One traced syscall
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Pid prefix written by `strace -f`, if the first token is numeric
    pub pid: Option<u32>,
    /// Syscall name, e.g. "openat"
    pub syscall: String,
    /// Decoded path argument, if the line has one
    pub path: Option<PathBuf>,
}

impl TraceEvent {
    /// Parse one log line
    ///
    /// Returns `None` when the line has fewer than two whitespace-delimited
    /// tokens. Callers treat that as the end of the usable trace.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let first = tokens.next()?;
        let second = tokens.next()?;

        let syscall = second
            .split_once('(')
            .map_or(second, |(name, _)| name)
            .to_string();

        let path = QUOTED
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| PathBuf::from(unescape(m.as_str())));

        Some(Self {
            pid: first.parse().ok(),
            syscall,
            path,
        })
    }
}

/// Decode strace's C-style string escapes into raw path bytes
///
/// Handles `\"`, `\\`, the usual single-letter escapes, `\xNN` hex and
/// `\NNN` octal. Unknown escapes are kept verbatim.
pub fn unescape(quoted: &str) -> OsString {
    let bytes = quoted.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 == bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let next = bytes[i + 1];
        i += 2;
        match next {
            b'"' => out.push(b'"'),
            b'\\' => out.push(b'\\'),
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'v' => out.push(0x0b),
            b'f' => out.push(0x0c),
            b'x' => {
                let digits = take_while_max(&bytes[i..], 2, |b| b.is_ascii_hexdigit());
                match u8::from_str_radix(digits, 16) {
                    Ok(value) if !digits.is_empty() => {
                        out.push(value);
                        i += digits.len();
                    }
                    _ => out.extend_from_slice(b"\\x"),
                }
            }
            b'0'..=b'7' => {
                let digits = take_while_max(&bytes[i - 1..], 3, |b| (b'0'..=b'7').contains(&b));
                // Three octal digits can exceed u8 (e.g. \777); keep those verbatim
                match u8::from_str_radix(digits, 8) {
                    Ok(value) => {
                        out.push(value);
                        i += digits.len() - 1;
                    }
                    Err(_) => {
                        out.push(b'\\');
                        out.push(next);
                    }
                }
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
    }

    OsString::from_vec(out)
}

/// Longest prefix of at most `max` bytes matching `pred`, as ASCII text
fn take_while_max(bytes: &[u8], max: usize, pred: impl Fn(u8) -> bool) -> &str {
    let len = bytes
        .iter()
        .take(max)
        .take_while(|&&b| pred(b))
        .count();
    // Only ASCII digits are ever accepted by the predicates above
    std::str::from_utf8(&bytes[..len]).unwrap_or("")
}
