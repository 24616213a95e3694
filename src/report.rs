//! End-of-run summary output
//!
//! Text goes to stderr so it never mixes with the per-file narration on
//! stdout; JSON goes to stdout for machine parsing.

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::materialize::MaterializeStats;

/// JSON summary document
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary<'a> {
    pub version: &'static str,
    pub source: String,
    pub dest: String,
    pub dry_run: bool,
    pub stats: &'a MaterializeStats,
}

/// Render the summary table shown after a run
pub fn render_text(stats: &MaterializeStats, dry_run: bool) -> String {
    let rows = [
        ("events", stats.events),
        ("without path", stats.without_path),
        ("filtered", stats.filtered),
        ("not files", stats.not_files),
        ("ignored", stats.ignored),
        ("copied", stats.copied),
        ("linked", stats.linked),
        ("dirs created", stats.dirs_created),
        ("already present", stats.already_present),
    ];

    let mut out = String::new();
    if dry_run {
        out.push_str("[dry run: nothing was modified]\n");
    }
    out.push_str("   count outcome\n");
    out.push_str("-------- ----------------\n");
    for (label, count) in rows {
        out.push_str(&format!("{:>8} {}\n", count, label));
    }
    if stats.truncated {
        out.push_str("trace ended at a truncated line\n");
    }
    out
}

pub fn render_json(summary: &JsonSummary<'_>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(summary)
}

/// Print the summary in the requested format
pub fn print_summary(format: OutputFormat, summary: &JsonSummary<'_>) {
    match format {
        OutputFormat::Text => eprint!("{}", render_text(summary.stats, summary.dry_run)),
        OutputFormat::Json => match render_json(summary) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize JSON: {}", e),
        },
    }
}
