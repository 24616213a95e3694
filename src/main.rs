use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use reduct::{
    cli::Cli,
    config::ReductConfig,
    error::ReductError,
    materialize::Materializer,
    report::{self, JsonSummary},
    trace::{self, TraceLog},
};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Print usage and exit with status 1
fn usage_exit(err: &ReductError) -> ! {
    eprintln!("{}", err);
    // Usage is best-effort; the exit status is what matters
    let _ = Cli::command().print_help();
    std::process::exit(1);
}

/// Config file (if any) overlaid with the command-line options
fn load_config(args: &Cli) -> Result<ReductConfig> {
    let base = match &args.config {
        Some(path) => ReductConfig::from_file(path)?,
        None => ReductConfig::default(),
    };
    Ok(base.merge(args.overrides()))
}

/// Obtain the trace, either by running the command or from a captured log
fn obtain_trace(args: &Cli, tracer: &trace::TracerConfig) -> Result<TraceLog> {
    match (&args.from_log, args.command.is_empty()) {
        (Some(path), true) => Ok(TraceLog::from_file(path)?),
        (None, false) => {
            println!("Executing: {}", args.command.join(" "));
            Ok(trace::collect_trace(&args.command, tracer)?)
        }
        (Some(_), false) => {
            anyhow::bail!("Cannot specify both --from-log and a command. Choose one.");
        }
        (None, true) => {
            anyhow::bail!("Must specify either --from-log FILE or a command. Usage: reduct --source DIR --dest DIR -- COMMAND [ARGS...]");
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let settings = match load_config(&args)?.validate() {
        Ok(settings) => settings,
        Err(err @ (ReductError::SourceNotDirectory(_) | ReductError::MissingOption(_))) => {
            usage_exit(&err)
        }
        Err(err) => return Err(err.into()),
    };
    tracing::debug!(?settings, "validated settings");

    let log = obtain_trace(&args, &settings.tracer)?;

    let stats = Materializer::new(settings.materialize.clone())
        .run(log.lines())
        .context("Reduction aborted")?;

    report::print_summary(
        args.format,
        &JsonSummary {
            version: env!("CARGO_PKG_VERSION"),
            source: settings.materialize.source_root.display().to_string(),
            dest: settings.materialize.dest_root.display().to_string(),
            dry_run: settings.materialize.dry_run,
            stats: &stats,
        },
    );

    Ok(())
}
