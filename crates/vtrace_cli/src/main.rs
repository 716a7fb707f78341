//! vtrace CLI: replays recorded stimuli into waveform traces.
//!
//! Provides `vtrace replay` for driving a trace recorder from a JSON stimulus
//! file and `vtrace inspect` for summarizing an existing VCD trace.

#![warn(missing_docs)]

mod inspect;
mod replay;
mod stimulus;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use vtrace_common::TraceFormat;

/// vtrace: signal-trace recording for discrete-event simulators.
#[derive(Parser, Debug)]
#[command(name = "vtrace", version, about = "Signal trace recorder")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `vtrace.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a JSON stimulus through the recorder and write a trace.
    Replay(ReplayArgs),
    /// Summarize the signals of a VCD trace.
    Inspect(InspectArgs),
}

/// Arguments for the `vtrace replay` subcommand.
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// Stimulus file (JSON).
    pub stimulus: String,

    /// Output path for the trace file.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Trace output format.
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Duration of one timestamp tick (e.g., "1ns", "10ps").
    #[arg(long)]
    pub timescale: Option<String>,
}

/// Arguments for the `vtrace inspect` subcommand.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// VCD trace to read.
    pub trace: String,

    /// Print the full value history of this signal.
    #[arg(short, long)]
    pub signal: Option<String>,
}

/// Trace output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// Value Change Dump (IEEE 1364).
    Vcd,
    /// Fast Signal Trace (GTKWave).
    Fst,
}

impl From<FormatArg> for TraceFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Vcd => TraceFormat::Vcd,
            FormatArg::Fst => TraceFormat::Fst,
        }
    }
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Replay(ref args) => replay::run(args, &global),
        Command::Inspect(ref args) => inspect::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Returns the log filter used when `VTRACE_LOG` is unset.
fn default_filter(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Installs the stderr log subscriber. `VTRACE_LOG` overrides the level
/// chosen by `--quiet` / `--verbose`.
fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_env("VTRACE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter(global)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
