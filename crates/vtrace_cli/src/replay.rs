//! `vtrace replay`: drive a trace recorder from a JSON stimulus.
//!
//! Declares every signal in the stimulus, records a full dump at the first
//! step and change-only records at every later step, then closes the trace.
//! Output settings come from command-line flags first, then `vtrace.toml`,
//! then built-in defaults.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use vtrace_common::{Timescale, TraceFormat};
use vtrace_config::{TraceSettings, VtraceConfig};
use vtrace_recorder::{
    create_file_sink, SinkOptions, Snapshot, TraceRecorder, TraceSink,
};

use crate::stimulus::{ScopeSpec, SignalSpec, Stimulus};
use crate::{GlobalArgs, ReplayArgs};

/// Counts reported after a replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Signals that own storage.
    pub signals: usize,
    /// Extra names for existing signals.
    pub aliases: usize,
    /// Steps recorded.
    pub steps: usize,
    /// Timestamp of the last step, if any.
    pub end_time: Option<u64>,
}

/// Output settings after merging flags and configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOutput {
    /// Trace file to write.
    pub path: PathBuf,
    /// Trace format.
    pub format: TraceFormat,
    /// Duration of one tick.
    pub timescale: Timescale,
}

/// Runs the `vtrace replay` command.
///
/// Returns exit code 0 once the trace is written.
pub fn run(args: &ReplayArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_settings(global)?;
    let stimulus_path = Path::new(&args.stimulus);
    let stimulus = Stimulus::from_file(stimulus_path)?;
    let output = resolve_output(args, &config.trace, stimulus_path)?;

    if !global.quiet {
        eprintln!("   Replaying {}", stimulus_path.display());
    }

    let options = SinkOptions {
        timescale: output.timescale,
        version: Some(config.trace.version.clone()),
        date: config.trace.date.clone(),
    };
    let sink = create_file_sink(&output.path, output.format, &options)?;
    let mut recorder = TraceRecorder::new(sink);
    let summary = replay(&stimulus, &mut recorder)?;

    info!(
        signals = summary.signals,
        aliases = summary.aliases,
        steps = summary.steps,
        path = %output.path.display(),
        "trace written"
    );
    if !global.quiet {
        eprintln!(
            "   Recorded {} signals ({} aliases) over {} steps",
            summary.signals, summary.aliases, summary.steps
        );
        if let Some(end) = summary.end_time {
            eprintln!("   Last step at t={end} ({})", output.timescale);
        }
        eprintln!("   Trace: {} ({})", output.path.display(), output.format);
    }
    Ok(0)
}

/// Loads `--config` when given, otherwise `vtrace.toml` from the working
/// directory (or defaults when there is none).
fn load_settings(global: &GlobalArgs) -> Result<VtraceConfig, Box<dyn std::error::Error>> {
    let config = match &global.config {
        Some(path) => vtrace_config::load_config_file(Path::new(path))?,
        None => vtrace_config::load_config(&std::env::current_dir()?)?,
    };
    Ok(config)
}

/// Merges flags over configuration.
///
/// The format comes from `--format`, then the extension of `--output`, then
/// the configuration. Without an output path from either source, the trace
/// is written next to the stimulus with the format's extension.
fn resolve_output(
    args: &ReplayArgs,
    settings: &TraceSettings,
    stimulus_path: &Path,
) -> Result<ResolvedOutput, Box<dyn std::error::Error>> {
    let flag_output = args.output.as_ref().map(PathBuf::from);
    let format = args
        .format
        .map(TraceFormat::from)
        .or_else(|| {
            flag_output
                .as_ref()
                .and_then(|p| p.extension())
                .and_then(|e| e.to_str())
                .and_then(TraceFormat::from_extension)
        })
        .unwrap_or(settings.format);
    let timescale = match &args.timescale {
        Some(text) => text.parse::<Timescale>()?,
        None => settings.timescale,
    };
    let path = flag_output
        .or_else(|| settings.output.clone())
        .unwrap_or_else(|| stimulus_path.with_extension(format.extension()));
    Ok(ResolvedOutput {
        path,
        format,
        timescale,
    })
}

/// Declares the stimulus signals on `recorder`, records every step, and
/// closes the trace.
pub fn replay<S: TraceSink>(
    stimulus: &Stimulus,
    recorder: &mut TraceRecorder<S>,
) -> Result<ReplaySummary, Box<dyn std::error::Error>> {
    recorder.begin_declaration()?;
    for signal in &stimulus.signals {
        declare(recorder, signal)?;
    }
    for scope in &stimulus.scopes {
        declare_scope(recorder, scope)?;
    }
    recorder.end_declaration()?;
    debug!(
        signals = recorder.descriptors().len(),
        slots = recorder.slot_count(),
        "stimulus declared"
    );

    let mut values = Snapshot::new();
    for (index, step) in stimulus.steps.iter().enumerate() {
        for (path, value) in &step.values {
            let code = recorder.find(path).ok_or_else(|| {
                format!("step at time {}: unknown signal '{path}'", step.time)
            })?;
            let width = recorder
                .descriptor(code)
                .map(|d| d.width)
                .ok_or_else(|| format!("signal '{path}' has no descriptor"))?;
            values.set_vector(code, &value.to_vector(width)?);
        }
        if index == 0 {
            recorder.record_full(step.time, &values)?;
        } else {
            recorder.record_changes(step.time, &values)?;
        }
    }

    let summary = ReplaySummary {
        signals: recorder.descriptors().len(),
        aliases: recorder.aliases().len(),
        steps: stimulus.steps.len(),
        end_time: stimulus.steps.last().map(|s| s.time),
    };
    recorder.cleanup()?;
    Ok(summary)
}

fn declare_scope<S: TraceSink>(
    recorder: &mut TraceRecorder<S>,
    scope: &ScopeSpec,
) -> Result<(), Box<dyn std::error::Error>> {
    recorder.push_scope(&scope.name)?;
    if scope.group {
        recorder.begin_group()?;
    }
    for signal in &scope.signals {
        declare(recorder, signal)?;
    }
    for child in &scope.scopes {
        declare_scope(recorder, child)?;
    }
    recorder.pop_scope()?;
    Ok(())
}

fn declare<S: TraceSink>(
    recorder: &mut TraceRecorder<S>,
    signal: &SignalSpec,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(target) = &signal.alias_of {
        let code = recorder.find(target).ok_or_else(|| {
            format!(
                "alias '{}' refers to unknown signal '{target}'",
                signal.name
            )
        })?;
        recorder.declare_alias(&signal.name, code, signal.direction, signal.kind)?;
        return Ok(());
    }

    let (name, direction, kind) = (&signal.name, signal.direction, signal.kind);
    match (signal.constant, signal.range) {
        (true, Some([msb, lsb])) => {
            recorder.declare_constant_range(name, msb, lsb, direction, kind)?;
        }
        (false, Some([msb, lsb])) => {
            recorder.declare_range(name, msb, lsb, direction, kind)?;
        }
        (constant, None) => {
            let width = signal
                .width()
                .ok_or_else(|| format!("signal '{name}' has no width"))?;
            if constant {
                recorder.declare_constant(name, width, direction, kind)?;
            } else {
                recorder.declare_signal(name, width, direction, kind)?;
            }
        }
    }
    Ok(())
}
