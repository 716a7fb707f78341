//! `vtrace inspect`: summarize a VCD trace.

use std::fmt::Write as _;
use std::path::Path;

use vtrace_recorder::{load_vcd_file, LoadedTrace};

use crate::{GlobalArgs, InspectArgs};

/// Runs the `vtrace inspect` command.
///
/// Prints one line per signal to stdout, or the value history of a single
/// signal with `--signal`. Returns exit code 1 if that signal is missing.
pub fn run(args: &InspectArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let path = Path::new(&args.trace);
    let trace = load_vcd_file(path)?;

    if !global.quiet {
        eprintln!("   Inspecting {}", path.display());
    }

    match &args.signal {
        Some(name) => match format_history(&trace, name) {
            Some(text) => {
                print!("{text}");
                Ok(0)
            }
            None => {
                eprintln!("error: no signal '{name}' in {}", path.display());
                Ok(1)
            }
        },
        None => {
            print!("{}", format_summary(&trace));
            Ok(0)
        }
    }
}

/// Renders the header fields and a table of signals with their widths and
/// change counts.
fn format_summary(trace: &LoadedTrace) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "timescale: {}", trace.timescale);
    if let Some(version) = &trace.version {
        let _ = writeln!(out, "version:   {version}");
    }
    if let Some(date) = &trace.date {
        let _ = writeln!(out, "date:      {date}");
    }
    if let Some(hash) = trace.layout_hash() {
        let _ = writeln!(out, "layout:    {hash}");
    }
    let times = trace.times();
    if let (Some(first), Some(last)) = (times.first(), times.last()) {
        let _ = writeln!(out, "time:      {first}..{last}");
    }

    let name_width = trace
        .signals
        .iter()
        .map(|s| s.path.len())
        .max()
        .unwrap_or(0)
        .max("signal".len());
    let _ = writeln!(out, "{:<name_width$}  {:>5}  {:>7}", "signal", "width", "changes");
    for signal in &trace.signals {
        let changes = trace.histories[signal.history].len();
        let _ = writeln!(
            out,
            "{:<name_width$}  {:>5}  {:>7}",
            signal.path, signal.width, changes
        );
    }
    out
}

/// Renders every `(time, value)` change of `path`, or `None` if the trace
/// has no such signal.
fn format_history(trace: &LoadedTrace, path: &str) -> Option<String> {
    let history = trace.history(path)?;
    let mut out = String::new();
    for (time, value) in history {
        let _ = writeln!(out, "#{time} {value}");
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtrace_recorder::load_vcd;

    const TRACE: &str = "\
$version
  unit
$end
$timescale
  1ns
$end
$scope module top $end
$var wire 1 ! clk $end
$var wire 4 \" data [3:0] $end
$upscope $end
$enddefinitions $end
#0
$dumpvars
0!
b0000 \"
$end
#5
1!
#10
0!
b0011 \"
";

    #[test]
    fn summary_lists_signals() {
        let trace = load_vcd(TRACE).unwrap();
        let text = format_summary(&trace);
        assert!(text.contains("timescale: 1ns"));
        assert!(text.contains("version:   unit"));
        assert!(text.contains("time:      0..10"));
        let clk = text.lines().find(|l| l.starts_with("top.clk")).unwrap();
        assert!(clk.ends_with("1        3"));
        let data = text.lines().find(|l| l.starts_with("top.data")).unwrap();
        assert!(data.ends_with("4        2"));
    }

    #[test]
    fn history_of_one_signal() {
        let trace = load_vcd(TRACE).unwrap();
        assert_eq!(
            format_history(&trace, "top.data").unwrap(),
            "#0 0000\n#10 0011\n"
        );
        assert!(format_history(&trace, "top.nope").is_none());
    }

    #[test]
    fn run_on_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.vcd");
        std::fs::write(&path, TRACE).unwrap();
        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            config: None,
        };
        let args = InspectArgs {
            trace: path.to_string_lossy().into_owned(),
            signal: None,
        };
        assert_eq!(run(&args, &global).unwrap(), 0);

        let args = InspectArgs {
            trace: path.to_string_lossy().into_owned(),
            signal: Some("top.missing".into()),
        };
        assert_eq!(run(&args, &global).unwrap(), 1);
    }

    #[test]
    fn run_on_missing_file_fails() {
        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            config: None,
        };
        let args = InspectArgs {
            trace: "/no/such/trace.vcd".into(),
            signal: None,
        };
        assert!(run(&args, &global).is_err());
    }
}
