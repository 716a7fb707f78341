//! Reads VCD files back into memory.
//!
//! Used to inspect traces written by [`VcdSink`](crate::vcd::VcdSink) and to
//! check them in tests. Only two-state values are accepted; `x` and `z`
//! bits are reported as errors.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use vtrace_common::{BitVector, Timescale};

use crate::signal::BitRange;

/// Errors that can occur while loading a VCD file.
#[derive(Debug, Error)]
pub enum VcdLoadError {
    /// An I/O error occurred while reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A parse error at a specific line.
    #[error("parse error at line {line}: {message}")]
    ParseError {
        /// 1-based line number.
        line: usize,
        /// Description of the error.
        message: String,
    },
    /// The file is structurally incomplete.
    #[error("format error: {0}")]
    FormatError(String),
}

/// A `$var` found in the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VcdSignalDef {
    /// Identifier code.
    pub id_code: String,
    /// Dotted hierarchical name.
    pub path: String,
    /// Width in bits.
    pub width: u32,
    /// Declared range, if one followed the name.
    pub range: Option<BitRange>,
    /// Variable type keyword (`wire`, `reg`, ...).
    pub var_type: String,
    /// Index into [`LoadedTrace::histories`]. Variables sharing an
    /// identifier share a history.
    pub history: usize,
}

/// A fully loaded VCD trace.
#[derive(Clone, Debug)]
pub struct LoadedTrace {
    /// Header timescale.
    pub timescale: Timescale,
    /// `$version` text, if present.
    pub version: Option<String>,
    /// `$date` text, if present.
    pub date: Option<String>,
    /// Header `$comment` bodies in file order.
    pub comments: Vec<String>,
    /// Variables in declaration order.
    pub signals: Vec<VcdSignalDef>,
    /// One `(time, value)` list per distinct identifier, in time order.
    pub histories: Vec<Vec<(u64, BitVector)>>,
}

impl LoadedTrace {
    /// Finds a variable by dotted path.
    pub fn signal(&self, path: &str) -> Option<&VcdSignalDef> {
        self.signals.iter().find(|s| s.path == path)
    }

    /// Returns the value history of the variable at `path`.
    pub fn history(&self, path: &str) -> Option<&[(u64, BitVector)]> {
        self.signal(path).map(|s| self.histories[s.history].as_slice())
    }

    /// Returns the value of `path` at `time` (the last change at or before it).
    pub fn value_at(&self, path: &str, time: u64) -> Option<&BitVector> {
        self.history(path)?
            .iter()
            .take_while(|(t, _)| *t <= time)
            .last()
            .map(|(_, v)| v)
    }

    /// Returns the distinct timestamps that carry at least one change.
    pub fn times(&self) -> Vec<u64> {
        let mut times: Vec<u64> = self
            .histories
            .iter()
            .flat_map(|h| h.iter().map(|(t, _)| *t))
            .collect();
        times.sort_unstable();
        times.dedup();
        times
    }

    /// Returns the layout fingerprint from a `$comment layout <hash>` entry.
    pub fn layout_hash(&self) -> Option<&str> {
        self.comments
            .iter()
            .find_map(|c| c.strip_prefix("layout "))
            .map(str::trim)
    }
}

/// Loads a trace from VCD text.
///
/// # Errors
///
/// Returns [`VcdLoadError`] on malformed input, four-state values, or a
/// missing `$enddefinitions`.
pub fn load_vcd(text: &str) -> Result<LoadedTrace, VcdLoadError> {
    let tokens = tokenize(text);
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        trace: LoadedTrace {
            timescale: Timescale::default(),
            version: None,
            date: None,
            comments: Vec::new(),
            signals: Vec::new(),
            histories: Vec::new(),
        },
        ids: HashMap::new(),
        widths: Vec::new(),
        scopes: Vec::new(),
    };
    parser.parse_header()?;
    parser.parse_changes()?;
    Ok(parser.trace)
}

/// Loads a trace from a VCD file.
///
/// # Errors
///
/// Returns [`VcdLoadError`] on I/O or parse errors.
pub fn load_vcd_file(path: &Path) -> Result<LoadedTrace, VcdLoadError> {
    let text = std::fs::read_to_string(path)?;
    load_vcd(&text)
}

/// Splits text into whitespace-separated tokens tagged with line numbers.
fn tokenize(text: &str) -> Vec<(usize, &str)> {
    text.lines()
        .enumerate()
        .flat_map(|(i, line)| line.split_whitespace().map(move |t| (i + 1, t)))
        .collect()
}

struct Parser<'a> {
    tokens: &'a [(usize, &'a str)],
    pos: usize,
    trace: LoadedTrace,
    ids: HashMap<String, usize>,
    /// Width of each history, indexed like `trace.histories`.
    widths: Vec<u32>,
    scopes: Vec<String>,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Option<(usize, &'a str)> {
        let tok = self.tokens.get(self.pos).copied();
        self.pos += 1;
        tok
    }

    fn last_line(&self) -> usize {
        self.tokens.last().map_or(0, |(l, _)| *l)
    }

    /// Collects tokens up to the next `$end`.
    fn body(&mut self, keyword: &str) -> Result<(usize, Vec<&'a str>), VcdLoadError> {
        let start = self.tokens.get(self.pos).map_or(self.last_line(), |t| t.0);
        let mut out = Vec::new();
        loop {
            match self.next() {
                Some((_, "$end")) => return Ok((start, out)),
                Some((_, tok)) => out.push(tok),
                None => {
                    return Err(VcdLoadError::FormatError(format!(
                        "unterminated {keyword}"
                    )))
                }
            }
        }
    }

    fn parse_header(&mut self) -> Result<(), VcdLoadError> {
        loop {
            let Some((line, tok)) = self.next() else {
                return Err(VcdLoadError::FormatError(
                    "missing $enddefinitions".to_string(),
                ));
            };
            match tok {
                "$enddefinitions" => {
                    self.body(tok)?;
                    return Ok(());
                }
                "$date" => self.trace.date = Some(self.body(tok)?.1.join(" ")),
                "$version" => self.trace.version = Some(self.body(tok)?.1.join(" ")),
                "$comment" => {
                    let text = self.body(tok)?.1.join(" ");
                    self.trace.comments.push(text);
                }
                "$timescale" => {
                    let (line, body) = self.body(tok)?;
                    let text = body.concat();
                    self.trace.timescale =
                        text.parse::<Timescale>().map_err(|e| VcdLoadError::ParseError {
                            line,
                            message: format!("{e}"),
                        })?;
                }
                "$scope" => {
                    let (line, body) = self.body(tok)?;
                    let name = body.last().ok_or_else(|| VcdLoadError::ParseError {
                        line,
                        message: "$scope without a name".to_string(),
                    })?;
                    self.scopes.push((*name).to_string());
                }
                "$upscope" => {
                    self.body(tok)?;
                    if self.scopes.pop().is_none() {
                        return Err(VcdLoadError::ParseError {
                            line,
                            message: "$upscope without matching $scope".to_string(),
                        });
                    }
                }
                "$var" => {
                    let (line, body) = self.body(tok)?;
                    self.declare_var(line, &body)?;
                }
                other if other.starts_with('$') => {
                    self.body(other)?;
                }
                other => {
                    return Err(VcdLoadError::ParseError {
                        line,
                        message: format!("unexpected token in header: {other}"),
                    })
                }
            }
        }
    }

    fn declare_var(&mut self, line: usize, body: &[&str]) -> Result<(), VcdLoadError> {
        let parse_err = |message: String| VcdLoadError::ParseError { line, message };
        let [var_type, width, id_code, name, rest @ ..] = body else {
            return Err(parse_err(format!("invalid $var: {}", body.join(" "))));
        };
        let width: u32 = width
            .parse()
            .map_err(|_| parse_err(format!("invalid width in $var: {width}")))?;
        let range = match rest.first() {
            Some(r) => Some(parse_range(r).ok_or_else(|| parse_err(format!("invalid range: {r}")))?),
            None => None,
        };

        let path = if self.scopes.is_empty() {
            (*name).to_string()
        } else {
            format!("{}.{}", self.scopes.join("."), name)
        };
        let history = match self.ids.get(*id_code) {
            Some(&h) => h,
            None => {
                let h = self.trace.histories.len();
                self.trace.histories.push(Vec::new());
                self.widths.push(width);
                self.ids.insert((*id_code).to_string(), h);
                h
            }
        };
        self.trace.signals.push(VcdSignalDef {
            id_code: (*id_code).to_string(),
            path,
            width,
            range,
            var_type: (*var_type).to_string(),
            history,
        });
        Ok(())
    }

    fn push_value(
        &mut self,
        line: usize,
        time: u64,
        id_code: &str,
        bits: &str,
    ) -> Result<(), VcdLoadError> {
        let Some(&history) = self.ids.get(id_code) else {
            return Err(VcdLoadError::ParseError {
                line,
                message: format!("unknown identifier code: {id_code}"),
            });
        };
        if bits.contains(['x', 'X', 'z', 'Z']) {
            return Err(VcdLoadError::ParseError {
                line,
                message: format!("four-state value not supported: {bits}"),
            });
        }
        let raw = BitVector::from_binary_str(bits).ok_or_else(|| VcdLoadError::ParseError {
            line,
            message: format!("invalid binary value: {bits}"),
        })?;
        let value = BitVector::from_words(raw.words(), self.widths[history]);
        self.trace.histories[history].push((time, value));
        Ok(())
    }

    fn parse_changes(&mut self) -> Result<(), VcdLoadError> {
        let mut time = 0u64;
        while let Some((line, tok)) = self.next() {
            if let Some(t) = tok.strip_prefix('#') {
                time = t.parse().map_err(|_| VcdLoadError::ParseError {
                    line,
                    message: format!("invalid timestamp: {tok}"),
                })?;
                continue;
            }
            match tok {
                "$dumpvars" | "$dumpall" | "$dumpon" | "$dumpoff" | "$end" => {}
                "$comment" => {
                    self.body(tok)?;
                }
                _ => {
                    let mut chars = tok.chars();
                    let kind = chars.next().unwrap_or(' ');
                    let rest = chars.as_str();
                    match kind {
                        'b' | 'B' => {
                            let Some((_, id_code)) = self.next() else {
                                return Err(VcdLoadError::ParseError {
                                    line,
                                    message: format!("missing identifier after {tok}"),
                                });
                            };
                            self.push_value(line, time, id_code, rest)?;
                        }
                        '0' | '1' | 'x' | 'X' | 'z' | 'Z' => {
                            self.push_value(line, time, rest, &tok[..1])?;
                        }
                        _ => {
                            return Err(VcdLoadError::ParseError {
                                line,
                                message: format!("unsupported value change: {tok}"),
                            })
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Parses `[msb:lsb]` or `[bit]`.
fn parse_range(s: &str) -> Option<BitRange> {
    let inner = s.strip_prefix('[')?.strip_suffix(']')?;
    match inner.split_once(':') {
        Some((msb, lsb)) => Some(BitRange::new(msb.parse().ok()?, lsb.parse().ok()?)),
        None => {
            let bit = inner.parse().ok()?;
            Some(BitRange::new(bit, bit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
$date
  today
$end
$version
  vtrace
$end
$timescale
  1ns
$end
$scope module top $end
$var wire 1 ! clk $end
$var wire 8 \" cnt [7:0] $end
$scope module sub $end
$var wire 1 ! clk_in $end
$upscope $end
$upscope $end
$comment layout 00ff $end
$enddefinitions $end
#0
$dumpvars
0!
b00000101 \"
$end
#10
1!
b110 \"
";

    #[test]
    fn header_fields() {
        let trace = load_vcd(SAMPLE).unwrap();
        assert_eq!(trace.date.as_deref(), Some("today"));
        assert_eq!(trace.version.as_deref(), Some("vtrace"));
        assert_eq!(trace.timescale.to_string(), "1ns");
        assert_eq!(trace.layout_hash(), Some("00ff"));
    }

    #[test]
    fn signals_and_ranges() {
        let trace = load_vcd(SAMPLE).unwrap();
        let paths: Vec<_> = trace.signals.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, ["top.clk", "top.cnt", "top.sub.clk_in"]);
        assert_eq!(trace.signal("top.cnt").unwrap().range, Some(BitRange::new(7, 0)));
        assert_eq!(trace.signal("top.clk").unwrap().range, None);
    }

    #[test]
    fn shared_identifier_shares_history() {
        let trace = load_vcd(SAMPLE).unwrap();
        assert_eq!(trace.histories.len(), 2);
        assert_eq!(trace.history("top.clk"), trace.history("top.sub.clk_in"));
    }

    #[test]
    fn values_over_time() {
        let trace = load_vcd(SAMPLE).unwrap();
        assert_eq!(trace.value_at("top.cnt", 0).unwrap().to_u64(), Some(5));
        assert_eq!(trace.value_at("top.cnt", 9).unwrap().to_u64(), Some(5));
        assert_eq!(trace.value_at("top.cnt", 10).unwrap().to_u64(), Some(6));
        assert_eq!(trace.value_at("top.cnt", 10).unwrap().width(), 8);
        assert_eq!(trace.value_at("top.clk", 10).unwrap().to_u64(), Some(1));
        assert_eq!(trace.times(), vec![0, 10]);
    }

    #[test]
    fn four_state_rejected() {
        let text = "$var wire 1 ! a $end $enddefinitions $end #0 x!";
        let err = load_vcd(text).unwrap_err();
        assert!(matches!(err, VcdLoadError::ParseError { line: 1, .. }));
    }

    #[test]
    fn unknown_identifier_rejected() {
        let text = "$var wire 1 ! a $end\n$enddefinitions $end\n#0\n1?\n";
        let err = load_vcd(text).unwrap_err();
        assert!(matches!(err, VcdLoadError::ParseError { line: 4, .. }));
    }

    #[test]
    fn missing_enddefinitions() {
        let err = load_vcd("$var wire 1 ! a $end\n").unwrap_err();
        assert!(matches!(err, VcdLoadError::FormatError(_)));
    }

    #[test]
    fn unterminated_section() {
        let err = load_vcd("$comment never closed").unwrap_err();
        assert!(matches!(err, VcdLoadError::FormatError(_)));
    }

    #[test]
    fn bad_timescale() {
        let err = load_vcd("$timescale 3ns $end $enddefinitions $end").unwrap_err();
        assert!(matches!(err, VcdLoadError::ParseError { .. }));
    }

    #[test]
    fn values_take_the_width_of_their_identifier() {
        let mut text = String::from("$scope module top $end\n");
        for i in 0..200u32 {
            let width = i % 7 + 1;
            text.push_str(&format!("$var wire {width} s{i} sig{i} $end\n"));
        }
        text.push_str("$var wire 4 s3 alias3 $end\n$upscope $end\n$enddefinitions $end\n#0\n");
        for i in 0..200u32 {
            text.push_str(&format!("b11111111 s{i}\n"));
        }

        let trace = load_vcd(&text).unwrap();
        assert_eq!(trace.histories.len(), 200);
        for i in 0..200u32 {
            let width = i % 7 + 1;
            let value = trace.value_at(&format!("top.sig{i}"), 0).unwrap();
            assert_eq!(value.width(), width);
            assert_eq!(value.to_u64(), Some((1 << width) - 1));
        }
        // An alias reads through the history of the first declaration.
        assert_eq!(trace.value_at("top.alias3", 0).unwrap().width(), 4);
        assert_eq!(trace.signal("top.alias3").unwrap().width, 4);
    }

    #[test]
    fn range_parsing() {
        assert_eq!(parse_range("[7:0]"), Some(BitRange::new(7, 0)));
        assert_eq!(parse_range("[3]"), Some(BitRange::new(3, 3)));
        assert_eq!(parse_range("7:0"), None);
    }

    #[test]
    fn file_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.vcd");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(load_vcd_file(&path).unwrap().signals.len(), 3);
        assert!(matches!(
            load_vcd_file(&dir.path().join("missing.vcd")),
            Err(VcdLoadError::Io(_))
        ));
    }
}
