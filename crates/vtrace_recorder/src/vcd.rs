//! Value Change Dump (IEEE 1364) output.
//!
//! [`VcdSink`] streams text as it is driven: header and `$scope`/`$var`
//! lines during declaration, then `#time` markers and value lines. The
//! initial full snapshot is wrapped in `$dumpvars ... $end`.

use std::collections::HashMap;
use std::io::Write;

use vtrace_common::{Bits, Timescale, DEFAULT_VERSION};

use crate::error::TraceError;
use crate::signal::SignalCode;
use crate::sink::{LayoutInfo, SignalDecl, TraceSink};

/// Per-code output state: identifier and width.
#[derive(Clone, Debug)]
struct VcdVar {
    id_code: String,
    width: u32,
}

/// VCD writer implementing [`TraceSink`].
///
/// Identifier codes use printable ASCII starting at `!`. Aliases reuse the
/// identifier of their target, so viewers show both names with one history.
pub struct VcdSink<W: Write> {
    writer: W,
    timescale: Timescale,
    version: String,
    date: Option<String>,
    vars: HashMap<SignalCode, VcdVar>,
    next_id: u32,
    header_written: bool,
    definitions_ended: bool,
    current_time: Option<u64>,
}

impl<W: Write> VcdSink<W> {
    /// Creates a sink writing to `writer` with the given timescale.
    pub fn new(writer: W, timescale: Timescale) -> Self {
        Self {
            writer,
            timescale,
            version: DEFAULT_VERSION.to_string(),
            date: None,
            vars: HashMap::new(),
            next_id: 0,
            header_written: false,
            definitions_ended: false,
            current_time: None,
        }
    }

    /// Sets the `$version` text.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the `$date` text. Without one no `$date` section is written.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consumes the sink and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Generates an identifier code from a sequential index.
    ///
    /// Indices past 93 produce multi-character codes.
    pub fn make_id_code(index: u32) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            let c = (b'!' + (idx % 94) as u8) as char;
            result.push(c);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    fn ensure_header(&mut self) -> Result<(), TraceError> {
        if self.header_written {
            return Ok(());
        }
        if let Some(date) = &self.date {
            writeln!(self.writer, "$date\n  {date}\n$end")?;
        }
        writeln!(self.writer, "$version\n  {}\n$end", self.version)?;
        writeln!(self.writer, "$timescale\n  {}\n$end", self.timescale)?;
        self.header_written = true;
        Ok(())
    }

    fn ensure_definitions_ended(&mut self) -> Result<(), TraceError> {
        if !self.definitions_ended {
            self.ensure_header()?;
            writeln!(self.writer, "$enddefinitions $end")?;
            self.definitions_ended = true;
        }
        Ok(())
    }

    fn advance_time(&mut self, time: u64) -> Result<(), TraceError> {
        if self.current_time != Some(time) {
            writeln!(self.writer, "#{time}")?;
            self.current_time = Some(time);
        }
        Ok(())
    }
}

impl<W: Write> TraceSink for VcdSink<W> {
    fn begin_scope(&mut self, name: &str) -> Result<(), TraceError> {
        self.ensure_header()?;
        writeln!(self.writer, "$scope module {name} $end")?;
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), TraceError> {
        writeln!(self.writer, "$upscope $end")?;
        Ok(())
    }

    fn declare(&mut self, decl: &SignalDecl<'_>) -> Result<(), TraceError> {
        self.ensure_header()?;
        let id_code = if decl.alias {
            match self.vars.get(&decl.code) {
                Some(var) => var.id_code.clone(),
                None => {
                    return Err(TraceError::UnknownCode {
                        code: decl.code.as_raw(),
                    })
                }
            }
        } else {
            let id_code = Self::make_id_code(self.next_id);
            self.next_id += 1;
            self.vars.insert(
                decl.code,
                VcdVar {
                    id_code: id_code.clone(),
                    width: decl.width,
                },
            );
            id_code
        };

        let var_type = decl.kind.vcd_type();
        let width = decl.width;
        let name = decl.name;
        match decl.range {
            Some(range) => writeln!(
                self.writer,
                "$var {var_type} {width} {id_code} {name} {range} $end"
            )?,
            None => writeln!(self.writer, "$var {var_type} {width} {id_code} {name} $end")?,
        }
        Ok(())
    }

    fn end_definitions(&mut self, layout: &LayoutInfo) -> Result<(), TraceError> {
        self.ensure_header()?;
        writeln!(self.writer, "$comment layout {} $end", layout.hash)?;
        self.ensure_definitions_ended()
    }

    fn begin_snapshot(&mut self, time: u64) -> Result<(), TraceError> {
        self.ensure_definitions_ended()?;
        self.advance_time(time)?;
        writeln!(self.writer, "$dumpvars")?;
        Ok(())
    }

    fn end_snapshot(&mut self) -> Result<(), TraceError> {
        writeln!(self.writer, "$end")?;
        Ok(())
    }

    fn record_change(
        &mut self,
        time: u64,
        code: SignalCode,
        value: Bits<'_>,
    ) -> Result<(), TraceError> {
        self.ensure_definitions_ended()?;
        let var = self
            .vars
            .get(&code)
            .ok_or(TraceError::UnknownCode {
                code: code.as_raw(),
            })?
            .clone();
        self.advance_time(time)?;

        if var.width == 1 {
            let bit = if value.get(0) { '1' } else { '0' };
            writeln!(self.writer, "{bit}{}", var.id_code)?;
        } else {
            writeln!(self.writer, "b{value} {}", var.id_code)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), TraceError> {
        self.ensure_definitions_ended()?;
        self.writer.flush()?;
        Ok(())
    }
}
