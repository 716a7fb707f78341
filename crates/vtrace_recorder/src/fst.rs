//! FST (Fast Signal Trace) output.
//!
//! FST is the compressed binary format read by GTKWave and Surfer. The file
//! is a sequence of blocks, each a type byte followed by a big-endian `u64`
//! section length (which counts itself but not the type byte):
//!
//! - Header (type 0): 329-byte payload with time range, counts, timescale
//! - Value change data (type 1): initial bits, per-signal waves, time table
//! - Geometry (type 3): per-handle bit widths
//! - Hierarchy (type 4): gzip'd scope and variable tree
//!
//! The header needs the final time range and variable counts, so
//! [`FstSink`] buffers everything and writes the file on
//! [`finalize`](TraceSink::finalize).

use std::collections::HashMap;
use std::io::Write;

use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use vtrace_common::{BitVector, Bits, Timescale, DEFAULT_VERSION};

use crate::error::TraceError;
use crate::signal::{SigDirection, SigKind, SignalCode};
use crate::sink::{LayoutInfo, SignalDecl, TraceSink};

/// Block type identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum FstBlockType {
    Header = 0,
    VcData = 1,
    Geometry = 3,
    Hierarchy = 4,
}

/// Size of the header block payload.
const HEADER_PAYLOAD_LEN: usize = 329;

/// Hierarchy tag: open scope.
const FST_ST_VCD_SCOPE: u8 = 0xFE;
/// Hierarchy tag: close scope.
const FST_ST_VCD_UPSCOPE: u8 = 0xFF;
/// Scope type: module.
const FST_ST_VCD_MODULE: u8 = 0;

/// Variable type: parameter.
const FST_VT_VCD_PARAMETER: u8 = 2;
/// Variable type: reg.
const FST_VT_VCD_REG: u8 = 5;
/// Variable type: wire.
const FST_VT_VCD_WIRE: u8 = 16;

fn var_type(kind: SigKind) -> u8 {
    match kind {
        SigKind::Wire => FST_VT_VCD_WIRE,
        SigKind::Var => FST_VT_VCD_REG,
        SigKind::Parameter => FST_VT_VCD_PARAMETER,
    }
}

fn var_direction(direction: SigDirection) -> u8 {
    match direction {
        SigDirection::None => 0,
        SigDirection::Input => 1,
        SigDirection::Output => 2,
        SigDirection::Inout => 3,
    }
}

#[derive(Clone, Debug)]
enum HierEntry {
    Scope {
        name: String,
    },
    Upscope,
    Var {
        name: String,
        width: u32,
        var_type: u8,
        direction: u8,
        /// 1-based handle of the aliased variable, or 0 for a new one.
        alias_of: u32,
    },
}

#[derive(Clone, Debug)]
struct FstChange {
    time: u64,
    /// 0-based variable index (handle - 1).
    index: u32,
    value: BitVector,
}

/// FST writer implementing [`TraceSink`].
///
/// Real signals get handles `1..=n` in declaration order. Aliases are
/// written as hierarchy entries pointing at their target's handle and carry
/// no geometry or value data of their own.
pub struct FstSink<W: Write> {
    writer: W,
    timescale: Timescale,
    version: String,
    date: String,
    handles: HashMap<SignalCode, u32>,
    widths: Vec<u32>,
    hierarchy: Vec<HierEntry>,
    alias_count: u64,
    changes: Vec<FstChange>,
    start_time: u64,
    end_time: u64,
    finalized: bool,
}

impl<W: Write> FstSink<W> {
    /// Creates a sink writing to `writer` with the given timescale.
    pub fn new(writer: W, timescale: Timescale) -> Self {
        Self {
            writer,
            timescale,
            version: DEFAULT_VERSION.to_string(),
            date: String::new(),
            handles: HashMap::new(),
            widths: Vec::new(),
            hierarchy: Vec::new(),
            alias_count: 0,
            changes: Vec::new(),
            start_time: 0,
            end_time: 0,
            finalized: false,
        }
    }

    /// Sets the writer string stored in the header.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the date string stored in the header.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
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

    fn var_count(&self) -> u64 {
        self.widths.len() as u64
    }

    fn write_header_block(&mut self) -> Result<(), TraceError> {
        let mut payload = vec![0u8; HEADER_PAYLOAD_LEN];

        payload[0..8].copy_from_slice(&self.start_time.to_be_bytes());
        payload[8..16].copy_from_slice(&self.end_time.to_be_bytes());
        // Endianness check value, native byte order.
        payload[16..24].copy_from_slice(&std::f64::consts::E.to_ne_bytes());
        // 24..32: writer memory use, left zero.
        let scope_count = self
            .hierarchy
            .iter()
            .filter(|h| matches!(h, HierEntry::Scope { .. }))
            .count() as u64;
        payload[32..40].copy_from_slice(&scope_count.to_be_bytes());
        let hier_vars = self.var_count() + self.alias_count;
        payload[40..48].copy_from_slice(&hier_vars.to_be_bytes());
        payload[48..56].copy_from_slice(&self.var_count().to_be_bytes());
        let vc_blocks: u64 = if self.changes.is_empty() { 0 } else { 1 };
        payload[56..64].copy_from_slice(&vc_blocks.to_be_bytes());
        payload[64] = self.timescale.exponent() as u8;
        copy_padded(&mut payload[65..193], self.version.as_bytes());
        copy_padded(&mut payload[193..219], self.date.as_bytes());
        // 219..312 reserved; 312 file type (0 = Verilog); 313..321 time zero.
        write_block(&mut self.writer, FstBlockType::Header, &payload)
    }

    /// Initial value of every variable, MSB first, one ASCII byte per bit.
    fn build_bits_array(&self) -> Vec<u8> {
        let mut initial: Vec<Option<&BitVector>> = vec![None; self.widths.len()];
        for change in &self.changes {
            if change.time == self.start_time {
                initial[change.index as usize] = Some(&change.value);
            }
        }

        let mut bits = Vec::new();
        for (i, value) in initial.iter().enumerate() {
            match value {
                Some(v) => push_ascii_bits(&mut bits, v),
                None => bits.extend(std::iter::repeat_n(b'0', self.widths[i] as usize)),
            }
        }
        bits
    }

    /// Encodes per-variable changes after the start time.
    ///
    /// Returns the concatenated waves data and a 1-based position per
    /// variable (0 when a variable never changes after the start).
    fn build_waves(&self, times: &[u64]) -> (Vec<u8>, Vec<u64>) {
        let time_index: HashMap<u64, u64> = times
            .iter()
            .enumerate()
            .map(|(i, &t)| (t, i as u64))
            .collect();

        let mut per_var: Vec<Vec<(u64, &BitVector)>> = vec![Vec::new(); self.widths.len()];
        for change in &self.changes {
            if change.time == self.start_time {
                continue;
            }
            if let Some(&idx) = time_index.get(&change.time) {
                per_var[change.index as usize].push((idx, &change.value));
            }
        }

        let mut waves = Vec::new();
        let mut positions = vec![0u64; self.widths.len()];
        for (var, entries) in per_var.iter().enumerate() {
            if entries.is_empty() {
                continue;
            }
            positions[var] = waves.len() as u64 + 1;

            let mut data = Vec::new();
            let mut prev = 0u64;
            for &(idx, value) in entries {
                let delta = idx - prev;
                prev = idx;
                if self.widths[var] == 1 {
                    let bit = if value.get(0) { 2 } else { 0 };
                    write_varint(&mut data, (delta << 2) | bit);
                } else {
                    write_varint(&mut data, (delta << 1) | 1);
                    push_ascii_bits(&mut data, value);
                }
            }
            // Uncompressed length 0 marks raw data.
            write_varint(&mut waves, 0);
            waves.extend_from_slice(&data);
        }
        (waves, positions)
    }

    fn write_vc_data_block(&mut self) -> Result<(), TraceError> {
        if self.changes.is_empty() {
            return Ok(());
        }

        let mut times: Vec<u64> = self.changes.iter().map(|c| c.time).collect();
        times.sort_unstable();
        times.dedup();

        let bits_raw = self.build_bits_array();
        let bits_compressed = compress_zlib(&bits_raw)?;

        let (waves_raw, positions) = self.build_waves(&times);
        let waves_compressed = if waves_raw.is_empty() {
            Vec::new()
        } else {
            compress_zlib(&waves_raw)?
        };

        let mut position_raw = Vec::new();
        for &p in &positions {
            write_varint(&mut position_raw, p);
        }

        let mut time_raw = Vec::new();
        let mut prev = 0u64;
        for &t in &times {
            write_varint(&mut time_raw, t - prev);
            prev = t;
        }
        let time_compressed = compress_zlib(&time_raw)?;

        let mut payload = Vec::new();
        write_u64_be(&mut payload, self.start_time);
        write_u64_be(&mut payload, self.end_time);
        write_u64_be(&mut payload, 0);

        write_varint(&mut payload, bits_raw.len() as u64);
        write_varint(&mut payload, bits_compressed.len() as u64);
        write_varint(&mut payload, self.var_count());
        payload.extend_from_slice(&bits_compressed);

        write_varint(&mut payload, self.var_count());
        payload.push(b'Z');
        payload.extend_from_slice(&waves_compressed);

        payload.extend_from_slice(&position_raw);
        write_u64_be(&mut payload, position_raw.len() as u64);

        payload.extend_from_slice(&time_compressed);
        write_u64_be(&mut payload, time_raw.len() as u64);
        write_u64_be(&mut payload, time_compressed.len() as u64);
        write_u64_be(&mut payload, times.len() as u64);

        write_block(&mut self.writer, FstBlockType::VcData, &payload)
    }

    fn write_geometry_block(&mut self) -> Result<(), TraceError> {
        let mut raw = Vec::new();
        for &w in &self.widths {
            write_varint(&mut raw, w as u64);
        }
        let compressed = compress_zlib(&raw)?;

        let mut payload = Vec::new();
        write_u64_be(&mut payload, raw.len() as u64);
        write_u64_be(&mut payload, self.var_count());
        payload.extend_from_slice(&compressed);
        write_block(&mut self.writer, FstBlockType::Geometry, &payload)
    }

    fn write_hierarchy_block(&mut self) -> Result<(), TraceError> {
        let mut raw = Vec::new();
        for entry in &self.hierarchy {
            match entry {
                HierEntry::Scope { name } => {
                    raw.push(FST_ST_VCD_SCOPE);
                    raw.push(FST_ST_VCD_MODULE);
                    raw.extend_from_slice(name.as_bytes());
                    raw.push(0);
                    // Empty component name.
                    raw.push(0);
                }
                HierEntry::Upscope => raw.push(FST_ST_VCD_UPSCOPE),
                HierEntry::Var {
                    name,
                    width,
                    var_type,
                    direction,
                    alias_of,
                } => {
                    raw.push(*var_type);
                    raw.push(*direction);
                    raw.extend_from_slice(name.as_bytes());
                    raw.push(0);
                    write_varint(&mut raw, *width as u64);
                    write_varint(&mut raw, *alias_of as u64);
                }
            }
        }
        let compressed = compress_gzip(&raw)?;

        let mut payload = Vec::new();
        write_u64_be(&mut payload, raw.len() as u64);
        payload.extend_from_slice(&compressed);
        write_block(&mut self.writer, FstBlockType::Hierarchy, &payload)
    }
}

impl<W: Write> TraceSink for FstSink<W> {
    fn begin_scope(&mut self, name: &str) -> Result<(), TraceError> {
        self.hierarchy.push(HierEntry::Scope {
            name: name.to_string(),
        });
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), TraceError> {
        self.hierarchy.push(HierEntry::Upscope);
        Ok(())
    }

    fn declare(&mut self, decl: &SignalDecl<'_>) -> Result<(), TraceError> {
        let alias_of = if decl.alias {
            let handle = self
                .handles
                .get(&decl.code)
                .copied()
                .ok_or(TraceError::UnknownCode {
                    code: decl.code.as_raw(),
                })?;
            self.alias_count += 1;
            handle
        } else {
            self.widths.push(decl.width);
            self.handles.insert(decl.code, self.widths.len() as u32);
            0
        };

        let name = match decl.range {
            Some(range) => format!("{} {range}", decl.name),
            None => decl.name.to_string(),
        };
        self.hierarchy.push(HierEntry::Var {
            name,
            width: decl.width,
            var_type: var_type(decl.kind),
            direction: var_direction(decl.direction),
            alias_of,
        });
        Ok(())
    }

    fn end_definitions(&mut self, _layout: &LayoutInfo) -> Result<(), TraceError> {
        Ok(())
    }

    fn record_change(
        &mut self,
        time: u64,
        code: SignalCode,
        value: Bits<'_>,
    ) -> Result<(), TraceError> {
        let handle = self
            .handles
            .get(&code)
            .copied()
            .ok_or(TraceError::UnknownCode {
                code: code.as_raw(),
            })?;

        if self.changes.is_empty() {
            self.start_time = time;
        }
        self.end_time = time;
        self.changes.push(FstChange {
            time,
            index: handle - 1,
            value: value.to_vector(),
        });
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), TraceError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.write_header_block()?;
        self.write_vc_data_block()?;
        self.write_geometry_block()?;
        self.write_hierarchy_block()?;
        self.writer.flush()?;
        Ok(())
    }
}

fn push_ascii_bits(buf: &mut Vec<u8>, value: &BitVector) {
    for i in (0..value.width()).rev() {
        buf.push(if value.get(i) { b'1' } else { b'0' });
    }
}

/// Copies `src` into `dest`, truncated to leave a trailing NUL.
fn copy_padded(dest: &mut [u8], src: &[u8]) {
    let n = src.len().min(dest.len().saturating_sub(1));
    dest[..n].copy_from_slice(&src[..n]);
}

/// Writes an unsigned LEB128 varint.
fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn write_u64_be(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn compress_zlib(data: &[u8]) -> Result<Vec<u8>, TraceError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn compress_gzip(data: &[u8]) -> Result<Vec<u8>, TraceError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn write_block<W: Write>(
    writer: &mut W,
    block_type: FstBlockType,
    payload: &[u8],
) -> Result<(), TraceError> {
    writer.write_all(&[block_type as u8])?;
    let section_length = 8u64 + payload.len() as u64;
    writer.write_all(&section_length.to_be_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}
