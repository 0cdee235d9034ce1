//! ## `vcdtoggle`: toggle activity of VCD traces
//!
//! This reads a VCD waveform dump and reduces it to a sparse sequence
//! of per-cycle toggle counts (the number of bits that changed during
//! a cycle), a cheap proxy for switching activity and power.
//!
//! Cycles are either the value of a designated counter signal or the
//! raw VCD time scaled down by a divisor.
//!
//! See the binary for example usage.

use indexmap::IndexSet;
use serde::{ Serialize, Deserialize };
use std::fs::File;
use std::io::{ BufRead, BufReader };
use std::path::Path;

mod hid;
pub use hid::{ HierName, ScopeStack };

pub mod error;
pub use error::{ FormatError, RecordError, Result, ToggleError };

pub mod symbols;
pub use symbols::{ StateArena, SymbolTable, Variable };

pub mod changes;
pub use changes::{ Record, Update };

pub mod toggle;
pub use toggle::{ Aggregator, ToggleDataPoint };

pub mod encode;

/// Options of one toggle extraction run.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToggleOptions {
    /// Signals whose first name contains this fragment are
    /// candidates for the cycle counter.
    pub timing_fragment: String,
    /// Minimum toggle count of an emitted cycle.
    pub threshold: u64,
    /// Divisor from VCD time to cycles, when no counter signal is found.
    pub time_divisor: u64,
    /// Cycles whose per-signal changes are reported.
    pub report_cycles: IndexSet<u64>,
    /// Also finalize the last cycle at the end of the trace.
    pub flush_at_end: bool,
    /// Maximum length of a scope-qualified signal name, inclusive.
    pub max_name_len: usize,
    /// Maximum scope nesting depth.
    pub max_scope_depth: usize,
}

impl Default for ToggleOptions {
    fn default() -> ToggleOptions {
        ToggleOptions {
            timing_fragment: String::new(),
            threshold: 1,
            time_divisor: 1,
            report_cycles: IndexSet::new(),
            flush_at_end: false,
            max_name_len: 1024,
            max_scope_depth: 100,
        }
    }
}

/// Counters collected over a run.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Total number of lines read, preamble included.
    pub lines: u64,
    pub preamble_lines: u64,
    /// Number of `$var` declarations.
    pub declarations: usize,
    /// Number of distinct identifiers.
    pub variables: usize,
    pub state_bits: usize,
    pub max_width: u32,
    /// Name of the cycle counter signal, if one was found.
    pub timing_signal: Option<String>,
    pub updates: u64,
    pub unrecognized: u64,
    pub malformed_bits: u64,
    pub malformed_times: u64,
    pub unknown_ids: u64,
    pub width_mismatches: u64,
    pub last_time: u64,
    pub last_cycle: Option<u64>,
}

impl RunStats {
    /// Number of skipped body records.
    #[inline]
    pub fn record_errors(&self) -> u64 {
        self.unrecognized + self.malformed_bits + self.malformed_times
            + self.unknown_ids + self.width_mismatches
    }
}

/// A change of one signal in a reported cycle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignalDiff {
    pub cycle: u64,
    pub distance: u64,
    pub name: String,
}

/// The result of a run.
#[derive(Debug, Clone)]
pub struct ToggleTrace {
    pub points: Vec<ToggleDataPoint>,
    pub diffs: Vec<SignalDiff>,
    pub stats: RunStats,
}

/// Decode bits as an unsigned integer, most significant first.
///
/// Only the low 64 bits of wider values are kept; `None` if any bit
/// is not `0` or `1`.
pub fn bits_to_u64(bits: &[u8]) -> Option<u64> {
    bits.iter().try_fold(0u64, |x, &b| match b {
        b'0' | b'1' => Some(x.wrapping_shl(1) | (b - b'0') as u64),
        _ => None,
    })
}

/// The state of one run over the body of a trace.
pub struct ToggleRun<'o> {
    opts: &'o ToggleOptions,
    source: String,
    table: SymbolTable,
    arena: StateArena,
    /// The cycle counter signal.
    timing: Option<usize>,
    agg: Aggregator,
    diffs: Vec<SignalDiff>,
    stats: RunStats,
}

impl<'o> ToggleRun<'o> {
    /// Prepare a run over a symbol table built from the preamble.
    ///
    /// `source` names the trace in diagnostics.
    pub fn new(table: SymbolTable, opts: &'o ToggleOptions, source: &str) -> ToggleRun<'o> {
        let arena = table.new_arena();
        let timing = table.find_by_fragment(&opts.timing_fragment);
        match timing {
            Some(t) => clilog::info!(
                "timing signal: {} ({} bits)",
                table.name(t), table.var(t).width
            ),
            None => clilog::info!(
                "timing signal not found; using ticks: {}", opts.timing_fragment
            ),
        }
        let stats = RunStats {
            variables: table.len(),
            state_bits: table.state_bits(),
            max_width: table.max_width(),
            timing_signal: timing.map(|t| table.name(t).to_string()),
            ..Default::default()
        };
        if opts.time_divisor == 0 {
            clilog::warn!("time divisor 0 is invalid, using 1");
        }
        ToggleRun {
            opts,
            source: source.to_string(),
            arena,
            timing,
            agg: Aggregator::new(opts.threshold, opts.report_cycles.clone()),
            diffs: Vec::new(),
            stats,
            table,
        }
    }

    #[inline]
    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    #[inline]
    pub fn arena(&self) -> &StateArena {
        &self.arena
    }

    #[inline]
    pub fn aggregator(&self) -> &Aggregator {
        &self.agg
    }

    #[inline]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Process one body line. Bad records are reported and skipped.
    pub fn record(&mut self, line_no: u64, line: &[u8]) {
        self.stats.lines = self.stats.lines.max(line_no);
        if let Err(e) = self.try_record(line) {
            self.report(line_no, &e);
        }
    }

    fn try_record(&mut self, line: &[u8]) -> std::result::Result<(), RecordError> {
        match changes::classify(line)? {
            Record::Blank => return Ok(()),
            Record::Time(t) => {
                self.stats.last_time = t;
                if self.timing.is_none() {
                    self.agg.set_candidate(t / self.opts.time_divisor.max(1));
                }
            }
            Record::Change { bits, id } => {
                let u = changes::apply_change(
                    &mut self.table, &mut self.arena, bits, id, line
                )?;
                self.stats.updates += 1;
                if !u.first {
                    self.agg.add(u.distance, u.bits);
                    if self.agg.is_reporting() && u.distance >= self.agg.threshold() {
                        self.report_diff(u);
                    }
                }
                if self.timing == Some(u.var) {
                    // bits were validated by `classify`
                    if let Some(c) = bits_to_u64(bits) {
                        self.agg.set_candidate(c);
                    }
                }
            }
        }
        self.agg.advance();
        Ok(())
    }

    fn report_diff(&mut self, u: Update) {
        let cycle = self.agg.current().unwrap_or_default();
        let name = self.table.name(u.var);
        clilog::info!(SIGNAL_DIFF, "[sigd] {:>8}  {}_{}", u.distance, cycle, name);
        self.diffs.push(SignalDiff { cycle, distance: u.distance, name: name.to_string() });
    }

    fn report(&mut self, line_no: u64, e: &RecordError) {
        let src = &self.source;
        match e {
            RecordError::Unrecognized(_) => {
                self.stats.unrecognized += 1;
                clilog::warn!(VCD_FORMAT, "{}:{} ERROR {}", src, line_no, e);
            }
            RecordError::MalformedBits(_) => {
                self.stats.malformed_bits += 1;
                clilog::warn!(VCD_FORMAT, "{}:{} ERROR {}", src, line_no, e);
            }
            RecordError::MalformedTime(_) => {
                self.stats.malformed_times += 1;
                clilog::warn!(VCD_TIME, "{}:{} ERROR {}", src, line_no, e);
            }
            RecordError::UnknownId { .. } => {
                self.stats.unknown_ids += 1;
                clilog::warn!(VCD_ID, "{}:{} ERROR {}", src, line_no, e);
            }
            RecordError::WidthMismatch { .. } => {
                self.stats.width_mismatches += 1;
                clilog::warn!(VCD_WIDTH, "{}:{} ERROR {}", src, line_no, e);
            }
        }
    }

    /// End the run.
    pub fn finish(mut self) -> ToggleTrace {
        self.stats.last_cycle = self.agg.current();
        let points = self.agg.finish(self.opts.flush_at_end);
        clilog::info!(
            "{} total: {} lines, last time {}, cycle {:?}, {} toggle points, {} skipped records",
            self.source, self.stats.lines, self.stats.last_time,
            self.stats.last_cycle, points.len(), self.stats.record_errors()
        );
        ToggleTrace { points, diffs: self.diffs, stats: self.stats }
    }
}

/// Extract toggle counts from a VCD stream.
///
/// `source` names the stream in diagnostics.
pub fn read_toggles_from<R: BufRead>(
    mut input: R, source: &str, opts: &ToggleOptions
) -> Result<ToggleTrace> {
    let mut line_no = 0;
    let names = symbols::read_preamble(&mut input, opts, &mut line_no)?;
    let declarations = names.len();
    let preamble_lines = names.lines;
    let table = SymbolTable::build(names);
    clilog::info!(
        "{} preamble: {} lines, {} signal names, {} ids, max var {}, tot {} bits",
        source, preamble_lines, declarations, table.len(),
        table.max_width(), table.state_bits()
    );
    let mut run = ToggleRun::new(table, opts, source);
    run.stats.declarations = declarations;
    run.stats.preamble_lines = preamble_lines;
    run.stats.lines = line_no;
    let mut buf = Vec::with_capacity(1024);
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        run.record(line_no, &buf);
    }
    Ok(run.finish())
}

/// Extract toggle counts from a VCD file.
pub fn read_toggles(path: impl AsRef<Path>, opts: &ToggleOptions) -> Result<ToggleTrace> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|source| ToggleError::Open {
        path: path.to_owned(), source
    })?;
    let f = BufReader::with_capacity(65536, f);
    read_toggles_from(f, &path.display().to_string(), opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_to_u64() {
        assert_eq!(bits_to_u64(b""), Some(0));
        assert_eq!(bits_to_u64(b"1"), Some(1));
        assert_eq!(bits_to_u64(b"0110"), Some(6));
        assert_eq!(bits_to_u64(b"01x0"), None);
        let mut wide = vec![b'1'; 70];
        wide[0] = b'0';
        assert_eq!(bits_to_u64(&wide), Some(u64::MAX));
    }

    const COUNTER: &str = "$scope module tb $end
$var reg 4 c cycle $end
$var wire 3 d data $end
$upscope $end
$enddefinitions $end
#0
b0000 c
b000 d
#1
b111 d
#2
b0001 c
b110 d
#3
b010 d
b0010 c
#4
b011 d
b0011 c
";

    fn run(src: &str, opts: &ToggleOptions) -> ToggleTrace {
        read_toggles_from(src.as_bytes(), "test.vcd", opts).unwrap()
    }

    #[test]
    fn test_counter_signal_defines_cycles() {
        let opts = ToggleOptions { timing_fragment: "cycle".into(), ..Default::default() };
        let t = run(COUNTER, &opts);
        assert_eq!(t.stats.timing_signal.as_deref(), Some("tb.cycle"));
        // cycle 0: data 000->111 (3), counter 0000->0001 (1) closes it.
        // cycle 1: data 111->110 (1), 110->010 (1), counter 0001->0010 (2).
        // cycle 2: data 010->011 (1), counter 0010->0011 (1).
        // cycle 3 never closes.
        assert_eq!(
            t.points,
            [
                ToggleDataPoint { cycle: 0, count: 4 },
                ToggleDataPoint { cycle: 1, count: 4 },
                ToggleDataPoint { cycle: 2, count: 2 },
            ]
        );
        assert_eq!(t.stats.last_cycle, Some(3));
        assert_eq!(t.stats.updates, 9);
        assert_eq!(t.stats.last_time, 4);
    }

    #[test]
    fn test_time_divisor() {
        let opts = ToggleOptions {
            timing_fragment: "nothing".into(),
            time_divisor: 2,
            flush_at_end: true,
            ..Default::default()
        };
        let t = run(COUNTER, &opts);
        assert_eq!(t.stats.timing_signal, None);
        // #0,#1 -> cycle 0; #2,#3 -> cycle 1; #4 -> cycle 2
        assert_eq!(
            t.points,
            [
                ToggleDataPoint { cycle: 0, count: 3 },
                ToggleDataPoint { cycle: 1, count: 5 },
                ToggleDataPoint { cycle: 2, count: 2 },
            ]
        );
    }

    #[test]
    fn test_report_cycles() {
        let opts = ToggleOptions {
            timing_fragment: "cycle".into(),
            threshold: 2,
            report_cycles: [1].into_iter().collect(),
            ..Default::default()
        };
        let t = run(COUNTER, &opts);
        assert_eq!(
            t.diffs,
            [SignalDiff { cycle: 1, distance: 2, name: "tb.cycle".into() }]
        );
    }

    #[test]
    fn test_bad_records_are_counted() {
        let src = "$var wire 2 ! a $end
$enddefinitions $end
#0
b00 !
$dumpvars
b1 !
b11 ?
bx1 !
#
#1
b11 !
#2
";
        let opts = ToggleOptions { timing_fragment: "none".into(), ..Default::default() };
        let t = run(src, &opts);
        assert_eq!(t.stats.unrecognized, 1);
        assert_eq!(t.stats.width_mismatches, 1);
        assert_eq!(t.stats.unknown_ids, 1);
        assert_eq!(t.stats.malformed_bits, 1);
        assert_eq!(t.stats.malformed_times, 1);
        assert_eq!(t.stats.record_errors(), 5);
        assert_eq!(t.stats.lines, 12);
        assert_eq!(t.points, [ToggleDataPoint { cycle: 1, count: 2 }]);
    }
}
