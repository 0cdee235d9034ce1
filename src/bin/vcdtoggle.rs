//! Toggle count extraction.
//!
//! This program reads one VCD file and counts, per cycle, how many
//! signal bits changed. The counts of all cycles reaching the
//! threshold are written to a binary file as native-endian `u32`s,
//! one per cycle, without header.
//!
//! Cycles come from a counter signal found by name, or from the VCD
//! time if no signal matches.

use vcdtoggle::{ ToggleOptions, read_toggles };
use vcdtoggle::encode::{ save_counts, save_points };
use itertools::Itertools;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

/// Parse an integer with an optional `0x`, `0o`, `0b` or leading `0`
/// radix prefix.
fn parse_int(s: &str) -> Result<u64, String> {
    let (digits, radix) = if let Some(h) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (h, 16)
    } else if let Some(o) = s.strip_prefix("0o") {
        (o, 8)
    } else if let Some(b) = s.strip_prefix("0b") {
        (b, 2)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };
    u64::from_str_radix(digits, radix).map_err(|e| format!("{s}: {e}"))
}

#[derive(clap::Parser, Debug)]
struct VcdToggleArgs {
    /// The input vcd file path
    vcd: PathBuf,
    /// Name fragment of the cycle counter signal.
    ///
    /// If no signal name contains it, the VCD time is used instead.
    timing: String,
    /// The binary toggle count output file path.
    output: PathBuf,
    /// The minimum toggle count of a saved cycle.
    #[clap(default_value = "1", value_parser = parse_int)]
    threshold: u64,
    /// Cycles for which every changing signal is reported.
    #[clap(value_parser = parse_int)]
    report_cycles: Vec<u64>,
    /// Divide the VCD time by this to get cycles (without counter signal).
    #[clap(long, default_value = "1", value_parser = parse_int)]
    time_divisor: u64,
    /// Also save the last cycle of the trace.
    #[clap(long)]
    flush_at_end: bool,
    /// Optional CBOR output of (cycle, count) points.
    #[clap(long)]
    points: Option<PathBuf>,
    /// The maximum length of a hierarchical signal name.
    #[clap(long, default_value_t = 1024)]
    max_name_len: usize,
}

fn log_error(e: &dyn Error) {
    clilog::error!("{}", e);
    let mut source = e.source();
    while let Some(s) = source {
        clilog::error!("  caused by: {}", s);
        source = s.source();
    }
}

fn main() -> ExitCode {
    clilog::init_stderr_color_debug();
    let args = <VcdToggleArgs as clap::Parser>::parse();
    clilog::info!("args: {:#?}", args);
    clilog::info!("toggle threshold: {}", args.threshold);
    if !args.report_cycles.is_empty() {
        clilog::info!("report cycles: {}", args.report_cycles.iter().format(" "));
    }

    let opts = ToggleOptions {
        timing_fragment: args.timing.clone(),
        threshold: args.threshold,
        time_divisor: args.time_divisor,
        report_cycles: args.report_cycles.iter().copied().collect(),
        flush_at_end: args.flush_at_end,
        max_name_len: args.max_name_len,
        ..Default::default()
    };

    let timer_read = clilog::stimer!("read_vcd");
    let trace = match read_toggles(&args.vcd, &opts) {
        Ok(trace) => trace,
        Err(e) => {
            log_error(&e);
            return ExitCode::FAILURE;
        }
    };
    clilog::finish!(timer_read);
    if trace.stats.record_errors() > 0 {
        clilog::warn!("skipped {} malformed records", trace.stats.record_errors());
    }

    let mut fail = 0u8;
    if let Err(e) = save_counts(&args.output, &trace.points) {
        log_error(&e);
        fail += 1;
    }
    if let Some(path) = &args.points {
        if let Err(e) = save_points(path, &trace.points) {
            log_error(&e);
            fail += 1;
        }
    }
    ExitCode::from(fail)
}
