//! Trace driver: replay allocation trace files against a fresh heap each,
//! validate every op, and print utilization and throughput.
//!
//! ```text
//! cargo run -p tagheap-bench --example trace_driver -- [-c] TRACE...
//! ```
//!
//! `-c` runs the consistency checker after every op. With no trace files
//! the built-in synthetic profiles are replayed. Set `RUST_LOG=debug` to
//! see arena growth.

use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;
use std::time::Instant;

use log::{error, info};
use tagheap_arena::{Heap, HeapConfig};
use tagheap_bench::{churn_profile, fragmentation_profile, realloc_growth_profile};
use tagheap_trace::{read_trace, replay, ReplayOptions, ReplayReport, Trace, TraceError};

fn load(path: &str) -> Result<Trace, TraceError> {
    read_trace(BufReader::new(File::open(path)?))
}

fn run(name: &str, trace: &Trace, options: &ReplayOptions) -> Result<ReplayReport, TraceError> {
    let mut heap = Heap::init(HeapConfig::default())?;
    let report = replay(trace, &mut heap, options)?;
    info!(
        "{name}: {} (chunk {} B, {} B of host memory left)",
        heap.stats(),
        heap.config().chunk_bytes,
        heap.memory().remaining()
    );
    Ok(report)
}

fn main() -> ExitCode {
    pretty_env_logger::init();

    let mut options = ReplayOptions::default();
    let mut paths = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-c" => options.check_each_op = true,
            _ => paths.push(arg),
        }
    }

    let mut traces: Vec<(String, Trace)> = Vec::new();
    if paths.is_empty() {
        traces.push(("churn".into(), churn_profile(1, 512, 20_000, 16 * 1024)));
        traces.push(("fragmentation".into(), fragmentation_profile(1, 1000)));
        traces.push(("realloc-growth".into(), realloc_growth_profile(1, 16, 200)));
    }
    for path in paths {
        match load(&path) {
            Ok(trace) => traces.push((path, trace)),
            Err(e) => {
                error!("{path}: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    println!("{:<24} {:>8} {:>8} {:>12} {:>14}", "trace", "valid", "util", "ops", "Kops/s");
    let start = Instant::now();
    let mut total_ops = 0usize;
    let mut util_sum = 0.0;
    let mut failed = false;
    for (name, trace) in &traces {
        match run(name, trace, &options) {
            Ok(report) => {
                total_ops += report.ops;
                util_sum += report.utilization();
                println!(
                    "{:<24} {:>8} {:>7.1}% {:>12} {:>14.0}",
                    name,
                    "yes",
                    report.utilization() * 100.0,
                    report.ops,
                    report.ops_per_sec() / 1000.0
                );
            }
            Err(e) => {
                failed = true;
                println!("{name:<24} {:>8}   {e}", "no");
            }
        }
    }
    let elapsed = start.elapsed();

    if !traces.is_empty() {
        println!(
            "\nmean util {:.1}%, {} ops in {:.3}s ({:.0} Kops/s overall)",
            util_sum / traces.len() as f64 * 100.0,
            total_ops,
            elapsed.as_secs_f64(),
            total_ops as f64 / elapsed.as_secs_f64().max(f64::MIN_POSITIVE) / 1000.0
        );
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
