use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::time::Instant;
use clap::{ArgAction, Parser};
use log::info;
use csimlib::config::CacheGeometry;
use csimlib::io::get_trace_bytes;
use csimlib::simulator::Simulator;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Set-associative cache simulator with LRU replacement, write-back and write-allocate"))]
struct Args {
    /// Print the outcome of every access
    #[arg(short, long)]
    verbose: bool,

    /// Number of set index bits, the cache has 2^s sets
    #[arg(short, required_unless_present = "config")]
    s: Option<u32>,

    /// Associativity, the number of lines per set
    #[arg(short = 'E', required_unless_present = "config")]
    e: Option<usize>,

    /// Number of block offset bits, blocks are 2^b bytes
    #[arg(short, required_unless_present = "config")]
    b: Option<u32>,

    /// JSON file holding the geometry instead, e.g. {"s": 4, "E": 1, "b": 4}
    #[arg(long, conflicts_with_all = ["s", "e", "b"])]
    config: Option<String>,

    /// The trace to replay
    #[arg(short, long)]
    trace: String,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    performance: bool,

    /// Print cache occupancy after the run. On by default in debug builds, `-d false` turns it off
    #[arg(short, long, action = ArgAction::Set, num_args = 0..=1, default_value_t = DEBUG_DEFAULT, default_missing_value = "true")]
    debug: bool,
}

fn get_geometry(args: &Args) -> Result<CacheGeometry, String> {
    if let Some(path) = &args.config {
        let config_file = File::open(path).map_err(|e| format!("Couldn't open the config file at path {path}: {e}"))?;
        return serde_json::from_reader(BufReader::new(config_file)).map_err(|e| format!("Couldn't parse the config file: {e}"));
    }
    match (args.s, args.e, args.b) {
        (Some(s), Some(e), Some(b)) => CacheGeometry::new(s, e, b).map_err(|e| format!("Invalid cache geometry: {e}")),
        (None, _, _) => Err("Missing <s> argument".to_string()),
        (_, None, _) => Err("Missing <E> argument".to_string()),
        (_, _, None) => Err("Missing <b> argument".to_string()),
    }
}

fn main() -> Result<(), String> {
    env_logger::init();
    let start = Instant::now();
    let args = Args::parse();
    let geometry = get_geometry(&args)?;
    let mut simulator = Simulator::new(geometry).map_err(|e| format!("Couldn't build the cache: {e}"))?;
    let trace_file = File::open(&args.trace).map_err(|e| format!("Couldn't open the trace file at path {}: {e}", args.trace))?;
    let trace = get_trace_bytes(trace_file)?;
    info!("Replaying {} bytes of trace from {}", trace.len(), args.trace);

    let mut out = BufWriter::new(std::io::stdout().lock());
    let mut write_error = None;
    let result = *simulator
        .simulate_with(&trace, |record| {
            if args.verbose {
                if let Err(e) = writeln!(out, "{record}") {
                    write_error.get_or_insert(e);
                }
            }
        })
        .map_err(|e| format!("Simulation failed: {e}"))?;
    if let Some(e) = write_error {
        return Err(format!("Couldn't write the verbose trace: {e}"));
    }

    let summary = if args.json {
        serde_json::to_string_pretty(&result).map_err(|e| format!("Couldn't serialise the output {e}"))?
    } else {
        result.to_string()
    };
    writeln!(out, "{summary}").map_err(|e| format!("Couldn't write the summary: {e}"))?;
    out.flush().map_err(|e| format!("Couldn't write the summary: {e}"))?;

    if args.performance {
        let end = Instant::now();
        let simulation_time = simulator.get_execution_time();
        let total_time = end - start;
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes initial parsing, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Parsed cache geometry: {geometry:?}");
        let cache = simulator.get_cache();
        println!("Resident blocks: {}, of which dirty: {}", cache.get_resident_block_count(), cache.get_dirty_block_count());
        println!("Ways never filled: {}", cache.get_unused_way_count());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_from_flags() {
        let args = Args::try_parse_from(["csim", "-v", "-s", "4", "-E", "2", "-b", "3", "-t", "trace"]).unwrap();
        assert!(args.verbose);
        assert_eq!(get_geometry(&args).unwrap(), CacheGeometry::new(4, 2, 3).unwrap());
    }

    #[test]
    fn debug_output_can_be_switched_either_way() {
        let base = ["csim", "-s", "0", "-E", "1", "-b", "0", "-t", "trace"];
        let off = Args::try_parse_from(base.iter().copied().chain(["-d", "false"])).unwrap();
        assert!(!off.debug);
        let on = Args::try_parse_from(base.iter().copied().chain(["-d"])).unwrap();
        assert!(on.debug);
        let before_trace = Args::try_parse_from(["csim", "-s", "0", "-E", "1", "-b", "0", "-d", "-t", "trace"]).unwrap();
        assert!(before_trace.debug);
        assert_eq!(before_trace.trace, "trace");
        let default = Args::try_parse_from(base).unwrap();
        assert_eq!(default.debug, DEBUG_DEFAULT);
    }

    #[test]
    fn missing_geometry_is_rejected() {
        assert!(Args::try_parse_from(["csim", "-s", "4", "-b", "3", "-t", "trace"]).is_err());
        assert!(Args::try_parse_from(["csim", "-s", "4", "--config", "g.json", "-t", "trace"]).is_err());
    }

    #[test]
    fn invalid_geometry_is_reported() {
        let args = Args::try_parse_from(["csim", "-s", "4", "-E", "0", "-b", "3", "-t", "trace"]).unwrap();
        assert_eq!(get_geometry(&args).unwrap_err(), "Invalid cache geometry: associativity (E) must be at least 1");
    }
}
