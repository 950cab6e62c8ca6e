use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use crate::io::get_trace_bytes;
use crate::simulator::{SimulationResult, Simulator};
use crate::test::init_logging;
use crate::util::get_test_cases;

#[test]
fn run_all_examples() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cases = get_test_cases()?;
    assert!(!cases.is_empty(), "no test cases found");
    for test in cases {
        println!("Running test for {}", test.output.display());
        // Read expected output
        let expected_output_file = File::open(&test.output)?;
        let expected_output: SimulationResult = serde_json::from_reader(BufReader::new(expected_output_file))?;
        // Simulate!
        let trace = get_trace_bytes(File::open(&test.trace)?)?;
        let mut simulator = Simulator::new(test.geometry)?;
        let result = *simulator.simulate(&trace)?;
        assert_eq!(result, expected_output, "{}", test.output.display());
        assert_eq!(result.hits + result.misses, simulator.get_events_processed());
        // Check results
        let time = simulator.get_execution_time();
        println!("Success for {}, time: {}", test.output.display(), time.as_nanos() as f64 / 1e9);
    }
    Ok(())
}

#[test]
fn verbose_trace_covers_every_event() -> Result<(), Box<dyn Error>> {
    init_logging();
    for test in get_test_cases()? {
        let trace = get_trace_bytes(File::open(&test.trace)?)?;
        let mut simulator = Simulator::new(test.geometry)?;
        let mut lines = Vec::new();
        let result = *simulator.simulate_with(&trace, |record| lines.push(record.to_string()))?;
        assert_eq!(lines.len() as u64, result.hits + result.misses);
        assert_eq!(lines.iter().filter(|line| line.ends_with(" hit")).count() as u64, result.hits);
        assert_eq!(lines.iter().filter(|line| line.ends_with(" miss eviction")).count() as u64, result.evictions);
    }
    Ok(())
}
