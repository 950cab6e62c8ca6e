use std::error::Error;
use std::fs;
use std::path::PathBuf;
use regex::Regex;
use crate::config::CacheGeometry;

pub const TRACE_FILES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/traces");
pub const EXPECTED_OUTPUTS_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/expected");

/// A trace, the geometry to replay it with, and the file holding the expected JSON result
pub struct TestCase {
    pub geometry: CacheGeometry,
    pub trace: PathBuf,
    pub output: PathBuf,
}

/// Finds every test case, sorted by the expected output's file name
///
/// Expected outputs are named `<trace>-s<s>-E<E>-b<b>.json`, and replay
/// `<trace>.trace` from the trace directory
pub fn get_test_cases() -> Result<Vec<TestCase>, Box<dyn Error>> {
    let mut out = Vec::new();
    let output_pattern = Regex::new(r"^(?P<trace>[0-9a-zA-Z_]+)-s(?P<s>[0-9]+)-E(?P<e>[0-9]+)-b(?P<b>[0-9]+)\.json$")?;
    let mut files = fs::read_dir(EXPECTED_OUTPUTS_PATH)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| output_pattern.is_match(name))
        .collect::<Vec<_>>();
    files.sort();
    for file_name in files {
        // Get components of name
        let tokens = output_pattern.captures(&file_name).ok_or("Couldn't parse the file name".to_string())?;
        let trace = tokens.name("trace").ok_or("Couldn't get the trace file from the output file name".to_string())?.as_str();
        let geometry = CacheGeometry::new(
            tokens["s"].parse()?,
            tokens["e"].parse()?,
            tokens["b"].parse()?,
        )?;
        out.push(TestCase {
            geometry,
            trace: PathBuf::from(format!("{TRACE_FILES_PATH}/{trace}.trace")),
            output: PathBuf::from(format!("{EXPECTED_OUTPUTS_PATH}/{file_name}")),
        })
    }
    Ok(out)
}
