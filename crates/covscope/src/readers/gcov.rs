//! gcov JSON intermediate format (`gcov --json-format`)
//!
//! Documented in [man gcov.1](https://man7.org/linux/man-pages/man1/gcov.1.html).
//! Relative `file` entries are relative to `current_working_directory`.

use super::{ProfileFormat, ProfileReader, RawRecord};
use crate::aggregate::HitSummary;
use crate::result::{CovscopeError, CovscopeResult};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GcovIntermediate {
    #[serde(default)]
    current_working_directory: Option<String>,
    files: Vec<GcovFile>,
}

#[derive(Debug, Deserialize)]
struct GcovFile {
    file: String,
    #[serde(default)]
    lines: Vec<GcovLine>,
    #[serde(default)]
    functions: Vec<GcovFunction>,
}

#[derive(Debug, Deserialize)]
struct GcovLine {
    line_number: u32,
    count: u64,
}

#[derive(Debug, Deserialize)]
struct GcovFunction {
    name: String,
    #[serde(default)]
    demangled_name: Option<String>,
    execution_count: u64,
}

/// Reader for gcov JSON intermediate output
#[derive(Debug, Clone, Copy, Default)]
pub struct GcovJsonReader;

impl ProfileReader for GcovJsonReader {
    fn format(&self) -> ProfileFormat {
        ProfileFormat::GcovJson
    }

    fn decode(&self, artifact: &str, content: &str) -> CovscopeResult<Vec<RawRecord>> {
        let report: GcovIntermediate = serde_json::from_str(content)
            .map_err(|e| CovscopeError::decode(artifact, e.to_string()))?;

        let cwd = report
            .current_working_directory
            .as_deref()
            .map(|d| d.trim_end_matches('/'))
            .filter(|d| !d.is_empty());

        Ok(report
            .files
            .into_iter()
            .map(|file| {
                let mut hits = HitSummary::new();
                for line in &file.lines {
                    hits.observe_line(line.line_number, line.count);
                }
                for function in &file.functions {
                    let name = function.demangled_name.as_deref().unwrap_or(&function.name);
                    hits.record_function(name, function.execution_count);
                }
                let raw_path = match cwd {
                    Some(dir) if !file.file.starts_with('/') => format!("{dir}/{}", file.file),
                    _ => file.file,
                };
                RawRecord::new(raw_path, hits)
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "format_version": "1",
        "gcc_version": "11.4.0",
        "current_working_directory": "/repo/",
        "data_file": "Adder.gcda",
        "files": [{
            "file": "fbcode/testing_frameworks/code_coverage/rust/Adder.cpp",
            "functions": [{
                "name": "_Z3addii",
                "demangled_name": "add(int, int)",
                "execution_count": 4,
                "start_line": 3, "end_line": 5, "blocks": 2, "blocks_executed": 2
            }],
            "lines": [
                {"line_number": 3, "count": 4, "unexecuted_block": false, "branches": []},
                {"line_number": 4, "count": 4, "unexecuted_block": false, "branches": []},
                {"line_number": 9, "count": 0, "unexecuted_block": true, "branches": []}
            ]
        }, {
            "file": "/usr/include/c++/11/iostream",
            "lines": [{"line_number": 74, "count": 1}]
        }]
    }"#;

    #[test]
    fn test_decode_lines_and_functions() {
        let records = GcovJsonReader.decode("Adder.gcov.json", REPORT).unwrap();
        assert_eq!(records.len(), 2);
        let adder = &records[0];
        assert_eq!(
            adder.raw_path,
            "/repo/fbcode/testing_frameworks/code_coverage/rust/Adder.cpp"
        );
        assert_eq!(adder.hits.lines_instrumented(), 3);
        assert_eq!(adder.hits.lines_hit(), 2);
        assert_eq!(adder.hits.function_count("add(int, int)"), 4);
    }

    #[test]
    fn test_absolute_files_ignore_cwd() {
        let records = GcovJsonReader.decode("Adder.gcov.json", REPORT).unwrap();
        assert_eq!(records[1].raw_path, "/usr/include/c++/11/iostream");
    }

    #[test]
    fn test_missing_files_key_is_error() {
        let err = GcovJsonReader
            .decode("bad.json", r#"{"format_version": "1"}"#)
            .unwrap_err();
        assert!(matches!(err, CovscopeError::ReaderDecode { .. }));
    }
}
