//! LLVM source-based coverage (`llvm-cov export -format=text`)
//!
//! ## Format
//!
//! ```text
//! {"type": "llvm.coverage.json.export", "version": "2.0.1",
//!  "data": [{"files": [{"filename": "...",
//!                       "segments": [[line, col, count, has_count, is_region_entry, is_gap], ...]}],
//!            "functions": [{"name": "...", "count": N, "filenames": ["..."]}]}]}
//! ```

use super::{ProfileFormat, ProfileReader, RawRecord};
use crate::aggregate::HitSummary;
use crate::result::{CovscopeError, CovscopeResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

const EXPORT_TYPE: &str = "llvm.coverage.json.export";

#[derive(Debug, Deserialize)]
struct Export {
    #[serde(rename = "type")]
    kind: Option<String>,
    data: Vec<ExportData>,
}

#[derive(Debug, Deserialize)]
struct ExportData {
    #[serde(default)]
    files: Vec<ExportFile>,
    #[serde(default)]
    functions: Vec<ExportFunction>,
}

#[derive(Debug, Deserialize)]
struct ExportFile {
    filename: String,
    #[serde(default)]
    segments: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ExportFunction {
    name: String,
    count: u64,
    #[serde(default)]
    filenames: Vec<String>,
}

/// A segment that starts a counted, non-gap region on a line
fn counted_line(segment: &[Value]) -> Option<(u32, u64)> {
    let line = u32::try_from(segment.first()?.as_u64()?).ok()?;
    let count = segment.get(2)?.as_u64()?;
    let has_count = segment.get(3)?.as_bool()?;
    let is_gap = segment.get(5).and_then(Value::as_bool).unwrap_or(false);
    (has_count && !is_gap).then_some((line, count))
}

/// Reader for `llvm-cov export` JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct LlvmJsonReader;

impl ProfileReader for LlvmJsonReader {
    fn format(&self) -> ProfileFormat {
        ProfileFormat::LlvmJson
    }

    fn decode(&self, artifact: &str, content: &str) -> CovscopeResult<Vec<RawRecord>> {
        let export: Export = serde_json::from_str(content)
            .map_err(|e| CovscopeError::decode(artifact, e.to_string()))?;

        if let Some(kind) = export.kind.as_deref() {
            if kind != EXPORT_TYPE {
                return Err(CovscopeError::decode(
                    artifact,
                    format!("unexpected export type {kind}"),
                ));
            }
        }

        let mut files: BTreeMap<String, HitSummary> = BTreeMap::new();
        for data in export.data {
            for file in data.files {
                let hits = files.entry(file.filename).or_default();
                for segment in &file.segments {
                    if let Some((line, count)) = counted_line(segment) {
                        hits.observe_line(line, count);
                    }
                }
            }
            for function in data.functions {
                // The first filename is the one the function is defined in
                if let Some(filename) = function.filenames.into_iter().next() {
                    files
                        .entry(filename)
                        .or_default()
                        .record_function(&function.name, function.count);
                }
            }
        }

        Ok(files
            .into_iter()
            .map(|(path, hits)| RawRecord::new(path, hits))
            .collect())
    }
}
