//! LCOV Tracefile Reader
//!
//! ## LCOV Format
//!
//! ```text
//! TN:<test name>
//! SF:<source file>
//! FN:<line>,<function name>
//! FNDA:<execution count>,<function name>
//! DA:<line>,<execution count>[,<checksum>]
//! end_of_record
//! ```
//!
//! Summary lines (`FNF`, `FNH`, `LF`, `LH`, `BR*`) are ignored; they are
//! derivable from the records above.

use super::{ProfileFormat, ProfileReader, RawRecord};
use crate::aggregate::HitSummary;
use crate::result::{CovscopeError, CovscopeResult};

/// Reader for LCOV tracefiles
#[derive(Debug, Clone, Copy, Default)]
pub struct LcovReader;

impl LcovReader {
    fn parse_count(artifact: &str, lineno: usize, value: &str) -> CovscopeResult<u64> {
        // Some emitters write negative or fractional counts for unexecuted lines
        if value.starts_with('-') {
            return Ok(0);
        }
        value
            .split('.')
            .next()
            .unwrap_or(value)
            .parse()
            .map_err(|_| CovscopeError::decode(artifact, format!("line {lineno}: bad count {value:?}")))
    }
}

impl ProfileReader for LcovReader {
    fn format(&self) -> ProfileFormat {
        ProfileFormat::Lcov
    }

    fn decode(&self, artifact: &str, content: &str) -> CovscopeResult<Vec<RawRecord>> {
        let mut records = Vec::new();
        let mut current: Option<(String, HitSummary)> = None;

        for (idx, raw_line) in content.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if line == "end_of_record" {
                if let Some((path, hits)) = current.take() {
                    records.push(RawRecord::new(path, hits));
                }
                continue;
            }

            let Some((tag, value)) = line.split_once(':') else {
                return Err(CovscopeError::decode(
                    artifact,
                    format!("line {lineno}: expected TAG:VALUE"),
                ));
            };

            match tag {
                "SF" => {
                    if let Some((path, hits)) = current.take() {
                        records.push(RawRecord::new(path, hits));
                    }
                    current = Some((value.to_string(), HitSummary::new()));
                }
                "DA" | "FNDA" => {
                    let Some((_, hits)) = current.as_mut() else {
                        return Err(CovscopeError::decode(
                            artifact,
                            format!("line {lineno}: {tag} outside of a source file record"),
                        ));
                    };
                    // FNDA names may contain commas; DA may carry a trailing checksum
                    let mut fields = value.splitn(if tag == "DA" { 3 } else { 2 }, ',');
                    let first = fields.next().unwrap_or_default();
                    let second = fields.next().ok_or_else(|| {
                        CovscopeError::decode(artifact, format!("line {lineno}: truncated {tag}"))
                    })?;
                    if tag == "DA" {
                        let number: u32 = first.parse().map_err(|_| {
                            CovscopeError::decode(artifact, format!("line {lineno}: bad line number"))
                        })?;
                        hits.observe_line(number, Self::parse_count(artifact, lineno, second)?);
                    } else {
                        hits.record_function(second, Self::parse_count(artifact, lineno, first)?);
                    }
                }
                _ => {}
            }
        }

        // Tolerate a missing trailing end_of_record
        if let Some((path, hits)) = current {
            records.push(RawRecord::new(path, hits));
        }

        Ok(records)
    }
}
