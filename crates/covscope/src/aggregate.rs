//! Coverage Aggregation
//!
//! Merges normalized facts from every reader of one invocation into a single
//! set of [`CoveredFile`] records keyed by logical path. Merging is
//! commutative and associative, so per-worker partial sets can be reduced in
//! any order.

use crate::path::{LanguageTag, RepoRelativePath};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Normalized hit facts for one file
///
/// Line and function counts from different readers are added together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HitSummary {
    /// Execution count per line
    lines: BTreeMap<u32, u64>,
    /// Execution count per function
    functions: BTreeMap<String, u64>,
}

impl HitSummary {
    /// Create an empty summary
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` executions to a line
    pub fn record_line(&mut self, line: u32, count: u64) {
        let entry = self.lines.entry(line).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    /// Record a line count, keeping the larger value if the line was seen
    ///
    /// Readers use this when one artifact reports the same line more than once
    /// (e.g. several regions starting on it).
    pub fn observe_line(&mut self, line: u32, count: u64) {
        let entry = self.lines.entry(line).or_insert(0);
        *entry = (*entry).max(count);
    }

    /// Add `count` executions to a function
    pub fn record_function(&mut self, name: &str, count: u64) {
        let entry = self.functions.entry(name.to_string()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    /// Union of hit information
    pub fn merge(&mut self, other: Self) {
        for (line, count) in other.lines {
            self.record_line(line, count);
        }
        for (name, count) in other.functions {
            let entry = self.functions.entry(name).or_insert(0);
            *entry = entry.saturating_add(count);
        }
    }

    /// Execution count for a line (0 when not instrumented)
    #[must_use]
    pub fn line_count(&self, line: u32) -> u64 {
        self.lines.get(&line).copied().unwrap_or(0)
    }

    /// Execution count for a function (0 when unknown)
    #[must_use]
    pub fn function_count(&self, name: &str) -> u64 {
        self.functions.get(name).copied().unwrap_or(0)
    }

    /// Number of instrumented lines
    #[must_use]
    pub fn lines_instrumented(&self) -> usize {
        self.lines.len()
    }

    /// Number of lines executed at least once
    #[must_use]
    pub fn lines_hit(&self) -> usize {
        self.lines.values().filter(|&&c| c > 0).count()
    }

    /// Number of functions executed at least once
    #[must_use]
    pub fn functions_hit(&self) -> usize {
        self.functions.values().filter(|&&c| c > 0).count()
    }

    /// Whether the summary holds no facts at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.functions.is_empty()
    }
}

/// One covered file after aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoveredFile {
    /// Logical path (physical rendering for generated files)
    pub logical_path: RepoRelativePath,
    /// Languages whose readers contributed facts
    pub languages: BTreeSet<LanguageTag>,
    /// Merged hit facts
    pub hits: HitSummary,
}

impl CoveredFile {
    /// Create a record from a single reader's facts
    #[must_use]
    pub fn new(logical_path: RepoRelativePath, language: LanguageTag, hits: HitSummary) -> Self {
        Self {
            logical_path,
            languages: BTreeSet::from([language]),
            hits,
        }
    }

    /// Merge another record with the same identity into this one
    ///
    /// For generated files with different physical hash segments the
    /// lexicographically smallest rendering wins, independent of merge order.
    pub fn merge(&mut self, other: Self) {
        debug_assert_eq!(self.logical_path, other.logical_path);
        if other.logical_path.to_string() < self.logical_path.to_string() {
            self.logical_path = other.logical_path;
        }
        self.languages.extend(other.languages);
        self.hits.merge(other.hits);
    }
}

/// Deduplicated coverage for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageSet {
    files: BTreeMap<RepoRelativePath, CoveredFile>,
}

impl CoverageSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate `(path, hits, language)` facts into a set
    pub fn aggregate<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (RepoRelativePath, HitSummary, LanguageTag)>,
    {
        let mut set = Self::new();
        for (path, hits, language) in records {
            set.insert(path, hits, language);
        }
        set
    }

    /// Add facts for one file
    pub fn insert(&mut self, path: RepoRelativePath, hits: HitSummary, language: LanguageTag) {
        self.insert_file(CoveredFile::new(path, language, hits));
    }

    /// Add a whole record, merging with any record of the same identity
    pub fn insert_file(&mut self, file: CoveredFile) {
        if let Some(existing) = self.files.get_mut(&file.logical_path) {
            existing.merge(file);
        } else {
            let _ = self.files.insert(file.logical_path.clone(), file);
        }
    }

    /// Merge two partial sets (rayon reduce operator)
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        if self.files.len() < other.files.len() {
            return other.merge(self);
        }
        for file in other.files.into_values() {
            self.insert_file(file);
        }
        self
    }

    /// Look up a file by logical identity
    #[must_use]
    pub fn get(&self, path: &RepoRelativePath) -> Option<&CoveredFile> {
        self.files.get(path)
    }

    /// Whether a file with this identity is covered
    #[must_use]
    pub fn contains(&self, path: &RepoRelativePath) -> bool {
        self.files.contains_key(path)
    }

    /// Number of distinct files
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no file is covered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Records ordered by logical identity
    pub fn iter(&self) -> impl Iterator<Item = &CoveredFile> {
        self.files.values()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn path(s: &str) -> RepoRelativePath {
        RepoRelativePath::parse(s).unwrap()
    }

    fn hits(lines: &[(u32, u64)]) -> HitSummary {
        let mut h = HitSummary::new();
        for &(line, count) in lines {
            h.record_line(line, count);
        }
        h
    }

    #[test]
    fn test_observe_line_keeps_max() {
        let mut h = HitSummary::new();
        h.observe_line(3, 5);
        h.observe_line(3, 2);
        assert_eq!(h.line_count(3), 5);
    }

    #[test]
    fn test_record_saturates() {
        let mut h = HitSummary::new();
        h.record_line(1, u64::MAX);
        h.record_line(1, 10);
        assert_eq!(h.line_count(1), u64::MAX);
    }

    #[test]
    fn test_hit_counters() {
        let mut h = hits(&[(1, 0), (2, 4), (3, 1)]);
        h.record_function("main", 1);
        h.record_function("unused", 0);
        assert_eq!(h.lines_instrumented(), 3);
        assert_eq!(h.lines_hit(), 2);
        assert_eq!(h.functions_hit(), 1);
        assert_eq!(h.function_count("main"), 1);
    }

    #[test]
    fn test_same_path_from_two_languages_appears_once() {
        let header = path("fbcode/lib/Adder.h");
        let set = CoverageSet::aggregate([
            (header.clone(), hits(&[(10, 1)]), LanguageTag::Rust),
            (header.clone(), hits(&[(10, 2), (11, 1)]), LanguageTag::Cxx),
        ]);

        assert_eq!(set.len(), 1);
        let file = set.get(&header).unwrap();
        assert_eq!(file.hits.line_count(10), 3);
        assert_eq!(file.hits.line_count(11), 1);
        assert_eq!(
            file.languages.iter().copied().collect::<Vec<_>>(),
            vec![LanguageTag::Rust, LanguageTag::Cxx]
        );
    }

    #[test]
    fn test_generated_identity_picks_smallest_rendering() {
        let a = path("fbcode/ffff0000/pkg/__t__/out/generated.cc").with_volatile_segment(1);
        let b = path("fbcode/0000ffff/pkg/__t__/out/generated.cc").with_volatile_segment(1);

        let ab = CoverageSet::aggregate([
            (a.clone(), hits(&[(1, 1)]), LanguageTag::Cxx),
            (b.clone(), hits(&[(1, 1)]), LanguageTag::Cxx),
        ]);
        let ba = CoverageSet::aggregate([
            (b, hits(&[(1, 1)]), LanguageTag::Cxx),
            (a, hits(&[(1, 1)]), LanguageTag::Cxx),
        ]);

        assert_eq!(ab.len(), 1);
        let rendered: Vec<String> = ab.iter().map(|f| f.logical_path.to_string()).collect();
        let rendered_rev: Vec<String> = ba.iter().map(|f| f.logical_path.to_string()).collect();
        assert_eq!(rendered, vec!["fbcode/0000ffff/pkg/__t__/out/generated.cc"]);
        assert_eq!(rendered, rendered_rev);
    }

    #[test]
    fn test_partial_sets_reduce() {
        let left = CoverageSet::aggregate([(path("fbcode/a.rs"), hits(&[(1, 1)]), LanguageTag::Rust)]);
        let right = CoverageSet::aggregate([
            (path("fbcode/a.rs"), hits(&[(1, 1)]), LanguageTag::Rust),
            (path("fbcode/b.rs"), hits(&[(2, 1)]), LanguageTag::Rust),
        ]);
        let merged = left.merge(right);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get(&path("fbcode/a.rs")).unwrap().hits.line_count(1), 2);
    }

    #[test]
    fn test_empty_summary_is_still_recorded() {
        let set = CoverageSet::aggregate([(path("fbcode/a.rs"), HitSummary::new(), LanguageTag::Rust)]);
        assert!(set.contains(&path("fbcode/a.rs")));
        assert!(set.get(&path("fbcode/a.rs")).unwrap().hits.is_empty());
    }
}
