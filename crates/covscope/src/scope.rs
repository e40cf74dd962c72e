//! Scope Filtering
//!
//! Narrows aggregated coverage to what the caller asked for. Tokens are OR'd:
//!
//! - `PathPrefix(p)`: every file whose logical path starts with the segments of `p`
//! - `ExactPath(f)`: the file `f`; when `f` is a header, also every covered file
//!   compiled by a translation unit that depends on it
//!
//! The result is always a subset of the input. No tokens means no output.

use crate::aggregate::{CoverageSet, CoveredFile};
use crate::deps::DependencyIndex;
use crate::normalize::GeneratedPatterns;
use crate::path::RepoRelativePath;
use crate::result::{CovscopeError, CovscopeResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Extensions that make a token an exact file path (besides headers)
const SOURCE_EXTENSIONS: &[&str] = &[
    "c", "cc", "cpp", "cxx", "c++", "cu", "m", "mm", "rs", "go", "py", "pyx", "swift", "java",
    "kt", "s", "asm", "d", "thrift", "proto",
];

/// One filter criterion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeToken {
    /// Segment-wise prefix, rooted at the repository marker
    PathPrefix(Vec<String>),
    /// A single file
    ExactPath(RepoRelativePath),
}

impl fmt::Display for ScopeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathPrefix(segments) => write!(f, "{}/", segments.join("/")),
            Self::ExactPath(path) => write!(f, "{path}"),
        }
    }
}

/// Which files are headers, and how far header expansion reaches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPolicy {
    extensions: BTreeSet<String>,
    hops: usize,
}

impl HeaderPolicy {
    /// Create a policy; extensions are compared case-insensitively
    #[must_use]
    pub fn new<I, S>(extensions: I, hops: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            hops: hops.max(1),
        }
    }

    /// Whether the path names a header
    #[must_use]
    pub fn is_header(&self, path: &RepoRelativePath) -> bool {
        path.extension()
            .is_some_and(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
    }

    /// Dependency hops followed for a header token
    #[must_use]
    pub fn hops(&self) -> usize {
        self.hops
    }
}

/// Turns user-supplied scope strings into [`ScopeToken`]s
#[derive(Debug, Clone)]
pub struct ScopeParser {
    root_marker: String,
    file_extensions: BTreeSet<String>,
    generated: GeneratedPatterns,
}

impl ScopeParser {
    /// Create a parser; header extensions also mark a token as a file
    #[must_use]
    pub fn new(root_marker: &str, headers: &HeaderPolicy) -> Self {
        let mut file_extensions: BTreeSet<String> =
            SOURCE_EXTENSIONS.iter().map(|e| (*e).to_string()).collect();
        file_extensions.extend(headers.extensions.iter().cloned());
        Self {
            root_marker: root_marker.to_string(),
            file_extensions,
            generated: GeneratedPatterns::default(),
        }
    }

    /// Recognize generated files so an emitted `filepath` can be used as a token
    #[must_use]
    pub fn with_generated_patterns(mut self, generated: &GeneratedPatterns) -> Self {
        self.generated = generated.clone();
        self
    }

    /// Parse one token
    ///
    /// A leading `marker/` or `marker//` is accepted; a trailing `/` forces a
    /// prefix. No glob syntax is recognized.
    pub fn parse(&self, raw: &str) -> CovscopeResult<ScopeToken> {
        let trimmed = raw.trim();
        let force_prefix = trimmed.ends_with('/');
        let without_marker = trimmed
            .strip_prefix(&self.root_marker)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(trimmed);

        let mut segments = vec![self.root_marker.clone()];
        for segment in without_marker.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(CovscopeError::scope_token(raw, "`..` is not allowed"));
                }
                s => segments.push(s.to_string()),
            }
        }
        if segments.len() == 1 {
            return Err(CovscopeError::scope_token(raw, "empty scope"));
        }

        let path = RepoRelativePath::from_segments(segments)
            .ok_or_else(|| CovscopeError::scope_token(raw, "empty scope"))?;
        let is_file = path
            .extension()
            .is_some_and(|ext| self.file_extensions.contains(&ext.to_ascii_lowercase()));

        if is_file && !force_prefix {
            let path = self.generated.recognize(&path.to_string()).unwrap_or(path);
            Ok(ScopeToken::ExactPath(path))
        } else {
            Ok(ScopeToken::PathPrefix(path.segments().to_vec()))
        }
    }

    /// Parse every token, failing on the first invalid one
    pub fn parse_all<S: AsRef<str>>(&self, raw: &[S]) -> CovscopeResult<Vec<ScopeToken>> {
        raw.iter().map(|t| self.parse(t.as_ref())).collect()
    }
}

/// Covered files that satisfied at least one token, ordered by logical path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterResult {
    files: BTreeMap<RepoRelativePath, CoveredFile>,
}

impl FilterResult {
    fn include(&mut self, file: &CoveredFile) {
        if !self.files.contains_key(&file.logical_path) {
            let _ = self.files.insert(file.logical_path.clone(), file.clone());
        }
    }

    /// Matched records
    pub fn iter(&self) -> impl Iterator<Item = &CoveredFile> {
        self.files.values()
    }

    /// Logical paths as emitted, e.g. `fbcode/pkg/Adder.cpp`
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.iter().map(|f| f.logical_path.to_string()).collect()
    }

    /// Whether a file with this identity matched
    #[must_use]
    pub fn contains(&self, path: &RepoRelativePath) -> bool {
        self.files.contains_key(path)
    }

    /// Number of matched files
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing matched
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Evaluates scope tokens against aggregated coverage
#[derive(Debug, Clone, Copy)]
pub struct ScopeFilter<'a> {
    index: &'a DependencyIndex,
    headers: &'a HeaderPolicy,
}

impl<'a> ScopeFilter<'a> {
    /// Create a filter over a published dependency index
    #[must_use]
    pub fn new(index: &'a DependencyIndex, headers: &'a HeaderPolicy) -> Self {
        Self { index, headers }
    }

    /// Union of every token's matches
    #[must_use]
    pub fn filter(&self, covered: &CoverageSet, tokens: &[ScopeToken]) -> FilterResult {
        let mut result = FilterResult::default();
        for token in tokens {
            let before = result.len();
            match token {
                ScopeToken::PathPrefix(prefix) => {
                    for file in covered.iter() {
                        if file.logical_path.starts_with_segments(prefix) {
                            result.include(file);
                        }
                    }
                }
                ScopeToken::ExactPath(path) => {
                    if let Some(file) = covered.get(path) {
                        result.include(file);
                    }
                    if self.headers.is_header(path) {
                        for dependent in self.index.expand(path, self.headers.hops()) {
                            if let Some(file) = covered.get(&dependent) {
                                result.include(file);
                            }
                        }
                    }
                }
            }
            tracing::debug!(token = %token, added = result.len() - before, "scope token evaluated");
        }
        result
    }
}
