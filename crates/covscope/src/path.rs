//! Logical Paths and Language Tags
//!
//! A [`RepoRelativePath`] is the build-independent identity of a source file.
//! Generated files live under a per-build hash directory; that segment is
//! recorded as *volatile* and masked out of equality, hashing and ordering so
//! the same generated file keeps one identity across builds.

use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Placeholder used for the volatile segment in identity keys
const VOLATILE_MASK: &str = "*";

/// Repository-root-relative logical path
///
/// Always non-empty; the first segment is the repository root marker once the
/// path has gone through the normalizer.
#[derive(Debug, Clone)]
pub struct RepoRelativePath {
    segments: Vec<String>,
    volatile: Option<usize>,
}

impl RepoRelativePath {
    /// Parse a forward-slash path, ignoring empty and `.` segments
    ///
    /// Returns `None` when no segment remains.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .map(String::from)
            .collect();
        Self::from_segments(segments)
    }

    /// Build a path from already-split segments
    #[must_use]
    pub fn from_segments(segments: Vec<String>) -> Option<Self> {
        if segments.is_empty() {
            return None;
        }
        Some(Self {
            segments,
            volatile: None,
        })
    }

    /// Mark the segment at `index` as volatile
    ///
    /// Out-of-range indices leave the path unchanged.
    #[must_use]
    pub fn with_volatile_segment(mut self, index: usize) -> Self {
        if index < self.segments.len() {
            self.volatile = Some(index);
        }
        self
    }

    /// All segments, including the physical volatile segment
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Index of the volatile segment, if any
    #[must_use]
    pub fn volatile_index(&self) -> Option<usize> {
        self.volatile
    }

    /// Whether this path was recognized as generated code
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.volatile.is_some()
    }

    /// Segments with the volatile one masked
    pub fn identity_segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments.iter().enumerate().map(|(i, s)| {
            if Some(i) == self.volatile {
                VOLATILE_MASK
            } else {
                s.as_str()
            }
        })
    }

    /// Segments with the volatile one skipped (the package view)
    pub fn package_segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != self.volatile)
            .map(|(_, s)| s.as_str())
    }

    /// Stable identity key, e.g. `fbcode/*/pkg/__t__/out/generated.cc`
    #[must_use]
    pub fn identity_key(&self) -> String {
        self.identity_segments().collect::<Vec<_>>().join("/")
    }

    /// Segment-wise prefix test on the package view
    ///
    /// `fbcode/buck2/tests` matches `fbcode/buck2/tests/foo.rs` but not
    /// `fbcode/buck2/testsXYZ/foo.rs`.
    #[must_use]
    pub fn starts_with_segments<S: AsRef<str>>(&self, prefix: &[S]) -> bool {
        let mut own = self.package_segments();
        prefix
            .iter()
            .all(|p| own.next().is_some_and(|s| s == p.as_ref()))
    }

    /// Final segment
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Extension of the final segment, without the dot
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext)
    }
}

impl fmt::Display for RepoRelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl PartialEq for RepoRelativePath {
    fn eq(&self, other: &Self) -> bool {
        self.identity_segments().eq(other.identity_segments())
    }
}

impl Eq for RepoRelativePath {}

impl Hash for RepoRelativePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for segment in self.identity_segments() {
            segment.hash(state);
        }
    }
}

impl PartialOrd for RepoRelativePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RepoRelativePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity_segments().cmp(other.identity_segments())
    }
}

impl Serialize for RepoRelativePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Source language whose toolchain produced a coverage artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageTag {
    /// Rust (rustc `-C instrument-coverage`)
    Rust,
    /// C++
    #[serde(alias = "cpp", alias = "c++")]
    Cxx,
    /// C
    C,
    /// Go
    Go,
    /// Python
    Python,
}

impl LanguageTag {
    /// Lowercase name as used in manifests and output records
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Cxx => "cxx",
            Self::C => "c",
            Self::Go => "go",
            Self::Python => "python",
        }
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
