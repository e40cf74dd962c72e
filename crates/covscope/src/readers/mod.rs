//! Raw Profile Readers
//!
//! Each toolchain emits coverage in its own structure: source-based region
//! counters (LLVM), basic-block line counters (gcov), or flat tracefiles
//! (LCOV). A [`ProfileReader`] decodes one of them into `(raw path, hits)`
//! pairs so nothing downstream branches on the format.

mod gcov;
mod lcov;
mod llvm;

pub use gcov::GcovJsonReader;
pub use lcov::LcovReader;
pub use llvm::LlvmJsonReader;

use crate::aggregate::HitSummary;
use crate::path::LanguageTag;
use crate::result::{CovscopeError, CovscopeResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// One decoded fact: hits for a file as named by the toolchain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// On-disk path as emitted by the compiler (not yet normalized)
    pub raw_path: String,
    /// Hit facts for that file
    pub hits: HitSummary,
}

impl RawRecord {
    /// Create a record
    #[must_use]
    pub fn new(raw_path: impl Into<String>, hits: HitSummary) -> Self {
        Self {
            raw_path: raw_path.into(),
            hits,
        }
    }
}

/// Coverage artifact format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileFormat {
    /// `llvm-cov export` JSON (region counters)
    LlvmJson,
    /// `gcov --json-format` intermediate JSON (basic-block counters)
    GcovJson,
    /// LCOV tracefile
    Lcov,
}

impl ProfileFormat {
    /// Format assumed when a manifest does not name one
    #[must_use]
    pub const fn default_for(language: LanguageTag) -> Self {
        match language {
            LanguageTag::Rust => Self::LlvmJson,
            LanguageTag::Cxx | LanguageTag::C => Self::GcovJson,
            LanguageTag::Go | LanguageTag::Python => Self::Lcov,
        }
    }
}

impl fmt::Display for ProfileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LlvmJson => "llvm-json",
            Self::GcovJson => "gcov-json",
            Self::Lcov => "lcov",
        };
        f.write_str(name)
    }
}

/// Decoder for one coverage artifact format
pub trait ProfileReader: Send + Sync + fmt::Debug {
    /// Format handled by this reader
    fn format(&self) -> ProfileFormat;

    /// Decode artifact contents; `artifact` names the source in errors
    fn decode(&self, artifact: &str, content: &str) -> CovscopeResult<Vec<RawRecord>>;

    /// Read and decode an artifact from disk
    fn decode_file(&self, path: &Path) -> CovscopeResult<Vec<RawRecord>> {
        let artifact = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CovscopeError::decode(&artifact, e.to_string()))?;
        self.decode(&artifact, &content)
    }
}

/// Readers available to an engine, keyed by format
#[derive(Debug)]
pub struct ReaderRegistry {
    readers: HashMap<ProfileFormat, Box<dyn ProfileReader>>,
}

impl ReaderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn empty() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    /// Registry with the LLVM, gcov and LCOV readers
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .with_reader(LlvmJsonReader)
            .with_reader(GcovJsonReader)
            .with_reader(LcovReader)
    }

    /// Register a reader, replacing any reader for the same format
    #[must_use]
    pub fn with_reader<R: ProfileReader + 'static>(mut self, reader: R) -> Self {
        let _ = self.readers.insert(reader.format(), Box::new(reader));
        self
    }

    /// Reader for a format
    #[must_use]
    pub fn get(&self, format: ProfileFormat) -> Option<&dyn ProfileReader> {
        self.readers
            .get(&format)
            .map(|reader| -> &dyn ProfileReader { reader.as_ref() })
    }

    /// Number of registered readers
    #[must_use]
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    /// Whether no reader is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
