//! Covscope: Coverage Collection and Scoping for Build/Test Systems
//!
//! A test run leaves raw coverage artifacts behind, one per toolchain: LLVM
//! export JSON for Rust, gcov JSON for C/C++, LCOV tracefiles for the rest.
//! Covscope reads them, maps every compiler-emitted path to a stable
//! repository-relative identity, merges facts from different toolchains, and
//! writes only the files the caller asked about.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    COVSCOPE Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Manifest   │    │ Profile    │    │ Path       │            │
//! │   │ (JSON)     │───►│ Readers    │───►│ Normalizer │            │
//! │   │            │    │ (rayon)    │    │ (memoized) │            │
//! │   └─────┬──────┘    └────────────┘    └─────┬──────┘            │
//! │         │                                   ▼                   │
//! │         │ edges     ┌────────────┐    ┌────────────┐            │
//! │         └──────────►│ Dependency │    │ Coverage   │            │
//! │                     │ Index      │    │ Set        │            │
//! │                     └─────┬──────┘    └─────┬──────┘            │
//! │                           ▼                 ▼                   │
//! │                     ┌────────────────────────────┐              │
//! │   scope tokens ────►│ Scope Filter ──► JSON Lines│              │
//! │                     └────────────────────────────┘              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use covscope::{CancellationToken, CoverageEngine, EngineConfig, Manifest, OutputSink, SinkMode};
//!
//! let engine = CoverageEngine::new(EngineConfig::builder().project_root("/repo").build())?;
//! let manifest = Manifest::from_path("coverage-manifest.json".as_ref())?;
//! let outcome = engine.run(
//!     manifest,
//!     &["testing_frameworks/code_coverage/rust"],
//!     &OutputSink::file("coverage.jsonl", SinkMode::Truncate),
//!     &CancellationToken::new(),
//! )?;
//! println!("{} files", outcome.records_emitted);
//! # Ok::<(), covscope::CovscopeError>(())
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod aggregate;
mod config;
#[allow(clippy::missing_errors_doc)]
mod deps;
#[allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]
mod engine;
mod jidoka;
#[allow(clippy::missing_errors_doc)]
mod manifest;
#[allow(clippy::missing_errors_doc, clippy::option_if_let_else)]
mod normalize;
mod path;
/// Raw profile decoders
#[allow(clippy::missing_errors_doc)]
pub mod readers;
mod result;
#[allow(clippy::missing_errors_doc)]
mod scope;
mod sink;

#[cfg(test)]
mod tests;

pub use aggregate::{CoverageSet, CoveredFile, HitSummary};
pub use config::{
    EngineConfig, EngineConfigBuilder, NormalizerConfig, RemapPrefix, DEFAULT_GENERATED_PATTERN,
    DEFAULT_HEADER_EXTENSIONS, DEFAULT_OUTPUT_ROOT, DEFAULT_ROOT_MARKER,
};
pub use deps::{DependencyIndex, DependencyIndexBuilder, EdgeKind, TranslationUnit};
pub use engine::{CancellationToken, CollectionOutcome, CoverageEngine, CoverageSession};
pub use jidoka::{CollectionViolation, JidokaAction, TaintedArtifacts};
pub use manifest::{BuildGraphEdge, Manifest, RawArtifact};
pub use normalize::{GeneratedPatterns, PathNormalizer};
pub use path::{LanguageTag, RepoRelativePath};
pub use readers::{ProfileFormat, ProfileReader, RawRecord, ReaderRegistry};
pub use result::{CovscopeError, CovscopeResult};
pub use scope::{FilterResult, HeaderPolicy, ScopeFilter, ScopeParser, ScopeToken};
pub use sink::{JsonLinesFormatter, OutputSink, SinkMode};
