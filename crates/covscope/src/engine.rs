//! Coverage Engine
//!
//! The engine holds everything derived from configuration (normalizer,
//! readers, scope parser, worker pool) and is shared by invocations. Each
//! invocation gets its own [`CoverageSession`], so concurrent invocations
//! share no mutable state.
//!
//! ```text
//! manifest ──► begin_session ──► collect ──► scope ──► emit
//!              (index built)    (rayon)     (filter)  (sink)
//! ```

use crate::aggregate::CoverageSet;
use crate::config::EngineConfig;
use crate::deps::DependencyIndex;
use crate::jidoka::{CollectionViolation, JidokaAction, TaintedArtifacts};
use crate::manifest::{Manifest, RawArtifact};
use crate::normalize::PathNormalizer;
use crate::path::RepoRelativePath;
use crate::readers::ReaderRegistry;
use crate::result::{CovscopeError, CovscopeResult};
use crate::scope::{FilterResult, HeaderPolicy, ScopeFilter, ScopeParser, ScopeToken};
use crate::sink::{JsonLinesFormatter, OutputSink};
use dashmap::DashMap;
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Shared cancellation flag for one invocation
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create an uncancelled token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self) -> CovscopeResult<()> {
        if self.is_cancelled() {
            return Err(CovscopeError::Cancelled);
        }
        Ok(())
    }
}

/// Summary of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionOutcome {
    /// Invocation id, also attached to every log line
    pub invocation_id: Uuid,
    /// Target under test
    pub target_label: String,
    /// Artifacts decoded successfully
    pub artifacts_read: usize,
    /// Artifacts skipped after a decode failure
    pub artifacts_skipped: usize,
    /// Records dropped because their path is outside the repository
    pub unresolved_dropped: usize,
    /// Lines written to the sink
    pub records_emitted: usize,
}

/// Configured coverage engine
#[derive(Debug)]
pub struct CoverageEngine {
    config: EngineConfig,
    normalizer: PathNormalizer,
    readers: ReaderRegistry,
    parser: ScopeParser,
    headers: HeaderPolicy,
    pool: rayon::ThreadPool,
}

impl CoverageEngine {
    /// Validate configuration and set up the worker pool
    ///
    /// # Errors
    ///
    /// Returns `Config` for invalid settings
    pub fn new(config: EngineConfig) -> CovscopeResult<Self> {
        config.validate()?;
        let normalizer = PathNormalizer::new(&config.normalizer)?;
        let headers = HeaderPolicy::new(&config.header_extensions, config.header_hops);
        let parser = ScopeParser::new(normalizer.root_marker(), &headers)
            .with_generated_patterns(normalizer.generated_patterns());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.effective_workers())
            .thread_name(|i| format!("covscope-{i}"))
            .build()
            .map_err(|e| CovscopeError::config(format!("cannot start worker pool: {e}")))?;

        Ok(Self {
            config,
            normalizer,
            readers: ReaderRegistry::standard(),
            parser,
            headers,
            pool,
        })
    }

    /// Replace the reader registry
    #[must_use]
    pub fn with_readers(mut self, readers: ReaderRegistry) -> Self {
        self.readers = readers;
        self
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse user scope strings
    ///
    /// # Errors
    ///
    /// Returns `InvalidScopeToken` for the first token that cannot be parsed
    pub fn parse_scope<S: AsRef<str>>(&self, tokens: &[S]) -> CovscopeResult<Vec<ScopeToken>> {
        self.parser.parse_all(tokens)
    }

    /// Validate a manifest and build its dependency index
    ///
    /// # Errors
    ///
    /// Returns `ManifestMalformed` if the manifest is structurally invalid
    pub fn begin_session(&self, manifest: Manifest) -> CovscopeResult<CoverageSession<'_>> {
        manifest.validate()?;
        let mut session = CoverageSession {
            engine: self,
            id: Uuid::new_v4(),
            manifest,
            index: DependencyIndex::default(),
            cache: DashMap::new(),
            covered: CoverageSet::new(),
            ledger: TaintedArtifacts::new(),
            artifacts_read: 0,
            collected: false,
        };
        session.index = session.build_index();
        debug!(
            invocation = %session.id,
            units = session.index.len(),
            "dependency index published"
        );
        Ok(session)
    }

    /// Collect, scope and emit in one call
    ///
    /// Scope tokens are parsed before anything is read, so an invalid token
    /// fails the invocation without touching the sink.
    pub fn run<S: AsRef<str>>(
        &self,
        manifest: Manifest,
        tokens: &[S],
        sink: &OutputSink,
        cancel: &CancellationToken,
    ) -> CovscopeResult<CollectionOutcome> {
        let tokens = self.parse_scope(tokens)?;
        let mut session = self.begin_session(manifest)?;
        let span = info_span!(
            "coverage",
            invocation = %session.id(),
            label = %session.manifest.target_label
        );
        let _guard = span.enter();

        let _ = session.collect(cancel)?;
        let result = session.scope(&tokens);
        let emitted = session.emit(&result, sink, cancel)?;
        let outcome = session.outcome(emitted);
        info!(
            artifacts_read = outcome.artifacts_read,
            artifacts_skipped = outcome.artifacts_skipped,
            unresolved_dropped = outcome.unresolved_dropped,
            records = outcome.records_emitted,
            sink = %sink.describe(),
            "coverage written"
        );
        Ok(outcome)
    }
}

/// Per-artifact result, reduced on the calling thread
#[derive(Debug, Default)]
struct ArtifactOutcome {
    covered: CoverageSet,
    violations: Vec<CollectionViolation>,
    decoded: bool,
}

/// Accumulator for one invocation
#[derive(Debug)]
pub struct CoverageSession<'e> {
    engine: &'e CoverageEngine,
    id: Uuid,
    manifest: Manifest,
    index: DependencyIndex,
    cache: DashMap<String, Option<RepoRelativePath>>,
    covered: CoverageSet,
    ledger: TaintedArtifacts,
    artifacts_read: usize,
    collected: bool,
}

impl CoverageSession<'_> {
    /// Invocation id
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Manifest this session was started with
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Dependency index built from the manifest's edges
    #[must_use]
    pub fn index(&self) -> &DependencyIndex {
        &self.index
    }

    /// Coverage aggregated so far
    #[must_use]
    pub fn covered(&self) -> &CoverageSet {
        &self.covered
    }

    /// Recoverable problems seen so far
    #[must_use]
    pub fn diagnostics(&self) -> &TaintedArtifacts {
        &self.ledger
    }

    /// Memoized normalization; safe to call from workers
    fn normalize(&self, raw: &str) -> CovscopeResult<RepoRelativePath> {
        if let Some(cached) = self.cache.get(raw) {
            return cached
                .value()
                .clone()
                .ok_or_else(|| CovscopeError::unresolvable(raw));
        }
        let result = self.engine.normalizer.normalize(raw);
        let _ = self
            .cache
            .insert(raw.to_string(), result.as_ref().ok().cloned());
        result
    }

    fn build_index(&self) -> DependencyIndex {
        let mut builder = DependencyIndex::builder();
        for edge in &self.manifest.build_graph_edges {
            match self.normalize(&edge.path) {
                Ok(path) => builder.add_edge(&edge.unit, path, edge.kind),
                Err(_) => debug!(unit = %edge.unit, path = %edge.path, "dropping unresolvable edge"),
            }
        }
        builder.build()
    }

    fn artifact_path(&self, artifact: &RawArtifact) -> PathBuf {
        if artifact.path.is_absolute() {
            artifact.path.clone()
        } else {
            self.engine.config.normalizer.project_root.join(&artifact.path)
        }
    }

    fn read_artifact(&self, artifact: &RawArtifact) -> ArtifactOutcome {
        let path = self.artifact_path(artifact);
        let label = path.display().to_string();
        let format = artifact.effective_format();
        let mut outcome = ArtifactOutcome::default();

        let Some(reader) = self.engine.readers.get(format) else {
            outcome.violations.push(CollectionViolation::MissingReader {
                artifact: label,
                format: format.to_string(),
            });
            return outcome;
        };

        let records = match reader.decode_file(&path) {
            Ok(records) => records,
            Err(e) => {
                let violation = CollectionViolation::from_error(&label, &e).unwrap_or_else(|| {
                    CollectionViolation::ReaderDecode {
                        artifact: label.clone(),
                        message: e.to_string(),
                    }
                });
                outcome.violations.push(violation);
                return outcome;
            }
        };

        outcome.decoded = true;
        for record in records {
            match self.normalize(&record.raw_path) {
                Ok(logical) => outcome.covered.insert(logical, record.hits, artifact.language),
                Err(e) => {
                    if let Some(violation) = CollectionViolation::from_error(&label, &e) {
                        outcome.violations.push(violation);
                    }
                }
            }
        }
        outcome
    }

    /// Read every artifact in the manifest and aggregate the results
    ///
    /// Artifacts are decoded on the engine's worker pool. Decode failures and
    /// unresolvable paths are logged and recorded in [`diagnostics`](Self::diagnostics);
    /// they never fail the call. Once a collection has succeeded, later calls
    /// return the same set without reading anything again.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if the token fires before every artifact is read
    pub fn collect(&mut self, cancel: &CancellationToken) -> CovscopeResult<&CoverageSet> {
        if self.collected {
            debug!(invocation = %self.id, "artifacts already collected");
            return Ok(&self.covered);
        }
        let this = &*self;
        let partials: Vec<CovscopeResult<ArtifactOutcome>> = this.engine.pool.install(|| {
            this.manifest
                .raw_artifacts
                .par_iter()
                .map(|artifact| {
                    cancel.check()?;
                    Ok(this.read_artifact(artifact))
                })
                .collect()
        });

        let mut covered = CoverageSet::new();
        let mut ledger = TaintedArtifacts::new();
        let mut read = 0;
        for partial in partials {
            let partial = partial?;
            if partial.decoded {
                read += 1;
            }
            for violation in partial.violations {
                match violation.action() {
                    JidokaAction::LogAndContinue => warn!("{}", violation.description()),
                    JidokaAction::Warn => debug!("{}", violation.description()),
                }
                ledger.record(violation);
            }
            covered = covered.merge(partial.covered);
        }

        self.covered = std::mem::take(&mut self.covered).merge(covered);
        self.ledger.merge(ledger);
        self.artifacts_read += read;
        self.collected = true;
        debug!(
            invocation = %self.id,
            files = self.covered.len(),
            artifacts = read,
            "collection finished"
        );
        Ok(&self.covered)
    }

    /// Narrow collected coverage to the given tokens
    #[must_use]
    pub fn scope(&self, tokens: &[ScopeToken]) -> FilterResult {
        ScopeFilter::new(&self.index, &self.engine.headers).filter(&self.covered, tokens)
    }

    /// Write scoped coverage to a sink, returning the number of records
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` without writing if the token has fired, or
    /// `SinkWrite` if the sink cannot be written
    pub fn emit(
        &self,
        result: &FilterResult,
        sink: &OutputSink,
        cancel: &CancellationToken,
    ) -> CovscopeResult<usize> {
        cancel.check()?;
        let formatter = JsonLinesFormatter::new(result);
        formatter.emit(sink)?;
        Ok(formatter.record_count())
    }

    /// Summarize the invocation
    #[must_use]
    pub fn outcome(&self, records_emitted: usize) -> CollectionOutcome {
        CollectionOutcome {
            invocation_id: self.id,
            target_label: self.manifest.target_label.clone(),
            artifacts_read: self.artifacts_read,
            artifacts_skipped: self.ledger.tainted_count(),
            unresolved_dropped: self.ledger.dropped_records(),
            records_emitted,
        }
    }
}
