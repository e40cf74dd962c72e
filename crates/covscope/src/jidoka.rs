//! Soft Jidoka: Log and Continue
//!
//! One bad artifact must not cost the rest of the invocation its coverage.
//! Recoverable problems are classified here, logged, and the artifact they
//! came from is marked as tainted; collection carries on with the others.
//! Fatal conditions (bad manifest, unwritable sink) never reach this ledger,
//! they surface as errors from the engine.

use crate::result::CovscopeError;
use std::collections::BTreeSet;

/// Response to a collection violation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JidokaAction {
    /// Drop the artifact's contribution, keep collecting
    LogAndContinue,
    /// Drop a single record, keep the rest of the artifact
    Warn,
}

/// Recoverable problems seen while collecting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionViolation {
    /// An artifact could not be read or decoded
    ReaderDecode {
        /// Artifact path
        artifact: String,
        /// Decoder message
        message: String,
    },
    /// No reader is registered for the artifact's format
    MissingReader {
        /// Artifact path
        artifact: String,
        /// Requested format
        format: String,
    },
    /// A record's raw path could not be mapped to the repository
    UnresolvablePath {
        /// Artifact the record came from
        artifact: String,
        /// Path as emitted by the toolchain
        raw: String,
    },
}

impl CollectionViolation {
    /// Classify a recoverable engine error raised while handling `artifact`
    ///
    /// Returns `None` for fatal errors.
    #[must_use]
    pub fn from_error(artifact: &str, error: &CovscopeError) -> Option<Self> {
        match error {
            CovscopeError::ReaderDecode { message, .. } => Some(Self::ReaderDecode {
                artifact: artifact.to_string(),
                message: message.clone(),
            }),
            CovscopeError::UnresolvablePath { raw } => Some(Self::UnresolvablePath {
                artifact: artifact.to_string(),
                raw: raw.clone(),
            }),
            _ => None,
        }
    }

    /// Classify violation severity
    #[must_use]
    pub fn action(&self) -> JidokaAction {
        match self {
            Self::ReaderDecode { .. } | Self::MissingReader { .. } => JidokaAction::LogAndContinue,
            Self::UnresolvablePath { .. } => JidokaAction::Warn,
        }
    }

    /// Artifact the violation belongs to
    #[must_use]
    pub fn affected_artifact(&self) -> &str {
        match self {
            Self::ReaderDecode { artifact, .. }
            | Self::MissingReader { artifact, .. }
            | Self::UnresolvablePath { artifact, .. } => artifact,
        }
    }

    /// Get a human-readable description
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::ReaderDecode { artifact, message } => {
                format!("Skipped {artifact}: {message}")
            }
            Self::MissingReader { artifact, format } => {
                format!("Skipped {artifact}: no reader for format {format}")
            }
            Self::UnresolvablePath { artifact, raw } => {
                format!("Dropped {raw} from {artifact}: not a repository path")
            }
        }
    }
}

/// Tainted artifact tracker
///
/// An artifact is tainted when its whole contribution was dropped. Records
/// dropped individually are counted but leave the artifact clean.
#[derive(Debug, Default, Clone)]
pub struct TaintedArtifacts {
    tainted: BTreeSet<String>,
    violations: Vec<CollectionViolation>,
}

impl TaintedArtifacts {
    /// Create a new empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation, tainting its artifact when the whole artifact is lost
    pub fn record(&mut self, violation: CollectionViolation) {
        if violation.action() == JidokaAction::LogAndContinue {
            let _ = self.tainted.insert(violation.affected_artifact().to_string());
        }
        self.violations.push(violation);
    }

    /// Fold another ledger into this one
    pub fn merge(&mut self, other: Self) {
        self.tainted.extend(other.tainted);
        self.violations.extend(other.violations);
    }

    /// Check if an artifact was skipped
    #[must_use]
    pub fn is_tainted(&self, artifact: &str) -> bool {
        self.tainted.contains(artifact)
    }

    /// Number of skipped artifacts
    #[must_use]
    pub fn tainted_count(&self) -> usize {
        self.tainted.len()
    }

    /// Number of records dropped for unresolvable paths
    #[must_use]
    pub fn dropped_records(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.action() == JidokaAction::Warn)
            .count()
    }

    /// Total number of violations
    #[must_use]
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    /// Skipped artifacts in path order
    pub fn tainted_artifacts(&self) -> impl Iterator<Item = &str> {
        self.tainted.iter().map(String::as_str)
    }

    /// All violations in the order they were recorded
    #[must_use]
    pub fn all_violations(&self) -> &[CollectionViolation] {
        &self.violations
    }
}
