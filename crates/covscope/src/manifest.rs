//! Coverage Manifest
//!
//! Per-invocation input from the build executor: which raw artifacts the test
//! run produced, and the build-graph edges needed for header expansion.
//!
//! ```json
//! {
//!   "target_label": "fbcode//pkg:adder_test",
//!   "raw_artifacts": [{"path": "cov/adder.json", "language": "rust"}],
//!   "build_graph_edges": [{"unit": "adder.o", "path": "fbcode/pkg/Adder.cpp", "kind": "compiles"}]
//! }
//! ```

use crate::deps::EdgeKind;
use crate::path::LanguageTag;
use crate::readers::ProfileFormat;
use crate::result::{CovscopeError, CovscopeResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One coverage artifact written by the test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawArtifact {
    /// Location on disk, absolute or relative to the project root
    pub path: PathBuf,
    /// Toolchain that produced it
    pub language: LanguageTag,
    /// Encoding; defaults per language when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ProfileFormat>,
}

impl RawArtifact {
    /// Create an artifact entry with the language's default format
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, language: LanguageTag) -> Self {
        Self {
            path: path.into(),
            language,
            format: None,
        }
    }

    /// Override the encoding
    #[must_use]
    pub fn with_format(mut self, format: ProfileFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Encoding to decode with
    #[must_use]
    pub fn effective_format(&self) -> ProfileFormat {
        self.format
            .unwrap_or_else(|| ProfileFormat::default_for(self.language))
    }
}

/// One `unit → file` relation from the build graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildGraphEdge {
    /// Compiled artifact id
    pub unit: String,
    /// Raw path of the related file
    pub path: String,
    /// Relation
    pub kind: EdgeKind,
}

/// Per-invocation coverage manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Build target under test
    pub target_label: String,
    /// Artifacts to read; may be empty
    pub raw_artifacts: Vec<RawArtifact>,
    /// Edges for header expansion; may be empty
    pub build_graph_edges: Vec<BuildGraphEdge>,
}

impl Manifest {
    /// Create a manifest with no artifacts or edges
    #[must_use]
    pub fn new(target_label: impl Into<String>) -> Self {
        Self {
            target_label: target_label.into(),
            raw_artifacts: Vec::new(),
            build_graph_edges: Vec::new(),
        }
    }

    /// Add an artifact
    #[must_use]
    pub fn artifact(mut self, artifact: RawArtifact) -> Self {
        self.raw_artifacts.push(artifact);
        self
    }

    /// Add a build-graph edge
    #[must_use]
    pub fn edge(mut self, unit: impl Into<String>, path: impl Into<String>, kind: EdgeKind) -> Self {
        self.build_graph_edges.push(BuildGraphEdge {
            unit: unit.into(),
            path: path.into(),
            kind,
        });
        self
    }

    /// Parse and validate a JSON manifest
    ///
    /// # Errors
    ///
    /// Returns `ManifestMalformed` for invalid JSON, missing keys, or empty
    /// required values
    pub fn from_json_str(json: &str) -> CovscopeResult<Self> {
        let manifest: Self =
            serde_json::from_str(json).map_err(|e| CovscopeError::manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load and validate a JSON manifest file
    pub fn from_path(path: &Path) -> CovscopeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CovscopeError::manifest(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&content)
    }

    /// Check the structural rules serde cannot express
    pub fn validate(&self) -> CovscopeResult<()> {
        if self.target_label.trim().is_empty() {
            return Err(CovscopeError::manifest("target_label is empty"));
        }
        if let Some(idx) = self
            .raw_artifacts
            .iter()
            .position(|a| a.path.as_os_str().is_empty())
        {
            return Err(CovscopeError::manifest(format!(
                "raw_artifacts[{idx}] has an empty path"
            )));
        }
        if let Some(idx) = self
            .build_graph_edges
            .iter()
            .position(|e| e.unit.is_empty() || e.path.is_empty())
        {
            return Err(CovscopeError::manifest(format!(
                "build_graph_edges[{idx}] needs a unit and a path"
            )));
        }
        Ok(())
    }
}
