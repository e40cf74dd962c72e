//! Dependency Index
//!
//! Built once per invocation from build-graph edges supplied by the build
//! executor. Answers "which translation units depend on this file", which the
//! scope filter uses to expand a header token to the compiled units (and their
//! generated bridge code) that include it.
//!
//! The index is assembled by a consuming [`DependencyIndexBuilder`]; only the
//! finished, immutable [`DependencyIndex`] is ever handed out.

use crate::path::RepoRelativePath;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Relation between a translation unit and a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// The unit compiles the file directly (`.cpp`, `.rs`, generated `.cc`)
    Compiles,
    /// The unit includes the file (headers)
    Includes,
    /// A bridge/binding generator consumed the file to produce the unit's code
    GeneratedFrom,
}

/// One compiled output and the files that contributed to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    /// Build-graph identifier of the compiled artifact
    pub output_artifact_id: String,
    /// Every contributing file: compiled sources and included headers
    pub source_files: BTreeSet<RepoRelativePath>,
    /// Files the unit compiles directly
    pub compiled: BTreeSet<RepoRelativePath>,
    /// Generator inputs, when the unit's code is generated
    pub generated_from: Option<BTreeSet<RepoRelativePath>>,
}

impl TranslationUnit {
    fn new(output_artifact_id: &str) -> Self {
        Self {
            output_artifact_id: output_artifact_id.to_string(),
            source_files: BTreeSet::new(),
            compiled: BTreeSet::new(),
            generated_from: None,
        }
    }

    /// Whether `path` contributed to this unit in any role
    #[must_use]
    pub fn depends_on(&self, path: &RepoRelativePath) -> bool {
        self.source_files.contains(path)
            || self
                .generated_from
                .as_ref()
                .is_some_and(|inputs| inputs.contains(path))
    }
}

/// Accumulates edges; [`build`](Self::build) publishes the index
#[derive(Debug, Default)]
pub struct DependencyIndexBuilder {
    units: BTreeMap<String, TranslationUnit>,
}

impl DependencyIndexBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `unit` relates to `path`
    pub fn add_edge(&mut self, unit: &str, path: RepoRelativePath, kind: EdgeKind) {
        let entry = self
            .units
            .entry(unit.to_string())
            .or_insert_with(|| TranslationUnit::new(unit));
        match kind {
            EdgeKind::Compiles => {
                let _ = entry.compiled.insert(path.clone());
                let _ = entry.source_files.insert(path);
            }
            EdgeKind::Includes => {
                let _ = entry.source_files.insert(path);
            }
            EdgeKind::GeneratedFrom => {
                let _ = entry.generated_from.get_or_insert_with(BTreeSet::new).insert(path);
            }
        }
    }

    /// Chaining form of [`add_edge`](Self::add_edge)
    #[must_use]
    pub fn edge(mut self, unit: &str, path: RepoRelativePath, kind: EdgeKind) -> Self {
        self.add_edge(unit, path, kind);
        self
    }

    /// Finish construction
    #[must_use]
    pub fn build(self) -> DependencyIndex {
        let mut dependents: BTreeMap<RepoRelativePath, BTreeSet<String>> = BTreeMap::new();
        for unit in self.units.values() {
            let inputs = unit.generated_from.iter().flatten();
            for path in unit.source_files.iter().chain(inputs) {
                let _ = dependents
                    .entry(path.clone())
                    .or_default()
                    .insert(unit.output_artifact_id.clone());
            }
        }
        DependencyIndex {
            units: self.units,
            dependents,
        }
    }
}

/// Read-only map from files to the translation units that depend on them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyIndex {
    units: BTreeMap<String, TranslationUnit>,
    dependents: BTreeMap<RepoRelativePath, BTreeSet<String>>,
}

impl DependencyIndex {
    /// Start building an index
    #[must_use]
    pub fn builder() -> DependencyIndexBuilder {
        DependencyIndexBuilder::new()
    }

    /// Units whose sources or generator inputs contain `path`, ordered by id
    #[must_use]
    pub fn units_depending_on(&self, path: &RepoRelativePath) -> Vec<&TranslationUnit> {
        self.dependents
            .get(path)
            .into_iter()
            .flatten()
            .filter_map(|id| self.units.get(id))
            .collect()
    }

    /// Compiled files reachable from `path` within `hops` dependency hops
    ///
    /// Hop 1 yields the files compiled by units depending on `path`; each
    /// further hop repeats the query for files reached in the previous hop.
    /// `path` itself is not part of the result unless a unit compiles it.
    #[must_use]
    pub fn expand(&self, path: &RepoRelativePath, hops: usize) -> BTreeSet<RepoRelativePath> {
        let mut reached = BTreeSet::new();
        let mut visited = BTreeSet::from([path.clone()]);
        let mut frontier = vec![path.clone()];

        for _ in 0..hops {
            let mut next = Vec::new();
            for file in &frontier {
                for unit in self.units_depending_on(file) {
                    for compiled in &unit.compiled {
                        let _ = reached.insert(compiled.clone());
                        if visited.insert(compiled.clone()) {
                            next.push(compiled.clone());
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        reached
    }

    /// Unit by artifact id
    #[must_use]
    pub fn unit(&self, output_artifact_id: &str) -> Option<&TranslationUnit> {
        self.units.get(output_artifact_id)
    }

    /// All units ordered by id
    pub fn units(&self) -> impl Iterator<Item = &TranslationUnit> {
        self.units.values()
    }

    /// Number of units
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the index has no units
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
