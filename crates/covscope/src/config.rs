//! Engine Configuration
//!
//! Loaded from YAML or assembled with [`EngineConfig::builder`]. Validation
//! happens once, when the engine is constructed.

use crate::result::{CovscopeError, CovscopeResult};
use crate::sink::SinkMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Repository root marker used by the default layout
pub const DEFAULT_ROOT_MARKER: &str = "fbcode";

/// Build output root, relative to the project root
pub const DEFAULT_OUTPUT_ROOT: &str = "buck-out/v2/gen";

/// Generated code: `<cell>/<config hash>/<package>/__<target>__/<file>`
pub const DEFAULT_GENERATED_PATTERN: &str =
    r"^(?P<cell>[^/]+)/(?P<volatile>[0-9a-f]{8,40})/(?P<rest>(?:[^/]+/)*__[^/]+__/.+)$";

/// Extensions treated as headers by the scope filter
pub const DEFAULT_HEADER_EXTENSIONS: &[&str] =
    &["h", "hh", "hpp", "hxx", "h++", "inl", "ipp", "tcc", "cuh"];

/// Rewrite of a raw path prefix, in the manner of `--remap-path-prefix`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapPrefix {
    /// Prefix as emitted by the toolchain
    pub from: String,
    /// Replacement (absolute, or relative to the project root)
    pub to: String,
}

/// Path normalizer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Absolute directory the build runs from
    pub project_root: PathBuf,
    /// Directory under `project_root` that logical paths are rooted at
    pub root_marker: String,
    /// Build output roots, relative to `project_root`
    pub output_roots: Vec<String>,
    /// Prefix rewrites applied before anything else, first match wins
    pub remap_prefixes: Vec<RemapPrefix>,
    /// Regexes with `cell`, `volatile` and `rest` groups recognizing generated code
    pub generated_patterns: Vec<String>,
    /// Resolve staged/symlinked copies under output roots to their source
    pub resolve_symlinks: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::new(),
            root_marker: DEFAULT_ROOT_MARKER.to_string(),
            output_roots: vec![DEFAULT_OUTPUT_ROOT.to_string()],
            remap_prefixes: Vec::new(),
            generated_patterns: vec![DEFAULT_GENERATED_PATTERN.to_string()],
            resolve_symlinks: true,
        }
    }
}

/// Coverage engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path normalizer settings
    pub normalizer: NormalizerConfig,
    /// File extensions that trigger header expansion
    pub header_extensions: Vec<String>,
    /// Dependency hops followed by header expansion (at least 1)
    pub header_hops: usize,
    /// Worker threads for artifact decoding (0 = available cores)
    pub workers: usize,
    /// How the output file is written
    pub sink_mode: SinkMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            normalizer: NormalizerConfig::default(),
            header_extensions: DEFAULT_HEADER_EXTENSIONS
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
            header_hops: 1,
            workers: 0,
            sink_mode: SinkMode::Truncate,
        }
    }
}

impl EngineConfig {
    /// Create a builder for engine config
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> CovscopeResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a YAML file
    pub fn from_yaml_file(path: &Path) -> CovscopeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CovscopeError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Check invariants the engine relies on
    pub fn validate(&self) -> CovscopeResult<()> {
        let n = &self.normalizer;
        if !n.project_root.is_absolute() {
            return Err(CovscopeError::config(format!(
                "project_root must be absolute, got {:?}",
                n.project_root
            )));
        }
        if n.root_marker.is_empty() || n.root_marker.contains('/') {
            return Err(CovscopeError::config(
                "root_marker must be a single non-empty path segment",
            ));
        }
        if n.output_roots.iter().any(|r| r.starts_with('/') || r.trim_matches('/').is_empty()) {
            return Err(CovscopeError::config(
                "output_roots must be non-empty paths relative to project_root",
            ));
        }
        if self.header_hops == 0 {
            return Err(CovscopeError::config("header_hops must be at least 1"));
        }
        Ok(())
    }

    /// Number of worker threads to spawn
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
    }
}

/// Builder for engine configuration
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the project root
    #[must_use]
    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.normalizer.project_root = root.into();
        self
    }

    /// Set the repository root marker
    #[must_use]
    pub fn root_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.normalizer.root_marker = marker.into();
        self
    }

    /// Add a build output root
    #[must_use]
    pub fn output_root(mut self, root: impl Into<String>) -> Self {
        self.config.normalizer.output_roots.push(root.into());
        self
    }

    /// Add a prefix rewrite
    #[must_use]
    pub fn remap_prefix(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.config.normalizer.remap_prefixes.push(RemapPrefix {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Add a generated-code pattern
    #[must_use]
    pub fn generated_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.normalizer.generated_patterns.push(pattern.into());
        self
    }

    /// Enable symlink resolution under output roots
    #[must_use]
    pub fn resolve_symlinks(mut self, enabled: bool) -> Self {
        self.config.normalizer.resolve_symlinks = enabled;
        self
    }

    /// Add a header extension
    #[must_use]
    pub fn header_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.header_extensions.push(ext.into());
        self
    }

    /// Set header expansion depth
    #[must_use]
    pub fn header_hops(mut self, hops: usize) -> Self {
        self.config.header_hops = hops;
        self
    }

    /// Set worker thread count
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set sink mode
    #[must_use]
    pub fn sink_mode(mut self, mode: SinkMode) -> Self {
        self.config.sink_mode = mode;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config
    }
}
