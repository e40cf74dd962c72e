//! Path Normalization
//!
//! Maps a path as emitted by a compiler or instrumentation tool to a stable
//! [`RepoRelativePath`] rooted at the repository root marker.
//!
//! ```text
//! /repo/fbcode/pkg/Adder.cpp                              → fbcode/pkg/Adder.cpp
//! buck-out/v2/gen/fbcode/<hash>/pkg/__t__/out/generated.cc → fbcode/<hash>/pkg/__t__/out/generated.cc
//!                                                            (hash segment volatile)
//! buck-out/v2/gen/fbcode/<hash>/pkg/__t__/srcs/lib.rs      → fbcode/pkg/lib.rs  (symlink resolved)
//! /usr/include/stdio.h                                    → UnresolvablePath
//! ```

use crate::config::NormalizerConfig;
use crate::path::RepoRelativePath;
use crate::result::{CovscopeError, CovscopeResult};
use regex::Regex;
use std::path::PathBuf;

/// Lexically cleaned path
#[derive(Debug, Clone, PartialEq, Eq)]
struct CleanPath {
    absolute: bool,
    segments: Vec<String>,
}

impl CleanPath {
    /// Unify separators and resolve `.`, `..` and empty segments
    fn parse(raw: &str) -> Self {
        let unified = raw.replace('\\', "/");
        let absolute = unified.starts_with('/');
        let mut segments: Vec<String> = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.last().is_some_and(|s| s != "..") {
                        let _ = segments.pop();
                    } else if !absolute {
                        segments.push("..".to_string());
                    }
                }
                s => segments.push(s.to_string()),
            }
        }
        Self { absolute, segments }
    }
}

fn strip_prefix(segments: &[String], prefix: &[String]) -> Option<Vec<String>> {
    segments
        .starts_with(prefix)
        .then(|| segments[prefix.len()..].to_vec())
}

/// Raw path → logical path mapping for one configuration
#[derive(Debug)]
pub struct PathNormalizer {
    project_root: PathBuf,
    root_segments: Vec<String>,
    canonical_root_segments: Option<Vec<String>>,
    root_marker: String,
    output_roots: Vec<Vec<String>>,
    remaps: Vec<(CleanPath, CleanPath)>,
    generated: GeneratedPatterns,
    resolve_symlinks: bool,
}

impl PathNormalizer {
    /// Compile a normalizer from configuration
    pub fn new(config: &NormalizerConfig) -> CovscopeResult<Self> {
        if !config.project_root.is_absolute() {
            return Err(CovscopeError::config("project_root must be absolute"));
        }

        let root_segments = CleanPath::parse(&config.project_root.to_string_lossy()).segments;
        let canonical_root_segments = std::fs::canonicalize(&config.project_root)
            .ok()
            .map(|p| CleanPath::parse(&p.to_string_lossy()).segments)
            .filter(|segs| *segs != root_segments);

        let generated = config
            .generated_patterns
            .iter()
            .map(|pattern| {
                let re = Regex::new(pattern).map_err(|e| {
                    CovscopeError::config(format!("invalid generated pattern {pattern:?}: {e}"))
                })?;
                for group in ["cell", "volatile", "rest"] {
                    if !re.capture_names().flatten().any(|name| name == group) {
                        return Err(CovscopeError::config(format!(
                            "generated pattern {pattern:?} lacks a `{group}` group"
                        )));
                    }
                }
                Ok(re)
            })
            .collect::<CovscopeResult<Vec<_>>>()?;

        Ok(Self {
            project_root: config.project_root.clone(),
            root_segments,
            canonical_root_segments,
            root_marker: config.root_marker.clone(),
            output_roots: config
                .output_roots
                .iter()
                .map(|r| CleanPath::parse(r).segments)
                .collect(),
            remaps: config
                .remap_prefixes
                .iter()
                .map(|r| (CleanPath::parse(&r.from), CleanPath::parse(&r.to)))
                .collect(),
            generated: GeneratedPatterns {
                root_marker: config.root_marker.clone(),
                patterns: generated,
            },
            resolve_symlinks: config.resolve_symlinks,
        })
    }

    /// Repository root marker
    #[must_use]
    pub fn root_marker(&self) -> &str {
        &self.root_marker
    }

    /// Generated-code patterns, for recognizing emitted generated paths
    #[must_use]
    pub const fn generated_patterns(&self) -> &GeneratedPatterns {
        &self.generated
    }

    /// Map a raw toolchain path to its logical path
    ///
    /// # Errors
    ///
    /// Returns [`CovscopeError::UnresolvablePath`] for paths outside the
    /// repository (system headers, sysroots, foreign cells).
    pub fn normalize(&self, raw: &str) -> CovscopeResult<RepoRelativePath> {
        let path = self.remap(CleanPath::parse(raw));
        let relative = if path.absolute {
            self.strip_root(&path.segments)
                .ok_or_else(|| CovscopeError::unresolvable(raw))?
        } else {
            path.segments
        };
        self.resolve_relative(raw, relative)
    }

    fn remap(&self, path: CleanPath) -> CleanPath {
        for (from, to) in &self.remaps {
            if path.absolute == from.absolute && path.segments.starts_with(&from.segments) {
                let mut segments = to.segments.clone();
                segments.extend_from_slice(&path.segments[from.segments.len()..]);
                return CleanPath {
                    absolute: to.absolute,
                    segments,
                };
            }
        }
        path
    }

    fn strip_root(&self, segments: &[String]) -> Option<Vec<String>> {
        strip_prefix(segments, &self.root_segments).or_else(|| {
            self.canonical_root_segments
                .as_deref()
                .and_then(|root| strip_prefix(segments, root))
        })
    }

    fn output_remainder(&self, segments: &[String]) -> Option<Vec<String>> {
        self.output_roots
            .iter()
            .find_map(|root| strip_prefix(segments, root))
    }

    fn source_path(&self, segments: Vec<String>) -> Option<RepoRelativePath> {
        if segments.len() < 2 || segments[0] != self.root_marker {
            return None;
        }
        RepoRelativePath::from_segments(segments)
    }

    fn resolve_relative(&self, raw: &str, segments: Vec<String>) -> CovscopeResult<RepoRelativePath> {
        if segments.first().is_some_and(|s| s == "..") {
            return Err(CovscopeError::unresolvable(raw));
        }

        if let Some(remainder) = self.output_remainder(&segments) {
            if self.resolve_symlinks {
                if let Some(staged) = self.resolve_staged(&segments) {
                    return Ok(staged);
                }
            }
            return self.match_generated(raw, &remainder);
        }

        self.source_path(segments)
            .ok_or_else(|| CovscopeError::unresolvable(raw))
    }

    /// Follow a staged copy under an output root back to the source tree
    fn resolve_staged(&self, segments: &[String]) -> Option<RepoRelativePath> {
        let on_disk = segments
            .iter()
            .fold(self.project_root.clone(), |acc, s| acc.join(s));
        let canonical = std::fs::canonicalize(on_disk).ok()?;
        let relative = self.strip_root(&CleanPath::parse(&canonical.to_string_lossy()).segments)?;
        if self.output_remainder(&relative).is_some() {
            return None;
        }
        self.source_path(relative)
    }

    fn match_generated(&self, raw: &str, remainder: &[String]) -> CovscopeResult<RepoRelativePath> {
        self.generated
            .recognize(&remainder.join("/"))
            .ok_or_else(|| CovscopeError::unresolvable(raw))
    }
}

/// Compiled generated-code patterns bound to one root marker
///
/// Input is a path relative to an output root, or an already emitted logical
/// path: both have the `cell/volatile/rest` shape.
#[derive(Debug, Clone, Default)]
pub struct GeneratedPatterns {
    root_marker: String,
    patterns: Vec<Regex>,
}

impl GeneratedPatterns {
    /// Match `candidate` and mark its volatile segment
    #[must_use]
    pub fn recognize(&self, candidate: &str) -> Option<RepoRelativePath> {
        self.patterns.iter().find_map(|re| {
            let caps = re.captures(candidate)?;
            let (cell, volatile, rest) =
                (caps.name("cell")?, caps.name("volatile")?, caps.name("rest")?);
            if cell.as_str() != self.root_marker {
                return None;
            }
            let mut segments = vec![cell.as_str().to_string(), volatile.as_str().to_string()];
            segments.extend(
                rest.as_str()
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(String::from),
            );
            RepoRelativePath::from_segments(segments).map(|p| p.with_volatile_segment(1))
        })
    }
}
