//! JSON Lines Output
//!
//! One object per covered file:
//!
//! ```text
//! {"filepath":"fbcode/pkg/Adder.cpp","languages":["cxx"],"lines_hit":4,"lines_instrumented":6,"functions_hit":1}
//! ```
//!
//! The whole document is rendered before the sink is touched, so a failure
//! while rendering never leaves a partial file behind.

use crate::aggregate::CoveredFile;
use crate::path::{LanguageTag, RepoRelativePath};
use crate::result::{CovscopeError, CovscopeResult};
use crate::scope::FilterResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// How a file sink treats existing content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkMode {
    /// Atomically replace the file
    #[default]
    Truncate,
    /// Add to the end of the file in a single write
    Append,
}

/// Where records go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    /// A file on disk
    File {
        /// Target path
        path: PathBuf,
        /// Write mode
        mode: SinkMode,
    },
    /// Standard output
    Stdout,
}

impl OutputSink {
    /// File sink
    #[must_use]
    pub fn file(path: impl Into<PathBuf>, mode: SinkMode) -> Self {
        Self::File {
            path: path.into(),
            mode,
        }
    }

    /// Label for logs and errors
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::File { path, .. } => path.display().to_string(),
            Self::Stdout => "<stdout>".to_string(),
        }
    }
}

/// One output line
#[derive(Debug, Serialize)]
struct OutputRecord<'a> {
    filepath: &'a RepoRelativePath,
    languages: &'a BTreeSet<LanguageTag>,
    lines_hit: usize,
    lines_instrumented: usize,
    functions_hit: usize,
}

impl<'a> From<&'a CoveredFile> for OutputRecord<'a> {
    fn from(file: &'a CoveredFile) -> Self {
        Self {
            filepath: &file.logical_path,
            languages: &file.languages,
            lines_hit: file.hits.lines_hit(),
            lines_instrumented: file.hits.lines_instrumented(),
            functions_hit: file.hits.functions_hit(),
        }
    }
}

/// JSON Lines generator
#[derive(Debug)]
pub struct JsonLinesFormatter<'a> {
    result: &'a FilterResult,
}

impl<'a> JsonLinesFormatter<'a> {
    /// Create a formatter over scoped coverage
    #[must_use]
    pub fn new(result: &'a FilterResult) -> Self {
        Self { result }
    }

    /// Render every record, one per line, in logical path order
    pub fn generate(&self) -> CovscopeResult<String> {
        let mut output = String::new();
        for file in self.result.iter() {
            output.push_str(&serde_json::to_string(&OutputRecord::from(file))?);
            output.push('\n');
        }
        Ok(output)
    }

    /// Render then write to a stream
    ///
    /// # Errors
    ///
    /// Returns `SinkWrite` if the stream rejects the write
    pub fn write_to<W: Write>(&self, writer: &mut W, label: &str) -> CovscopeResult<()> {
        let content = self.generate()?;
        writer
            .write_all(content.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| CovscopeError::sink(label, e.to_string()))
    }

    /// Render then write to a file
    ///
    /// `Truncate` replaces the file atomically. The replacement keeps the
    /// permissions of the file it replaces; a new file gets the mode a plain
    /// create would (0666 less the umask on Unix).
    ///
    /// # Errors
    ///
    /// Returns `SinkWrite` if the file cannot be created or written
    pub fn save(&self, path: &Path, mode: SinkMode) -> CovscopeResult<()> {
        let content = self.generate()?;
        let label = path.display().to_string();
        let fail = |e: std::io::Error| CovscopeError::sink(label.clone(), e.to_string());

        match mode {
            SinkMode::Truncate => {
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let mut builder = tempfile::Builder::new();
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let _ = builder.permissions(std::fs::Permissions::from_mode(0o666));
                }
                let mut tmp = builder.tempfile_in(dir).map_err(fail)?;
                if let Ok(existing) = std::fs::metadata(path) {
                    tmp.as_file()
                        .set_permissions(existing.permissions())
                        .map_err(fail)?;
                }
                tmp.write_all(content.as_bytes()).map_err(fail)?;
                let _ = tmp.persist(path).map_err(|e| fail(e.error))?;
            }
            SinkMode::Append => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(fail)?;
                file.write_all(content.as_bytes()).map_err(fail)?;
            }
        }
        Ok(())
    }

    /// Write to any sink
    pub fn emit(&self, sink: &OutputSink) -> CovscopeResult<()> {
        match sink {
            OutputSink::File { path, mode } => self.save(path, *mode),
            OutputSink::Stdout => {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                self.write_to(&mut lock, "<stdout>")
            }
        }
    }

    /// Number of records that will be written
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.result.len()
    }
}
