//! Per-run metric extraction
//!
//! Each run leaves exactly one output artifact behind: either a free-text
//! training log scanned with a line pattern, or a structured results table
//! with a header row. The two shapes are a tagged strategy so the
//! aggregation layer never cares which trainer produced the data.
//!
//! Log files are located by a glob relative to the run's hyper folder. The
//! glob must match exactly one file; several matches mean the run id was
//! executed more than once and the operator has to clean up first.

mod pattern;
mod table;

pub use pattern::LinePattern;
pub use table::{TableLayout, TableSpec};

use std::fs;
use std::path::{Path, PathBuf};

use globset::GlobBuilder;
use tracing::info;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// One extracted metric reading: epoch index and metric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochValue {
    /// 0-based epoch index.
    pub epoch: u32,
    /// Metric value as recorded (percentage or fraction, never rescaled).
    pub value: f64,
}

/// Strategy for reading the metric of interest out of one run's artifact.
#[derive(Debug)]
pub enum MetricSource {
    /// Free-text log scanned line by line with an anchored pattern.
    Pattern(LinePattern),
    /// Structured table with a header row and a recorded epoch column.
    Table(TableSpec),
}

impl MetricSource {
    /// Extract all (epoch, value) samples from the artifact at `path`.
    ///
    /// An empty result is not an error at this layer; it becomes fatal only
    /// if the whole dataset ends up empty after aggregation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the artifact cannot be read and
    /// [`Error::ResultsTableInvalid`] for a malformed table.
    pub fn extract(&self, path: &Path) -> Result<Vec<EpochValue>> {
        match self {
            Self::Pattern(pattern) => {
                let text = fs::read_to_string(path)?;
                Ok(pattern.scan(&text))
            }
            Self::Table(spec) => spec.read(path),
        }
    }
}

/// Locate the single output artifact of one run.
///
/// `rel_glob` is matched against paths relative to `hyper_dir`; `*` does not
/// cross directory separators. Matches are sorted so the error listing is
/// deterministic.
///
/// # Errors
///
/// Returns [`Error::LogFileNotFound`] when nothing matches and
/// [`Error::AmbiguousLogFiles`] when more than one file does.
pub fn find_log_file(hyper_dir: &Path, rel_glob: &str) -> Result<PathBuf> {
    let matcher = GlobBuilder::new(rel_glob)
        .literal_separator(true)
        .build()?
        .compile_matcher();

    let mut matches: Vec<PathBuf> = WalkDir::new(hyper_dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .strip_prefix(hyper_dir)
                .is_ok_and(|rel| matcher.is_match(rel))
        })
        .map(|entry| entry.into_path())
        .collect();
    matches.sort();

    let pattern = hyper_dir.join(rel_glob).display().to_string();
    match matches.len() {
        0 => Err(Error::LogFileNotFound { pattern }),
        1 => {
            let path = matches.remove(0);
            info!(path = %path.display(), "Reading cout file");
            Ok(path)
        }
        _ => Err(Error::AmbiguousLogFiles {
            pattern,
            paths: matches,
        }),
    }
}
