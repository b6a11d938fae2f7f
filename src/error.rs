//! Error types for escoger
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Every variant is terminal for the invocation: batch logs are static, so
//! there is no retry logic anywhere. Structural errors (missing manifest,
//! empty dataset) surface before any filesystem mutation is attempted.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Escoger error types
#[derive(Error, Debug)]
pub enum Error {
    /// Experiment manifest file does not exist
    #[error("Experiment file not found at: {}", .path.display())]
    ManifestNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// Manifest line could not be parsed
    #[error("Invalid manifest line {line_no}: {message}")]
    InvalidManifest {
        /// 1-based line number in the manifest file
        line_no: usize,
        /// What went wrong with the line
        message: String,
    },

    /// No log file matched the per-run output pattern
    #[error("Output file is not found with pattern:\n\t{pattern}")]
    LogFileNotFound {
        /// Glob pattern that produced no match
        pattern: String,
    },

    /// More than one log file matched the per-run output pattern
    #[error(
        "Several files match pattern '{pattern}':\n\t- {}\nEach run_id is supposed to be run only once. \
         If you ran this run_id several times, delete all but the needed file.",
        .paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join("\n\t- ")
    )]
    AmbiguousLogFiles {
        /// Glob pattern that matched several files
        pattern: String,
        /// All matching paths
        paths: Vec<PathBuf>,
    },

    /// Structured results table is missing an expected column or has a bad cell
    #[error("Invalid results table {}: {message}", .path.display())]
    ResultsTableInvalid {
        /// Path of the offending table
        path: PathBuf,
        /// What is missing or malformed
        message: String,
    },

    /// No metric samples were extracted from any run
    #[error(
        "Dataset is empty: no metric samples were extracted. \
         Check the ignore_splits list and the per-run log files."
    )]
    EmptyDataset,

    /// The winning hyperparameters have no entry in the copy-from split
    #[error("Cant copy the best model - the best hyperparameters are not in split {split}")]
    BestHyperNotInCopySplit {
        /// Name of the copy-from split
        split: String,
    },

    /// Copy-from run id cannot index a checkpoint folder
    #[error("Copy-from run id is not numeric: '{hyper_id}' (checkpoint folders are hyperNNN)")]
    InvalidHyperId {
        /// The offending run id from the manifest
        hyper_id: String,
    },

    /// The checkpoint file for the selected hyperparameters/epoch is absent
    #[error(
        "A snapshot file for the best hyperparameters does not exist at:\n\t{}",
        .path.display()
    )]
    CheckpointMissing {
        /// Resolved checkpoint path
        path: PathBuf,
    },

    /// A copy or symlink step did not pass its existence post-condition
    #[error("Failed to {step}:\n\t{}", .path.display())]
    CopyVerificationFailed {
        /// Which mutation failed verification
        step: String,
        /// Destination that should exist but does not
        path: PathBuf,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Metric pattern failed to compile
    #[error("Metric pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Log file glob failed to compile
    #[error("Log glob error: {0}")]
    Glob(#[from] globset::Error),

    /// Provenance record serialization error
    #[error("Provenance error: {0}")]
    Provenance(#[from] serde_json::Error),
}
