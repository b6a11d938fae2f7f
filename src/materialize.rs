//! Best-model materialization
//!
//! Once a winner is selected, its checkpoint is copied from the copy-from
//! split's run folder to a well-known "best" location, optionally with
//! stable-named symlinks at the run and set level so downstream consumers
//! never have to know which run won.
//!
//! Poka-Yoke: every filesystem mutation here is followed by an existence
//! post-condition; a failed check exits with the step name and path instead
//! of leaving the operator to diff directory trees.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::SelectionResult;
use crate::error::{Error, Result};
use crate::manifest::HyperKey;

/// How a trainer names its persisted checkpoints inside the hyper folder.
///
/// Some frameworks persist one file per epoch; others keep only the last
/// weights, in which case the selected epoch cannot be resolved to its own
/// file and the export degrades to whatever the framework left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointNaming {
    /// One checkpoint per epoch, `<prefix><epoch><suffix>` with a fixed
    /// digit width. `one_based` shifts the filename index by one relative
    /// to the 0-based internal epoch.
    PerEpoch {
        /// Path prefix relative to the hyper folder, e.g. `stage2/epoch`.
        prefix: String,
        /// Zero-padded width of the epoch number.
        digits: usize,
        /// Filename suffix, e.g. `.pth`.
        suffix: String,
        /// Whether filenames count epochs from 1.
        one_based: bool,
    },
    /// Only the final weights are persisted.
    LastOnly {
        /// Path relative to the hyper folder, e.g. `exp/weights/last.pt`.
        rel_path: String,
    },
}

impl CheckpointNaming {
    /// Checkpoint path relative to the hyper folder for a 0-based `epoch`.
    #[must_use]
    pub fn rel_path(&self, epoch: u32) -> String {
        match self {
            Self::PerEpoch {
                prefix,
                digits,
                suffix,
                one_based,
            } => {
                let n = epoch + u32::from(*one_based);
                format!("{prefix}{n:0width$}{suffix}", width = *digits)
            }
            Self::LastOnly { rel_path } => rel_path.clone(),
        }
    }
}

/// One symlink to (re)create: the link location and its stored target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symlink {
    /// Where the link lives.
    pub link: PathBuf,
    /// What the link stores (usually relative to its own directory).
    pub target: PathBuf,
}

/// Fully resolved paths of one export, produced by the trainer profile.
#[derive(Debug)]
pub struct ExportPaths {
    /// Hyper folder of the copy-from run (source of auxiliary files).
    pub source_hyper_dir: PathBuf,
    /// Checkpoint to copy.
    pub checkpoint: PathBuf,
    /// Final artifact destination.
    pub artifact: PathBuf,
    /// Canonical best directory to recreate fresh; `None` for exports that
    /// drop a named artifact into an existing run/set directory.
    pub canonical_dir: Option<PathBuf>,
    /// Stable-named symlinks to (re)create after the copy.
    pub symlinks: Vec<Symlink>,
}

/// What the materializer did, for the caller's summary.
#[derive(Debug)]
pub struct ExportReport {
    /// Source checkpoint that was copied.
    pub checkpoint: PathBuf,
    /// Where the artifact landed.
    pub artifact: PathBuf,
    /// Symlinks created.
    pub symlinks: Vec<PathBuf>,
    /// Auxiliary flat files copied next to the artifact.
    pub aux_files: usize,
}

#[derive(Serialize)]
struct Provenance<'a> {
    selection: &'a SelectionResult,
    checkpoint: String,
    copied_at: DateTime<Utc>,
}

/// Resolve the copy-from run id of the winning configuration.
///
/// # Errors
///
/// Returns [`Error::BestHyperNotInCopySplit`] when the winner has no entry
/// in the copy-from split and [`Error::InvalidHyperId`] when the manifest id
/// cannot index a `hyperNNN` folder.
pub fn resolve_copy_hyper(
    copy_lookup: &HashMap<HyperKey, String>,
    key: &HyperKey,
    split: &str,
) -> Result<u32> {
    let hyper_id = copy_lookup
        .get(key)
        .ok_or_else(|| Error::BestHyperNotInCopySplit {
            split: split.to_string(),
        })?;
    hyper_id
        .parse::<u32>()
        .map_err(|_| Error::InvalidHyperId {
            hyper_id: hyper_id.clone(),
        })
}

/// Copy the winning checkpoint to its "best" destination and create the
/// profile's symlinks, verifying every mutation.
///
/// # Errors
///
/// Returns [`Error::CheckpointMissing`] when the source checkpoint is
/// absent (nothing is mutated in that case) and
/// [`Error::CopyVerificationFailed`] when a mutation's post-condition does
/// not hold.
pub fn export_best(paths: &ExportPaths, selection: &SelectionResult) -> Result<ExportReport> {
    if !paths.checkpoint.exists() {
        return Err(Error::CheckpointMissing {
            path: paths.checkpoint.clone(),
        });
    }

    if let Some(dir) = &paths.canonical_dir {
        if dir.exists() {
            debug!(dir = %dir.display(), "Previous best existed, recreating it");
            fs::remove_dir_all(dir)?;
        }
    }
    if let Some(parent) = paths.artifact.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::copy(&paths.checkpoint, &paths.artifact)?;
    verify(&paths.artifact, "copy best snapshot")?;

    let mut aux_files = 0;
    if let Some(dir) = &paths.canonical_dir {
        aux_files = copy_aux_files(&paths.source_hyper_dir, dir)?;
        write_provenance(dir, paths, selection)?;
    }

    let mut created_links = Vec::with_capacity(paths.symlinks.len());
    for symlink in &paths.symlinks {
        replace_symlink(symlink)?;
        created_links.push(symlink.link.clone());
    }

    info!(
        from = %paths.checkpoint.display(),
        to = %paths.artifact.display(),
        "Copied the best model"
    );
    Ok(ExportReport {
        checkpoint: paths.checkpoint.clone(),
        artifact: paths.artifact.clone(),
        symlinks: created_links,
        aux_files,
    })
}

fn verify(path: &Path, step: &str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(Error::CopyVerificationFailed {
            step: step.to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// Copy every flat file of the source hyper folder into the best directory
/// so it is self-contained (training configs, metadata).
fn copy_aux_files(source_dir: &Path, dest_dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(source_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let dest = dest_dir.join(entry.file_name());
        fs::copy(entry.path(), &dest)?;
        verify(&dest, "copy auxiliary file")?;
        debug!(file = %dest.display(), "Copied auxiliary file");
        count += 1;
    }
    Ok(count)
}

fn write_provenance(dir: &Path, paths: &ExportPaths, selection: &SelectionResult) -> Result<()> {
    let record = Provenance {
        selection,
        checkpoint: paths.checkpoint.display().to_string(),
        copied_at: Utc::now(),
    };
    let dest = dir.join("provenance.json");
    fs::write(&dest, serde_json::to_string_pretty(&record)?)?;
    verify(&dest, "write provenance record")
}

fn replace_symlink(symlink: &Symlink) -> Result<()> {
    if symlink.link.symlink_metadata().is_ok() {
        fs::remove_file(&symlink.link)?;
        debug!(link = %symlink.link.display(), "Symlink already existed, deleted it");
    }
    make_symlink(&symlink.target, &symlink.link)?;
    verify(&symlink.link, "write symlink")?;
    info!(
        link = %symlink.link.display(),
        target = %symlink.target.display(),
        "Symlinked the best model"
    );
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_symlink(target: &Path, link: &Path) -> Result<()> {
    Err(Error::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!(
            "symlinks are not supported on this platform ({} -> {})",
            link.display(),
            target.display()
        ),
    )))
}
