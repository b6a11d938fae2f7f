//! Experiment manifest parsing and split routing
//!
//! A manifest describes every run of a sweep, one `;`-separated line per
//! run: `hyper_id;split;<hyperparameter fields...>`. Blank lines and lines
//! starting with `#` are skipped; file order is preserved (it affects
//! nothing downstream but keeps logs readable next to the file).
//!
//! Two field schemas exist in the wild: classification manifests carry a
//! config name, detection manifests carry a batch-size/learning-rate/epochs
//! triple. The hyperparameter identity used for cross-split aggregation
//! excludes the split (and the epoch count, which is informational only).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Field schema of a manifest line beyond `hyper_id;split;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestSchema {
    /// `hyper_id;split;config_name`
    ConfigName,
    /// `hyper_id;split;batch_size;lr;epochs`
    BatchLr,
}

impl ManifestSchema {
    /// Column names of the hyperparameter identity, in key order.
    ///
    /// These become the leading header columns of the aggregate CSV.
    #[must_use]
    pub const fn key_columns(self) -> &'static [&'static str] {
        match self {
            Self::ConfigName => &["config"],
            Self::BatchLr => &["batch_size", "lr"],
        }
    }
}

/// Hyperparameter identity excluding the split.
///
/// Field values are canonicalized through parse-then-display, so manifests
/// spelling a learning rate `0.010` and `0.01` land on the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HyperKey(Vec<String>);

impl HyperKey {
    /// Create a key from canonical field values.
    #[must_use]
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    /// Canonical field values, in schema key order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for HyperKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Hyperparameters of one manifest entry.
#[derive(Debug, Clone, PartialEq)]
pub enum HyperParams {
    /// Classification: a named training config.
    Config {
        /// Config name, e.g. a config-file prefix.
        name: String,
    },
    /// Detection: numeric batch size and learning rate.
    BatchLr {
        /// Training batch size.
        batch_size: u32,
        /// Learning rate.
        lr: f64,
    },
}

impl HyperParams {
    /// Identity of these hyperparameters, excluding the split.
    #[must_use]
    pub fn key(&self) -> HyperKey {
        match self {
            Self::Config { name } => HyperKey::new(vec![name.clone()]),
            Self::BatchLr { batch_size, lr } => {
                HyperKey::new(vec![batch_size.to_string(), lr.to_string()])
            }
        }
    }
}

/// One parsed manifest line. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    hyper_id: String,
    split: String,
    params: HyperParams,
    epochs: Option<u32>,
}

impl ManifestEntry {
    /// Get the hyperparameter configuration id (verbatim manifest spelling).
    #[must_use]
    pub fn hyper_id(&self) -> &str {
        &self.hyper_id
    }

    /// Get the data split this run trained on.
    #[must_use]
    pub fn split(&self) -> &str {
        &self.split
    }

    /// Get the hyperparameters.
    #[must_use]
    pub const fn params(&self) -> &HyperParams {
        &self.params
    }

    /// Get the declared epoch count, where the schema carries one.
    #[must_use]
    pub const fn epochs(&self) -> Option<u32> {
        self.epochs
    }

    /// Identity of this entry's hyperparameters, excluding the split.
    #[must_use]
    pub fn key(&self) -> HyperKey {
        self.params.key()
    }
}

fn parse_line(line: &str, line_no: usize, schema: ManifestSchema) -> Result<ManifestEntry> {
    let words: Vec<&str> = line.split(';').collect();
    let min_fields = match schema {
        ManifestSchema::ConfigName => 3,
        ManifestSchema::BatchLr => 5,
    };
    if words.len() < min_fields {
        return Err(Error::InvalidManifest {
            line_no,
            message: format!(
                "expected at least {min_fields} ';'-separated fields, got {}",
                words.len()
            ),
        });
    }

    let hyper_id = words[0].to_string();
    let split = words[1].to_string();

    let (params, epochs) = match schema {
        ManifestSchema::ConfigName => (
            HyperParams::Config {
                name: words[2].to_string(),
            },
            None,
        ),
        ManifestSchema::BatchLr => {
            let batch_size = words[2].parse::<u32>().map_err(|_| Error::InvalidManifest {
                line_no,
                message: format!("batch_size is not an integer: '{}'", words[2]),
            })?;
            let lr = words[3].parse::<f64>().map_err(|_| Error::InvalidManifest {
                line_no,
                message: format!("lr is not a number: '{}'", words[3]),
            })?;
            let epochs = words[4].parse::<u32>().map_err(|_| Error::InvalidManifest {
                line_no,
                message: format!("epochs is not an integer: '{}'", words[4]),
            })?;
            (HyperParams::BatchLr { batch_size, lr }, Some(epochs))
        }
    };

    Ok(ManifestEntry {
        hyper_id,
        split,
        params,
        epochs,
    })
}

/// Read and parse an experiment manifest.
///
/// # Errors
///
/// Returns [`Error::ManifestNotFound`] if `path` does not exist and
/// [`Error::InvalidManifest`] for a malformed line.
pub fn read_manifest(path: &Path, schema: ManifestSchema) -> Result<Vec<ManifestEntry>> {
    if !path.exists() {
        return Err(Error::ManifestNotFound {
            path: path.to_path_buf(),
        });
    }
    let text = fs::read_to_string(path)?;

    let mut entries = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        debug!(line, "manifest line");
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        entries.push(parse_line(line, idx + 1, schema)?);
    }
    Ok(entries)
}

/// Manifest entries sorted into their pipeline roles.
#[derive(Debug, Default)]
pub struct RoutedManifest {
    /// Entries whose logs are parsed and aggregated.
    pub eval: Vec<ManifestEntry>,
    /// Copy-from split entries: hyperparameter identity → run id, used only
    /// to locate the checkpoint of the winning configuration.
    pub copy_lookup: HashMap<HyperKey, String>,
}

/// Route manifest entries by split.
///
/// Precedence per entry: the copy-from split is diverted into the side
/// lookup first (even when that split also appears in the ignore list),
/// then ignored splits are dropped, and everything else is evaluated.
#[must_use]
pub fn route_entries(
    entries: Vec<ManifestEntry>,
    ignore_splits: &[String],
    copy_from_split: Option<&str>,
) -> RoutedManifest {
    let mut routed = RoutedManifest::default();
    for entry in entries {
        info!(
            hyper_id = entry.hyper_id(),
            split = entry.split(),
            params = %entry.key(),
            epochs = entry.epochs(),
            "Processing experiment"
        );
        if copy_from_split == Some(entry.split()) {
            info!("Will get this experiment.");
            routed.copy_lookup.insert(entry.key(), entry.hyper_id().to_string());
        } else if ignore_splits.iter().any(|s| s == entry.split()) {
            info!("Skipping this split since it is in the ignore list.");
        } else {
            routed.eval.push(entry);
        }
    }
    routed
}
