//! Cross-split aggregation and best-selection
//!
//! The one reusable algorithm of this tool: group extracted samples by
//! (hyperparameter key, epoch), average the metric across whatever splits
//! contributed to each group, pick the best epoch per key, then the best
//! key overall.
//!
//! ## Tie-break
//!
//! Arg-max is stable: a candidate replaces the incumbent only on a strictly
//! greater mean, so of two numerically identical groups the one inserted
//! first wins, reproducibly for identical input ordering. Two equal epochs
//! are operationally interchangeable; determinism is what matters.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::manifest::HyperKey;

/// One extracted metric reading tagged with its run identity.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    hyper_id: String,
    key: HyperKey,
    epoch: u32,
    value: f64,
}

impl MetricSample {
    /// Create a sample.
    #[must_use]
    pub fn new(hyper_id: impl Into<String>, key: HyperKey, epoch: u32, value: f64) -> Self {
        Self {
            hyper_id: hyper_id.into(),
            key,
            epoch,
            value,
        }
    }

    /// Get the run id this sample came from.
    #[must_use]
    pub fn hyper_id(&self) -> &str {
        &self.hyper_id
    }

    /// Get the hyperparameter identity.
    #[must_use]
    pub const fn key(&self) -> &HyperKey {
        &self.key
    }

    /// Get the 0-based epoch index.
    #[must_use]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Get the metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }
}

/// Cross-split mean for one (hyperparameter key, epoch) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRecord {
    key: HyperKey,
    epoch: u32,
    mean: f64,
}

impl AggregatedRecord {
    /// Get the hyperparameter identity.
    #[must_use]
    pub const fn key(&self) -> &HyperKey {
        &self.key
    }

    /// Get the 0-based epoch index.
    #[must_use]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Get the cross-split mean value.
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }
}

/// The winning hyperparameter configuration and epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionResult {
    key: HyperKey,
    epoch: u32,
    mean: f64,
}

impl SelectionResult {
    /// Create a selection result.
    #[must_use]
    pub const fn new(key: HyperKey, epoch: u32, mean: f64) -> Self {
        Self { key, epoch, mean }
    }

    /// Get the winning hyperparameter identity.
    #[must_use]
    pub const fn key(&self) -> &HyperKey {
        &self.key
    }

    /// Get the winning 0-based epoch.
    #[must_use]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Get the winning cross-split mean.
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }
}

/// Aggregation output: the full audit table plus the selection.
#[derive(Debug)]
pub struct Aggregation {
    /// Per-(key, epoch) cross-split means, in first-insertion order.
    pub table: Vec<AggregatedRecord>,
    /// The winning key and epoch.
    pub best: SelectionResult,
}

/// Aggregate samples and select the best configuration.
///
/// # Errors
///
/// Returns [`Error::EmptyDataset`] when `samples` is empty, so the pipeline
/// stops before any filesystem mutation instead of producing a vacuous
/// "best".
pub fn aggregate(samples: &[MetricSample]) -> Result<Aggregation> {
    if samples.is_empty() {
        return Err(Error::EmptyDataset);
    }

    log_max_epochs(samples);

    // Group by (key, epoch), preserving first-insertion order.
    struct Group {
        key: HyperKey,
        epoch: u32,
        sum: f64,
        count: u32,
    }
    let mut groups: Vec<Group> = Vec::new();
    let mut group_index: HashMap<(HyperKey, u32), usize> = HashMap::new();
    for sample in samples {
        let slot = (sample.key.clone(), sample.epoch);
        if let Some(&idx) = group_index.get(&slot) {
            groups[idx].sum += sample.value;
            groups[idx].count += 1;
        } else {
            group_index.insert(slot, groups.len());
            groups.push(Group {
                key: sample.key.clone(),
                epoch: sample.epoch,
                sum: sample.value,
                count: 1,
            });
        }
    }

    let table: Vec<AggregatedRecord> = groups
        .into_iter()
        .map(|g| AggregatedRecord {
            key: g.key,
            epoch: g.epoch,
            mean: g.sum / f64::from(g.count),
        })
        .collect();
    info!(groups = table.len(), "Averages across splits computed");

    // Best epoch per key, stable arg-max.
    let mut key_order: Vec<HyperKey> = Vec::new();
    let mut best_per_key: HashMap<HyperKey, usize> = HashMap::new();
    for (idx, record) in table.iter().enumerate() {
        match best_per_key.get(&record.key) {
            Some(&cur) if table[cur].mean >= record.mean => {}
            Some(_) => {
                best_per_key.insert(record.key.clone(), idx);
            }
            None => {
                key_order.push(record.key.clone());
                best_per_key.insert(record.key.clone(), idx);
            }
        }
    }
    info!("The best epoch from every hyperparameter");
    for key in &key_order {
        let record = &table[best_per_key[key]];
        info!(key = %record.key, epoch = record.epoch, mean = record.mean, "best epoch");
    }

    // Best key overall, same tie-break.
    let mut winner: Option<&AggregatedRecord> = None;
    for key in &key_order {
        let record = &table[best_per_key[key]];
        if winner.map_or(true, |w| record.mean > w.mean) {
            winner = Some(record);
        }
    }
    // key_order is non-empty because samples was non-empty.
    let winner = winner.ok_or(Error::EmptyDataset)?;
    let best = SelectionResult {
        key: winner.key.clone(),
        epoch: winner.epoch,
        mean: winner.mean,
    };
    info!(key = %best.key, epoch = best.epoch, mean = best.mean, "The best hyperparameter and epoch");

    Ok(Aggregation { table, best })
}

/// Log the maximum epoch observed per run id; a run with fewer epochs than
/// its siblings was truncated.
fn log_max_epochs(samples: &[MetricSample]) {
    let mut max_epochs: HashMap<&str, u32> = HashMap::new();
    for sample in samples {
        max_epochs
            .entry(sample.hyper_id.as_str())
            .and_modify(|e| *e = (*e).max(sample.epoch))
            .or_insert(sample.epoch);
    }
    let mut by_hyper: Vec<(&str, u32)> = max_epochs.into_iter().collect();
    by_hyper.sort_unstable();
    for (hyper_id, max_epoch) in by_hyper {
        debug!(hyper_id, max_epoch, "max epoch observed");
    }
}

/// Write the aggregate table as CSV.
///
/// Header: the schema's key columns, then `epoch`, then `value`.
///
/// # Errors
///
/// Returns [`Error::Csv`] / [`Error::Io`] on write failure.
pub fn write_aggregate_csv(
    path: &Path,
    key_columns: &[&str],
    table: &[AggregatedRecord],
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<&str> = key_columns.to_vec();
    header.push("epoch");
    header.push("value");
    writer.write_record(&header)?;

    for record in table {
        let mut row: Vec<String> = record.key.fields().to_vec();
        row.push(record.epoch.to_string());
        row.push(record.mean.to_string());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = table.len(), "Wrote aggregate table");
    Ok(())
}

/// Read an aggregate table back from CSV.
///
/// The header's trailing columns must be `epoch` and `value`; everything
/// before them is treated as the hyperparameter key.
///
/// # Errors
///
/// Returns [`Error::ResultsTableInvalid`] for a malformed table and
/// [`Error::Csv`] / [`Error::Io`] on read failure.
pub fn read_aggregate_csv(path: &Path) -> Result<Vec<AggregatedRecord>> {
    let invalid = |message: String| Error::ResultsTableInvalid {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let n = headers.len();
    if n < 3 || &headers[n - 2] != "epoch" || &headers[n - 1] != "value" {
        return Err(invalid(
            "expected header ending in 'epoch,value' with at least one key column".to_string(),
        ));
    }

    let mut table = Vec::new();
    for (row_no, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != n {
            return Err(invalid(format!("row {row_no} has {} cells, expected {n}", record.len())));
        }
        let key = HyperKey::new(record.iter().take(n - 2).map(ToString::to_string).collect());
        let epoch = record[n - 2]
            .parse::<u32>()
            .map_err(|_| invalid(format!("row {row_no} has a non-integer epoch")))?;
        let mean = record[n - 1]
            .parse::<f64>()
            .map_err(|_| invalid(format!("row {row_no} has a non-numeric value")))?;
        table.push(AggregatedRecord { key, epoch, mean });
    }
    Ok(table)
}
