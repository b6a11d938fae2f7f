//! Single-pass postprocessing pipeline
//!
//! Orchestration order matters for safety: the manifest is read and routed,
//! every log is parsed, and aggregation (with its empty-dataset guard) runs
//! before the first filesystem mutation. Only then is the aggregate table
//! written and, when configured, the best model exported.

use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::aggregate::{aggregate, write_aggregate_csv, MetricSample, SelectionResult};
use crate::error::Result;
use crate::extract::find_log_file;
use crate::manifest::{read_manifest, route_entries};
use crate::materialize::{export_best, resolve_copy_hyper, ExportReport};
use crate::profile::{MetricOptions, TrainerProfile};

/// Everything one invocation needs to know.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to the experiments manifest.
    pub manifest_path: PathBuf,
    /// Root of the results tree.
    pub results_root: PathBuf,
    /// Campaign number.
    pub campaign: u32,
    /// Set identifier within the campaign.
    pub set_id: String,
    /// Run identifier within the set.
    pub run_id: String,
    /// Splits that are not imported at all.
    pub ignore_splits: Vec<String>,
    /// Split whose checkpoint is exported as the best model; `None`
    /// disables the export step.
    pub copy_from_split: Option<String>,
    /// Trainer family being postprocessed.
    pub profile: TrainerProfile,
    /// Pattern parameters for the COCO-eval profiles.
    pub metric: MetricOptions,
}

/// What one invocation produced.
#[derive(Debug)]
pub struct RunSummary {
    /// The winning hyperparameters and epoch.
    pub selection: SelectionResult,
    /// Where the aggregate table was written.
    pub csv_path: PathBuf,
    /// The export report, when a best model was materialized.
    pub export: Option<ExportReport>,
}

/// Run the whole pipeline once.
///
/// # Errors
///
/// Propagates every error of the underlying stages; see [`crate::Error`]
/// for the taxonomy. All errors are terminal for the invocation.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let profile = config.profile;
    let layout = profile.layout(
        config.results_root.clone(),
        config.campaign,
        config.set_id.clone(),
        config.run_id.clone(),
    );

    let entries = read_manifest(&config.manifest_path, profile.schema())?;
    let routed = route_entries(
        entries,
        &config.ignore_splits,
        config.copy_from_split.as_deref(),
    );
    let source = profile.metric_source(&config.metric)?;

    let mut samples: Vec<MetricSample> = Vec::new();
    for entry in &routed.eval {
        let hyper_dir = layout.hyper_dir(entry.hyper_id());
        let log_path = find_log_file(&hyper_dir, &profile.log_glob(entry.hyper_id()))?;
        let values = source.extract(&log_path)?;
        if values.is_empty() {
            warn!(
                hyper_id = entry.hyper_id(),
                log = %log_path.display(),
                "No metric samples in this run's output"
            );
        }
        samples.extend(
            values
                .iter()
                .map(|v| MetricSample::new(entry.hyper_id(), entry.key(), v.epoch, v.value)),
        );
    }

    let agg = aggregate(&samples)?;

    let csv_path = layout.aggregate_csv_path();
    if let Some(parent) = csv_path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_aggregate_csv(&csv_path, profile.schema().key_columns(), &agg.table)?;

    let mut export = None;
    match (&config.copy_from_split, profile.exports_best()) {
        (Some(split), true) => {
            let hyper_n = resolve_copy_hyper(&routed.copy_lookup, agg.best.key(), split)?;
            if let Some(paths) = profile.export_paths(&layout, hyper_n, agg.best.epoch(), split) {
                export = Some(export_best(&paths, &agg.best)?);
            }
        }
        _ => info!("Best-model export disabled"),
    }

    Ok(RunSummary {
        selection: agg.best,
        csv_path,
        export,
    })
}
