//! Escoger CLI: postprocess the results of a training sweep.
//!
//! One subcommand per trainer family; all of them share the same pipeline
//! and differ only in file conventions. Exit status is 0 on success and 1
//! on any terminal error (empty dataset, missing checkpoint, failed copy
//! verification, ...), logged at error level instead of a backtrace so the
//! tool can gate automated pipelines on its exit code.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use escoger::pipeline::{self, PipelineConfig};
use escoger::profile::{MetricOptions, TrainerProfile};

/// Postprocess results of training.
#[derive(Parser, Debug)]
#[command(name = "escoger", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Two-stage classification sweeps (Eval-Accuracy logs)
    Classification(JobArgs),
    /// COCO-eval detection sweeps, analysis only (no best-model export)
    Detection(CocoArgs),
    /// RetinaNet detection sweeps (COCO-eval logs, per-epoch snapshots)
    Retinanet(CocoArgs),
    /// YOLOv5 detection sweeps (results.csv tables, last-only weights)
    Yolov5(JobArgs),
    /// Polygon-YOLOv5 detection sweeps (results.txt tables, last-only weights)
    PolygonYolov5(JobArgs),
}

#[derive(Args, Debug)]
struct JobArgs {
    /// Path to the experiments manifest
    #[arg(long)]
    experiments_path: PathBuf,

    /// Root of the results tree
    #[arg(long)]
    results_root_dir: PathBuf,

    /// Campaign number
    #[arg(long)]
    campaign: u32,

    /// Set id within the campaign
    #[arg(long)]
    set_id: String,

    /// Run id within the set
    #[arg(long)]
    run_id: String,

    /// The splits with this name are not imported
    #[arg(long, num_args = 0.., default_value = "full")]
    ignore_splits: Vec<String>,

    /// Will copy the best model from this split
    #[arg(long, default_value = "full")]
    copy_best_model_from_split: String,

    /// Disable the best-model export entirely
    #[arg(long)]
    no_copy: bool,

    /// Set logging level. 10: debug, 20: info, 30: warning, 40: error
    #[arg(long, default_value_t = 20, value_parser = parse_logging_level)]
    logging_level: u8,
}

#[derive(Args, Debug)]
struct CocoArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Will look for this 'IoU' in .out files
    #[arg(long, default_value = "0.50 ")]
    iou: String,

    /// Will look for this 'area' in .out files
    #[arg(long, default_value = "all")]
    area: String,
}

fn parse_logging_level(s: &str) -> Result<u8, String> {
    match s {
        "10" => Ok(10),
        "20" => Ok(20),
        "30" => Ok(30),
        "40" => Ok(40),
        _ => Err("logging level must be one of 10, 20, 30, 40".to_string()),
    }
}

impl JobArgs {
    fn into_config(self, profile: TrainerProfile, metric: MetricOptions) -> PipelineConfig {
        let copy_from_split = if self.no_copy {
            None
        } else {
            Some(self.copy_best_model_from_split)
        };
        PipelineConfig {
            manifest_path: self.experiments_path,
            results_root: self.results_root_dir,
            campaign: self.campaign,
            set_id: self.set_id,
            run_id: self.run_id,
            ignore_splits: self.ignore_splits,
            copy_from_split,
            profile,
            metric,
        }
    }
}

fn init_tracing(level: u8) -> anyhow::Result<()> {
    let filter = match level {
        10 => "debug",
        30 => "warn",
        40 => "error",
        _ => "info",
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize logging")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (profile, metric, job) = match cli.command {
        Command::Classification(job) => {
            (TrainerProfile::Classification, MetricOptions::default(), job)
        }
        Command::Detection(args) => (
            TrainerProfile::Detection,
            MetricOptions {
                iou: args.iou,
                area: args.area,
            },
            args.job,
        ),
        Command::Retinanet(args) => (
            TrainerProfile::Retinanet,
            MetricOptions {
                iou: args.iou,
                area: args.area,
            },
            args.job,
        ),
        Command::Yolov5(job) => (TrainerProfile::Yolov5, MetricOptions::default(), job),
        Command::PolygonYolov5(job) => {
            (TrainerProfile::PolygonYolov5, MetricOptions::default(), job)
        }
    };

    init_tracing(job.logging_level)?;
    let config = job.into_config(profile, metric);

    match pipeline::run(&config) {
        Ok(summary) => {
            // The selection goes to stdout; everything else is on stderr.
            println!("{} {}", summary.selection.key(), summary.selection.epoch());
            Ok(())
        }
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_logging_level_parser() {
        assert_eq!(parse_logging_level("10"), Ok(10));
        assert_eq!(parse_logging_level("20"), Ok(20));
        assert!(parse_logging_level("15").is_err());
    }

    #[test]
    fn test_no_copy_disables_export() {
        let cli = Cli::parse_from([
            "escoger",
            "classification",
            "--experiments-path",
            "exp.txt",
            "--results-root-dir",
            "/data",
            "--campaign",
            "1",
            "--set-id",
            "s",
            "--run-id",
            "0",
            "--no-copy",
        ]);
        let Command::Classification(job) = cli.command else {
            panic!("expected classification subcommand");
        };
        let config = job.into_config(TrainerProfile::Classification, MetricOptions::default());
        assert_eq!(config.copy_from_split, None);
        assert_eq!(config.ignore_splits, vec!["full".to_string()]);
    }
}
