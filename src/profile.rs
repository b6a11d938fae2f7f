//! Trainer profiles
//!
//! One near-identical postprocessing flow exists per trainer family; only
//! the file conventions differ: where the per-run artifact lives, how the
//! metric is spelled, how checkpoints are named, and where the "best" copy
//! goes. Each family is one variant here, and everything convention-shaped
//! is answered by this module so the pipeline stays generic.

use std::path::PathBuf;

use crate::error::Result;
use crate::extract::{LinePattern, MetricSource, TableLayout, TableSpec};
use crate::layout::{SetDirStyle, SweepLayout};
use crate::manifest::ManifestSchema;
use crate::materialize::{CheckpointNaming, ExportPaths, Symlink};

/// Pattern parameters for the COCO-eval profiles.
#[derive(Debug, Clone)]
pub struct MetricOptions {
    /// IoU threshold as spelled in the log, e.g. `"0.50 "` (the trailing
    /// space keeps `0.50` from matching `0.50:0.95`).
    pub iou: String,
    /// Area filter as spelled in the log, e.g. `"all"`.
    pub area: String,
}

impl Default for MetricOptions {
    fn default() -> Self {
        Self {
            iou: "0.50 ".to_string(),
            area: "all".to_string(),
        }
    }
}

/// The supported trainer families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerProfile {
    /// Two-stage classification: Eval-Accuracy lines behind a stage gate,
    /// per-epoch `.pth` snapshots, canonical `hyperbest/` export.
    Classification,
    /// COCO-eval detection, analysis only: no best-model export.
    Detection,
    /// RetinaNet detection: COCO-eval lines, per-epoch `.h5` snapshots,
    /// named export into the set directory.
    Retinanet,
    /// YOLOv5 detection: `results.csv` tables, last-only weights.
    Yolov5,
    /// Polygon-YOLOv5 detection: `results.txt` tables, last-only weights.
    PolygonYolov5,
}

impl TrainerProfile {
    /// Manifest field schema of this family.
    #[must_use]
    pub const fn schema(self) -> ManifestSchema {
        match self {
            Self::Classification => ManifestSchema::ConfigName,
            Self::Detection | Self::Retinanet | Self::Yolov5 | Self::PolygonYolov5 => {
                ManifestSchema::BatchLr
            }
        }
    }

    /// How the set directory is spelled.
    #[must_use]
    pub const fn set_dir_style(self) -> SetDirStyle {
        match self {
            Self::Classification => SetDirStyle::Dashed,
            Self::Detection | Self::Retinanet => SetDirStyle::Prefixed,
            Self::Yolov5 | Self::PolygonYolov5 => SetDirStyle::Bare,
        }
    }

    /// Extra subtree between the run directory and the hyper folders.
    #[must_use]
    pub const fn results_subdir(self) -> Option<&'static str> {
        match self {
            Self::Detection | Self::Retinanet => Some("results"),
            Self::Classification | Self::Yolov5 | Self::PolygonYolov5 => None,
        }
    }

    /// Glob of the per-run output artifact, relative to the hyper folder.
    #[must_use]
    pub fn log_glob(self, hyper_id: &str) -> String {
        match self {
            Self::Classification => "batch_job*/train_classification*.out".to_string(),
            Self::Detection | Self::Retinanet => format!("hyper{hyper_id}.out"),
            Self::Yolov5 => "exp/results.csv".to_string(),
            Self::PolygonYolov5 => "exp/results.txt".to_string(),
        }
    }

    /// Build the metric-extraction strategy of this family.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Pattern`] if the assembled pattern does not
    /// compile (possible with hand-provided IoU/area values).
    pub fn metric_source(self, opts: &MetricOptions) -> Result<MetricSource> {
        Ok(match self {
            Self::Classification => MetricSource::Pattern(LinePattern::eval_accuracy()?),
            Self::Detection | Self::Retinanet => {
                MetricSource::Pattern(LinePattern::average_precision(&opts.iou, &opts.area)?)
            }
            Self::Yolov5 => {
                MetricSource::Table(TableSpec::new(TableLayout::Commas, "metrics/mAP_0.5"))
            }
            Self::PolygonYolov5 => {
                MetricSource::Table(TableSpec::new(TableLayout::Whitespace, "mAP@0.5:0.95"))
            }
        })
    }

    /// Checkpoint naming of this family, `None` when the family has no
    /// export step.
    #[must_use]
    pub fn checkpoint_naming(self) -> Option<CheckpointNaming> {
        match self {
            Self::Classification => Some(CheckpointNaming::PerEpoch {
                prefix: "stage2/epoch".to_string(),
                digits: 3,
                suffix: ".pth".to_string(),
                one_based: true,
            }),
            Self::Detection => None,
            Self::Retinanet => Some(CheckpointNaming::PerEpoch {
                prefix: "snapshots/resnet50_coco_".to_string(),
                digits: 2,
                suffix: ".h5".to_string(),
                one_based: false,
            }),
            // YOLOv5 persists only best/last weights, so the selected epoch
            // cannot be resolved to its own file.
            Self::Yolov5 => Some(CheckpointNaming::LastOnly {
                rel_path: "exp/weights/last.pt".to_string(),
            }),
            Self::PolygonYolov5 => Some(CheckpointNaming::LastOnly {
                rel_path: "exp/weights/polygon_last.pt".to_string(),
            }),
        }
    }

    /// Whether this family exports a best model at all.
    #[must_use]
    pub fn exports_best(self) -> bool {
        self.checkpoint_naming().is_some()
    }

    /// Build the sweep layout for this family.
    #[must_use]
    pub fn layout(
        self,
        root: impl Into<PathBuf>,
        campaign: u32,
        set_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> SweepLayout {
        SweepLayout::new(
            root,
            campaign,
            set_id,
            run_id,
            self.set_dir_style(),
            self.results_subdir(),
        )
    }

    /// Resolve every path of the best-model export, or `None` when this
    /// family has no export step.
    #[must_use]
    pub fn export_paths(
        self,
        layout: &SweepLayout,
        hyper_n: u32,
        epoch: u32,
        split: &str,
    ) -> Option<ExportPaths> {
        let naming = self.checkpoint_naming()?;
        let hyper_dir = layout.hyper_dir_padded(hyper_n);
        let checkpoint = hyper_dir.join(naming.rel_path(epoch));

        let paths = match self {
            Self::Classification => {
                let canonical = layout.run_dir().join("hyperbest");
                ExportPaths {
                    source_hyper_dir: hyper_dir,
                    checkpoint,
                    artifact: canonical.join("stage2/final_model_checkpoint.pth"),
                    canonical_dir: Some(canonical),
                    symlinks: vec![],
                }
            }
            Self::Detection => return None,
            Self::Retinanet => {
                let name = format!(
                    "run{}_hyper{hyper_n:03}_resnet50_coco_{epoch:02}.h5",
                    layout.run_id()
                );
                let set_dir = layout.set_dir();
                ExportPaths {
                    source_hyper_dir: hyper_dir,
                    checkpoint,
                    artifact: set_dir.join(&name),
                    canonical_dir: None,
                    symlinks: vec![Symlink {
                        link: set_dir.join(format!("snapshots_best_{split}.h5")),
                        target: PathBuf::from(name),
                    }],
                }
            }
            Self::Yolov5 | Self::PolygonYolov5 => {
                let name = format!("hyper{hyper_n:03}_epoch_last.pt");
                let run_dir = layout.run_dir();
                let set_dir = layout.set_dir();

                let mut symlinks = Vec::new();
                if self == Self::PolygonYolov5 {
                    symlinks.push(Symlink {
                        link: run_dir.join(format!("snapshots_best_{split}.pt")),
                        target: PathBuf::from(&name),
                    });
                }
                symlinks.push(Symlink {
                    link: set_dir.join(format!("snapshots_best_{split}.pt")),
                    target: PathBuf::from(layout.run_dir_name()).join(&name),
                });

                ExportPaths {
                    source_hyper_dir: hyper_dir,
                    checkpoint,
                    artifact: run_dir.join(&name),
                    canonical_dir: None,
                    symlinks,
                }
            }
        };
        Some(paths)
    }
}
