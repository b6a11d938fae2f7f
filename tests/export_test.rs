//! Export conventions of the detection profiles: artifact naming, run- and
//! set-level symlinks, last-only checkpoint handling.

use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;

use escoger::pipeline::{self, PipelineConfig};
use escoger::profile::{MetricOptions, TrainerProfile};

// =============================================================================
// Fixture helpers
// =============================================================================

struct DetectionSweep {
    _dir: tempfile::TempDir,
    root: PathBuf,
    manifest: PathBuf,
}

impl DetectionSweep {
    fn new(manifest_lines: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("detection");
        let manifest = dir.path().join("experiments.txt");
        fs::write(&manifest, manifest_lines).unwrap();
        fs::create_dir_all(&root).unwrap();
        Self {
            _dir: dir,
            root,
            manifest,
        }
    }

    fn config(&self, profile: TrainerProfile) -> PipelineConfig {
        PipelineConfig {
            manifest_path: self.manifest.clone(),
            results_root: self.root.clone(),
            campaign: 5,
            set_id: "2".to_string(),
            run_id: "1".to_string(),
            ignore_splits: vec!["full".to_string()],
            copy_from_split: Some("full".to_string()),
            profile,
            metric: MetricOptions::default(),
        }
    }

    /// COCO-eval log for the `.out`-based profiles, one eval block per epoch.
    fn write_coco_log(&self, hyper_root: &Path, hyper_id: &str, aps: &[f64]) {
        let dir = hyper_root.join(format!("hyper{hyper_id}"));
        fs::create_dir_all(&dir).unwrap();
        let mut log = String::new();
        for ap in aps {
            log.push_str(
                " Average Precision  (AP) @[ IoU=0.50:0.95 | area=   all | maxDets=100 ] = 0.100\n",
            );
            log.push_str(&format!(
                " Average Precision  (AP) @[ IoU=0.50      | area=   all | maxDets=100 ] = {ap}\n"
            ));
        }
        fs::write(dir.join(format!("hyper{hyper_id}.out")), log).unwrap();
    }
}

// =============================================================================
// RetinaNet: per-epoch snapshots exported into the set directory
// =============================================================================

#[test]
fn test_retinanet_exports_epoch_snapshot_and_set_symlink() {
    let sweep = DetectionSweep::new(
        "000;trainA;16;0.01;3\n001;trainB;16;0.01;3\n002;full;16;0.01;3\n",
    );
    let results = sweep.root.join("campaign5/set2/run1/results");
    // Means per epoch: 0.25, 0.30, 0.365 -> best epoch 2.
    sweep.write_coco_log(&results, "000", &[0.30, 0.35, 0.33]);
    sweep.write_coco_log(&results, "001", &[0.20, 0.25, 0.40]);

    let snapshots = results.join("hyper002/snapshots");
    fs::create_dir_all(&snapshots).unwrap();
    fs::write(snapshots.join("resnet50_coco_02.h5"), b"weights").unwrap();

    let summary = pipeline::run(&sweep.config(TrainerProfile::Retinanet)).unwrap();
    assert_eq!(summary.selection.epoch(), 2);

    let set_dir = sweep.root.join("campaign5/set2");
    let artifact = set_dir.join("run1_hyper002_resnet50_coco_02.h5");
    assert!(artifact.exists());

    let link = set_dir.join("snapshots_best_full.h5");
    assert_eq!(
        fs::read_link(&link).unwrap(),
        PathBuf::from("run1_hyper002_resnet50_coco_02.h5")
    );
    // The link resolves because the target lives in the same directory.
    assert!(link.exists());
}

#[test]
fn test_detection_profile_is_analysis_only() {
    let sweep = DetectionSweep::new("000;trainA;16;0.01;2\n001;full;16;0.01;2\n");
    let results = sweep.root.join("campaign5/set2/run1/results");
    sweep.write_coco_log(&results, "000", &[0.30, 0.35]);
    // No checkpoints exist anywhere, which must not matter.

    let summary = pipeline::run(&sweep.config(TrainerProfile::Detection)).unwrap();
    assert!(summary.export.is_none());
    assert_eq!(summary.selection.epoch(), 1);
    assert!(summary.csv_path.exists());
}

// =============================================================================
// YOLOv5 family: last-only weights, named artifact in the run directory
// =============================================================================

#[test]
fn test_yolov5_exports_last_weights_with_set_symlink() {
    let sweep = DetectionSweep::new("000;trainA;16;0.01;3\n001;full;16;0.01;3\n");
    let run_dir = sweep.root.join("campaign5/2/run1");

    let exp = run_dir.join("hyper000/exp");
    fs::create_dir_all(&exp).unwrap();
    fs::write(
        exp.join("results.csv"),
        "epoch, metrics/precision, metrics/recall, metrics/mAP_0.5\n\
         0, 0.5, 0.4, 0.30\n\
         1, 0.6, 0.5, 0.35\n\
         2, 0.6, 0.5, 0.33\n",
    )
    .unwrap();

    let weights = run_dir.join("hyper001/exp/weights");
    fs::create_dir_all(&weights).unwrap();
    fs::write(weights.join("last.pt"), b"weights").unwrap();

    let summary = pipeline::run(&sweep.config(TrainerProfile::Yolov5)).unwrap();
    assert_eq!(summary.selection.epoch(), 1);

    // Last-only weights: the artifact name says so instead of an epoch.
    let artifact = run_dir.join("hyper001_epoch_last.pt");
    assert!(artifact.exists());

    let set_link = sweep.root.join("campaign5/2/snapshots_best_full.pt");
    assert_eq!(
        fs::read_link(&set_link).unwrap(),
        PathBuf::from("run1/hyper001_epoch_last.pt")
    );
    assert!(set_link.exists());

    // No run-level symlink for plain YOLOv5.
    assert!(!run_dir.join("snapshots_best_full.pt").exists());
}

#[test]
fn test_polygon_yolov5_creates_run_and_set_symlinks() {
    let sweep = DetectionSweep::new("000;trainA;16;0.01;2\n001;full;16;0.01;2\n");
    let run_dir = sweep.root.join("campaign5/2/run1");

    let exp = run_dir.join("hyper000/exp");
    fs::create_dir_all(&exp).unwrap();
    fs::write(
        exp.join("results.txt"),
        "epoch   mAP@0.5:0.95   loss\n\
         0       0.210          1.1\n\
         1       0.250          0.9\n",
    )
    .unwrap();

    let weights = run_dir.join("hyper001/exp/weights");
    fs::create_dir_all(&weights).unwrap();
    fs::write(weights.join("polygon_last.pt"), b"weights").unwrap();

    let summary = pipeline::run(&sweep.config(TrainerProfile::PolygonYolov5)).unwrap();
    assert_eq!(summary.selection.epoch(), 1);

    let run_link = run_dir.join("snapshots_best_full.pt");
    assert_eq!(
        fs::read_link(&run_link).unwrap(),
        PathBuf::from("hyper001_epoch_last.pt")
    );

    let set_link = sweep.root.join("campaign5/2/snapshots_best_full.pt");
    assert_eq!(
        fs::read_link(&set_link).unwrap(),
        PathBuf::from("run1/hyper001_epoch_last.pt")
    );

    let report = summary.export.unwrap();
    assert_eq!(report.symlinks.len(), 2);
}

// =============================================================================
// Symlink replacement across reruns
// =============================================================================

#[cfg(unix)]
#[test]
fn test_rerun_replaces_stale_set_symlink() {
    let sweep = DetectionSweep::new("000;trainA;16;0.01;2\n001;full;16;0.01;2\n");
    let run_dir = sweep.root.join("campaign5/2/run1");

    let exp = run_dir.join("hyper000/exp");
    fs::create_dir_all(&exp).unwrap();
    fs::write(
        exp.join("results.csv"),
        "epoch, metrics/mAP_0.5\n0, 0.30\n1, 0.35\n",
    )
    .unwrap();
    let weights = run_dir.join("hyper001/exp/weights");
    fs::create_dir_all(&weights).unwrap();
    fs::write(weights.join("last.pt"), b"weights").unwrap();

    // A stale link left behind by a previous sweep over another run.
    let set_dir = sweep.root.join("campaign5/2");
    let link = set_dir.join("snapshots_best_full.pt");
    std::os::unix::fs::symlink("run0/hyper000_epoch_last.pt", &link).unwrap();

    pipeline::run(&sweep.config(TrainerProfile::Yolov5)).unwrap();

    assert_eq!(
        fs::read_link(&link).unwrap(),
        PathBuf::from("run1/hyper001_epoch_last.pt")
    );
}
