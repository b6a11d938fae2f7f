//! # Escoger: Sweep Postprocessor
//!
//! Escoger reads the textual logs left behind by a hyperparameter sweep
//! (classification and object-detection training runs), extracts a
//! per-epoch metric from every run, averages it across data splits, selects
//! the best configuration and epoch, and optionally copies that
//! configuration's checkpoint to a well-known "best" location.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Muda elimination**: five near-identical postprocess scripts become
//!   one pipeline parameterized by a trainer profile
//! - **Poka-Yoke safety**: every filesystem mutation is verified by an
//!   existence post-condition; an empty dataset stops the pipeline before
//!   anything is written
//! - **Jidoka**: deterministic stable arg-max, so reruns reproduce the same
//!   selection
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use escoger::pipeline::{self, PipelineConfig};
//! use escoger::profile::{MetricOptions, TrainerProfile};
//!
//! let config = PipelineConfig {
//!     manifest_path: "campaigns/experiments.txt".into(),
//!     results_root: "/data/classification".into(),
//!     campaign: 7,
//!     set_id: "stamps".into(),
//!     run_id: "2".into(),
//!     ignore_splits: vec!["full".into()],
//!     copy_from_split: Some("full".into()),
//!     profile: TrainerProfile::Classification,
//!     metric: MetricOptions::default(),
//! };
//! let summary = pipeline::run(&config)?;
//! println!("{} {}", summary.selection.key(), summary.selection.epoch());
//! # Ok::<(), escoger::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod aggregate;
pub mod error;
pub mod extract;
pub mod layout;
pub mod manifest;
pub mod materialize;
pub mod pipeline;
pub mod profile;

pub use error::{Error, Result};
