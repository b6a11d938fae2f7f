//! Sweep directory layout
//!
//! Every sweep lives under a three-level hierarchy:
//! `<root>/campaign<N>/<set>/run<id>/hyper<id>/...`. Trainer families spell
//! the set directory differently, and one of them keeps per-hyper output
//! under an extra `results/` subtree, so both knobs are part of the layout.

use std::path::PathBuf;

/// How the set directory is spelled on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetDirStyle {
    /// `set-<set_id>`
    Dashed,
    /// `set<set_id>`
    Prefixed,
    /// `<set_id>` verbatim
    Bare,
}

impl SetDirStyle {
    /// Format the set directory name for `set_id`.
    #[must_use]
    pub fn dir_name(self, set_id: &str) -> String {
        match self {
            Self::Dashed => format!("set-{set_id}"),
            Self::Prefixed => format!("set{set_id}"),
            Self::Bare => set_id.to_string(),
        }
    }
}

/// Resolved directory layout for one sweep (campaign/set/run).
#[derive(Debug, Clone)]
pub struct SweepLayout {
    root: PathBuf,
    campaign: u32,
    set_id: String,
    run_id: String,
    set_style: SetDirStyle,
    results_subdir: Option<&'static str>,
}

impl SweepLayout {
    /// Create a layout rooted at the results directory.
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        campaign: u32,
        set_id: impl Into<String>,
        run_id: impl Into<String>,
        set_style: SetDirStyle,
        results_subdir: Option<&'static str>,
    ) -> Self {
        Self {
            root: root.into(),
            campaign,
            set_id: set_id.into(),
            run_id: run_id.into(),
            set_style,
            results_subdir,
        }
    }

    /// Get the run identifier.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Directory of the campaign: `<root>/campaign<N>`.
    #[must_use]
    pub fn campaign_dir(&self) -> PathBuf {
        self.root.join(format!("campaign{}", self.campaign))
    }

    /// Directory of the set within the campaign.
    #[must_use]
    pub fn set_dir(&self) -> PathBuf {
        self.campaign_dir()
            .join(self.set_style.dir_name(&self.set_id))
    }

    /// Directory of the run within the set: `.../run<id>`.
    #[must_use]
    pub fn run_dir(&self) -> PathBuf {
        self.set_dir().join(format!("run{}", self.run_id))
    }

    /// Parent directory of the per-hyper folders.
    ///
    /// Equal to [`Self::run_dir`] unless the trainer keeps its output under
    /// an extra `results/` subtree.
    #[must_use]
    pub fn hyper_root(&self) -> PathBuf {
        match self.results_subdir {
            Some(sub) => self.run_dir().join(sub),
            None => self.run_dir(),
        }
    }

    /// Folder of one hyperparameter configuration, by verbatim id.
    #[must_use]
    pub fn hyper_dir(&self, hyper_id: &str) -> PathBuf {
        self.hyper_root().join(format!("hyper{hyper_id}"))
    }

    /// Folder of one hyperparameter configuration, zero-padded.
    ///
    /// Checkpoint paths use the `hyper%03d` spelling even where logs are
    /// looked up by the verbatim manifest id.
    #[must_use]
    pub fn hyper_dir_padded(&self, hyper_n: u32) -> PathBuf {
        self.hyper_root().join(format!("hyper{hyper_n:03}"))
    }

    /// Canonical path of the aggregated results table.
    #[must_use]
    pub fn aggregate_csv_path(&self) -> PathBuf {
        self.run_dir().join("results.csv")
    }

    /// Relative path of the run directory within the set directory.
    ///
    /// Set-level symlinks point through this prefix so they stay valid when
    /// the campaign tree is moved as a whole.
    #[must_use]
    pub fn run_dir_name(&self) -> String {
        format!("run{}", self.run_id)
    }
}
