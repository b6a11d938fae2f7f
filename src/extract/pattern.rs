//! Free-text log scanning
//!
//! Trainers that interleave evaluation output with their console log get a
//! line-anchored pattern with one capture group for the metric value. The
//! epoch of a sample is its 0-based occurrence count in the file, never a
//! number read out of the line: evaluation blocks repeat once per epoch, so
//! counting matches is the only numbering that survives log format drift.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::extract::EpochValue;

/// Marker line that must appear before a shared two-stage log starts
/// reporting the metrics of the stage we care about.
const STAGE2_GATE: &str = "Loading stamps Stage 1 Classifier Weights";

/// Anchored line pattern with an optional stage gate.
#[derive(Debug)]
pub struct LinePattern {
    regex: Regex,
    gate: Option<String>,
}

impl LinePattern {
    /// Compile a pattern. The regex must be line-anchored and have the
    /// metric value as capture group 1.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Pattern`] if the regex does not compile.
    pub fn new(pattern: &str, gate: Option<String>) -> Result<Self> {
        info!(pattern, "Will look for pattern");
        Ok(Self {
            regex: Regex::new(pattern)?,
            gate,
        })
    }

    /// Pattern for two-stage classification logs: `Eval-Accuracy : <v>%`.
    ///
    /// Stage 1 and stage 2 write to the same log file; the gate skips every
    /// accuracy line before the stage-2 weights are loaded.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Pattern`] if the regex does not compile.
    pub fn eval_accuracy() -> Result<Self> {
        Self::new(
            r"^Eval-Accuracy : ([0-9.]+)%",
            Some(STAGE2_GATE.to_string()),
        )
    }

    /// Pattern for COCO evaluation output in detection logs.
    ///
    /// `iou` is interpolated with dots escaped (the CLI default `"0.50 "`
    /// keeps its trailing space so `0.50` does not match `0.50:0.95`);
    /// `area` is interpolated verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Pattern`] if the assembled regex does not
    /// compile.
    pub fn average_precision(iou: &str, area: &str) -> Result<Self> {
        let iou = iou.replace('.', "\\.");
        Self::new(
            &format!("^ Average Precision.*IoU={iou}.*area= *{area}.* = ([0-9.]+)"),
            None,
        )
    }

    /// Scan a log, assigning each match the next sequential epoch index.
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<EpochValue> {
        let mut samples = Vec::new();
        let mut epoch: u32 = 0;
        let mut started = self.gate.is_none();

        for line in text.lines() {
            if let Some(marker) = &self.gate {
                if line.starts_with(marker.as_str()) {
                    started = true;
                    continue;
                }
            }
            if !started {
                continue;
            }
            let Some(caps) = self.regex.captures(line) else {
                continue;
            };
            debug!(line, "Found line");
            let Ok(value) = caps[1].parse::<f64>() else {
                // A capture like "1.2.3" is a corrupt line, not an epoch.
                warn!(line, "Matched line has an unparseable value, skipping");
                continue;
            };
            samples.push(EpochValue { epoch, value });
            // Every match is one epoch.
            epoch += 1;
        }

        debug!(epochs = epoch, "epochs found in log");
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_eval_accuracy_counts_epochs_after_gate() {
        let log = "\
Eval-Accuracy : 55.0%
Loading stamps Stage 1 Classifier Weights
Eval-Accuracy : 80.0%
some other line
Eval-Accuracy : 82.0%
Eval-Accuracy : 81.0%
";
        let pattern = LinePattern::eval_accuracy().unwrap();
        let samples = pattern.scan(log);

        assert_eq!(
            samples,
            vec![
                EpochValue { epoch: 0, value: 80.0 },
                EpochValue { epoch: 1, value: 82.0 },
                EpochValue { epoch: 2, value: 81.0 },
            ]
        );
    }

    #[test]
    fn test_gateless_scan_counts_from_first_line() {
        let pattern = LinePattern::new(r"^acc=([0-9.]+)", None).unwrap();
        let samples = pattern.scan("acc=1.0\nacc=2.0\n");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].epoch, 0);
        assert_eq!(samples[1].epoch, 1);
    }

    #[test]
    fn test_no_gate_marker_means_no_samples() {
        let pattern = LinePattern::eval_accuracy().unwrap();
        assert!(pattern.scan("Eval-Accuracy : 99.0%\n").is_empty());
    }

    #[test]
    fn test_pattern_is_line_anchored() {
        let pattern = LinePattern::new(r"^Eval-Accuracy : ([0-9.]+)%", None).unwrap();
        assert!(pattern.scan("note: Eval-Accuracy : 50.0%\n").is_empty());
    }

    #[test]
    fn test_average_precision_matches_coco_line() {
        let log = "\
 Average Precision  (AP) @[ IoU=0.50:0.95 | area=   all | maxDets=100 ] = 0.427
 Average Precision  (AP) @[ IoU=0.50      | area=   all | maxDets=100 ] = 0.613
 Average Precision  (AP) @[ IoU=0.50      | area= small | maxDets=100 ] = 0.210
 Average Recall     (AR) @[ IoU=0.50:0.95 | area=   all | maxDets=100 ] = 0.533
";
        let pattern = LinePattern::average_precision("0.50 ", "all").unwrap();
        let samples = pattern.scan(log);

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0], EpochValue { epoch: 0, value: 0.613 });
    }

    #[test]
    fn test_average_precision_area_filter() {
        let log = "\
 Average Precision  (AP) @[ IoU=0.50      | area=   all | maxDets=100 ] = 0.613
 Average Precision  (AP) @[ IoU=0.50      | area= small | maxDets=100 ] = 0.210
";
        let pattern = LinePattern::average_precision("0.50 ", "small").unwrap();
        let samples = pattern.scan(log);

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 0.210);
    }

    #[test]
    fn test_unparseable_value_does_not_consume_an_epoch() {
        let pattern = LinePattern::new(r"^v=([0-9.]+)", None).unwrap();
        let samples = pattern.scan("v=1.0\nv=1.2.3\nv=3.0\n");
        assert_eq!(
            samples,
            vec![
                EpochValue { epoch: 0, value: 1.0 },
                EpochValue { epoch: 1, value: 3.0 },
            ]
        );
    }
}
