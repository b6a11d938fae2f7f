//! Structured results-table reading
//!
//! Some trainers write one results row per epoch instead of logging free
//! text. One row = one epoch, and unlike the free-text scan the epoch comes
//! from the row's own `epoch` column. Two layouts exist: comma-separated
//! with space padding after the delimiter, and whitespace-separated columns.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::extract::EpochValue;

/// Column holding the recorded epoch number.
const EPOCH_COLUMN: &str = "epoch";

/// Physical layout of the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    /// Comma-delimited with optional blank padding around cells.
    Commas,
    /// Columns separated by runs of whitespace.
    Whitespace,
}

/// A results table: layout plus the metric column to read.
#[derive(Debug)]
pub struct TableSpec {
    layout: TableLayout,
    metric_column: String,
}

impl TableSpec {
    /// Describe a results table carrying `metric_column`.
    #[must_use]
    pub fn new(layout: TableLayout, metric_column: impl Into<String>) -> Self {
        Self {
            layout,
            metric_column: metric_column.into(),
        }
    }

    /// Get the metric column name.
    #[must_use]
    pub fn metric_column(&self) -> &str {
        &self.metric_column
    }

    /// Read all (epoch, value) rows from the table at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResultsTableInvalid`] if the header lacks the epoch
    /// or metric column or a cell does not parse, and [`Error::Io`] /
    /// [`Error::Csv`] for read failures.
    pub fn read(&self, path: &Path) -> Result<Vec<EpochValue>> {
        let rows = match self.layout {
            TableLayout::Commas => self.read_commas(path)?,
            TableLayout::Whitespace => self.read_whitespace(path)?,
        };
        debug!(rows = rows.len(), path = %path.display(), "epochs found in results table");
        Ok(rows)
    }

    fn read_commas(&self, path: &Path) -> Result<Vec<EpochValue>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let header_cells: Vec<&str> = headers.iter().collect();
        let epoch_idx = column_index(&header_cells, EPOCH_COLUMN, path)?;
        let value_idx = column_index(&header_cells, &self.metric_column, path)?;

        let mut rows = Vec::new();
        for (row_no, record) in reader.records().enumerate() {
            let record = record?;
            rows.push(parse_row(
                record.get(epoch_idx),
                record.get(value_idx),
                row_no,
                path,
            )?);
        }
        Ok(rows)
    }

    fn read_whitespace(&self, path: &Path) -> Result<Vec<EpochValue>> {
        let text = fs::read_to_string(path)?;
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let Some(header_line) = lines.next() else {
            return Err(Error::ResultsTableInvalid {
                path: path.to_path_buf(),
                message: "table has no header row".to_string(),
            });
        };
        let headers: Vec<&str> = header_line.split_whitespace().collect();
        let epoch_idx = column_index(&headers, EPOCH_COLUMN, path)?;
        let value_idx = column_index(&headers, &self.metric_column, path)?;

        let mut rows = Vec::new();
        for (row_no, line) in lines.enumerate() {
            let cells: Vec<&str> = line.split_whitespace().collect();
            rows.push(parse_row(
                cells.get(epoch_idx).copied(),
                cells.get(value_idx).copied(),
                row_no,
                path,
            )?);
        }
        Ok(rows)
    }
}

fn column_index(headers: &[&str], name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| *h == name)
        .ok_or_else(|| Error::ResultsTableInvalid {
            path: path.to_path_buf(),
            message: format!("missing column '{name}' (found: {})", headers.join(", ")),
        })
}

fn parse_row(
    epoch: Option<&str>,
    value: Option<&str>,
    row_no: usize,
    path: &Path,
) -> Result<EpochValue> {
    let invalid = |message: String| Error::ResultsTableInvalid {
        path: path.to_path_buf(),
        message,
    };

    let epoch = epoch
        .ok_or_else(|| invalid(format!("row {row_no} is missing the epoch cell")))?
        .parse::<u32>()
        .map_err(|_| invalid(format!("row {row_no} has a non-integer epoch")))?;
    let value = value
        .ok_or_else(|| invalid(format!("row {row_no} is missing the metric cell")))?
        .parse::<f64>()
        .map_err(|_| invalid(format!("row {row_no} has a non-numeric metric value")))?;

    Ok(EpochValue { epoch, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_table(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_commas_with_space_padding() {
        let (_dir, path) = write_table(
            "epoch, metrics/precision, metrics/recall, metrics/mAP_0.5\n\
             0, 0.5, 0.4, 0.30\n\
             1, 0.6, 0.5, 0.35\n",
        );
        let spec = TableSpec::new(TableLayout::Commas, "metrics/mAP_0.5");
        let rows = spec.read(&path).unwrap();

        assert_eq!(
            rows,
            vec![
                EpochValue { epoch: 0, value: 0.30 },
                EpochValue { epoch: 1, value: 0.35 },
            ]
        );
    }

    #[test]
    fn test_whitespace_layout() {
        let (_dir, path) = write_table(
            "epoch   mAP@0.5:0.95   loss\n\
             0       0.210          1.1\n\
             1       0.250          0.9\n\
             2       0.240          0.8\n",
        );
        let spec = TableSpec::new(TableLayout::Whitespace, "mAP@0.5:0.95");
        let rows = spec.read(&path).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], EpochValue { epoch: 1, value: 0.250 });
    }

    #[test]
    fn test_epoch_comes_from_the_row_not_the_position() {
        let (_dir, path) = write_table("epoch,m\n5,0.1\n9,0.2\n");
        let spec = TableSpec::new(TableLayout::Commas, "m");
        let rows = spec.read(&path).unwrap();
        assert_eq!(rows[0].epoch, 5);
        assert_eq!(rows[1].epoch, 9);
    }

    #[test]
    fn test_missing_metric_column() {
        let (_dir, path) = write_table("epoch,other\n0,1.0\n");
        let spec = TableSpec::new(TableLayout::Commas, "metrics/mAP_0.5");
        let err = spec.read(&path).unwrap_err();
        assert!(matches!(err, Error::ResultsTableInvalid { .. }));
        assert!(err.to_string().contains("metrics/mAP_0.5"));
    }

    #[test]
    fn test_bad_cell_is_reported_with_row() {
        let (_dir, path) = write_table("epoch,m\n0,ok-this-is-not-a-number\n");
        let spec = TableSpec::new(TableLayout::Commas, "m");
        let err = spec.read(&path).unwrap_err();
        assert!(err.to_string().contains("row 0"));
    }

    #[test]
    fn test_empty_table_has_no_rows() {
        let (_dir, path) = write_table("epoch,m\n");
        let spec = TableSpec::new(TableLayout::Commas, "m");
        assert!(spec.read(&path).unwrap().is_empty());
    }
}
