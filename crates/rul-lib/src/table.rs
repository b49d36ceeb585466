//! Named-column numeric tables for intermediate pipeline files
//!
//! Tables are exchanged as comma-delimited text with a header row. Missing
//! values are written as empty fields and read back as `NaN`.

use crate::error::{Result, RulError};
use crate::models::{sensor_vocabulary, LabeledRecord, CYCLE_COLUMN, RUL_COLUMN, UNIT_COLUMN};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

const DELIMITER: &str = ",";

/// Row-major table of numeric columns
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Labeled records with every sensor column
    pub fn from_labeled(records: &[LabeledRecord]) -> Self {
        Self::from_labeled_features(records, &sensor_vocabulary())
    }

    /// Labeled records restricted to `unit`, `cycle`, the given features and `RUL`
    ///
    /// Names outside the sensor vocabulary yield `NaN` columns.
    pub fn from_labeled_features(records: &[LabeledRecord], features: &[String]) -> Self {
        let mut columns = vec![UNIT_COLUMN.to_string(), CYCLE_COLUMN.to_string()];
        columns.extend(features.iter().cloned());
        columns.push(RUL_COLUMN.to_string());

        let mut table = Self::new(columns);
        for labeled in records {
            let mut row = Vec::with_capacity(features.len() + 3);
            row.push(labeled.unit() as f64);
            row.push(labeled.cycle() as f64);
            row.extend(
                features
                    .iter()
                    .map(|f| labeled.record.sensor(f).unwrap_or(f64::NAN)),
            );
            row.push(labeled.rul as f64);
            table.rows.push(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row; its width must match the header
    pub fn push_row(&mut self, row: Vec<f64>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(RulError::SchemaMismatch {
                source_name: "table row".to_string(),
                found: row.len(),
                expected: self.columns.len(),
                schema: self.columns.join(", "),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of a named column, failing with the stage name if absent
    pub fn column(&self, stage: &str, name: &str) -> Result<Vec<f64>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| RulError::MissingColumn {
                stage: stage.to_string(),
                column: name.to_string(),
            })?;
        Ok(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Write as delimited text with a header row, creating parent directories
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RulError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| RulError::io(path, e))?;
        let mut out = BufWriter::new(file);

        let write = |out: &mut BufWriter<File>| -> std::io::Result<()> {
            writeln!(out, "{}", self.columns.join(DELIMITER))?;
            for row in &self.rows {
                let line: Vec<String> = row.iter().map(|v| format_value(*v)).collect();
                writeln!(out, "{}", line.join(DELIMITER))?;
            }
            out.flush()
        };
        write(&mut out).map_err(|e| RulError::io(path, e))?;

        debug!(path = %path.display(), rows = self.rows.len(), "Wrote table");
        Ok(())
    }

    /// Read delimited text with a header row
    pub fn read_csv(path: &Path) -> Result<Self> {
        Self::parse(&path.display().to_string(), open_input(path)?)
    }

    /// Read only the named columns; every other column is skipped unparsed
    pub fn read_csv_projected(path: &Path, keep: &[String]) -> Result<Self> {
        Self::parse_projected(&path.display().to_string(), open_input(path)?, keep)
    }

    /// Parse delimited text with a header row from any reader
    pub fn parse<R: BufRead>(source_name: &str, reader: R) -> Result<Self> {
        Self::parse_columns(source_name, reader, |_| true)
    }

    /// Parse only the header columns named in `keep`, in file order
    ///
    /// Skipped columns may hold arbitrary text.
    pub fn parse_projected<R: BufRead>(source_name: &str, reader: R, keep: &[String]) -> Result<Self> {
        Self::parse_columns(source_name, reader, |column| keep.iter().any(|k| k == column))
    }

    fn parse_columns<R, F>(source_name: &str, reader: R, wanted: F) -> Result<Self>
    where
        R: BufRead,
        F: Fn(&str) -> bool,
    {
        let mut lines = reader.lines().enumerate();

        let header = loop {
            match lines.next() {
                Some((_, line)) => {
                    let line = line.map_err(|e| read_error(source_name, e))?;
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => {
                    return Err(RulError::InvalidInput {
                        source_name: source_name.to_string(),
                        line: 1,
                        column: "-".to_string(),
                        message: "missing header row".to_string(),
                    })
                }
            }
        };
        let header: Vec<String> = header
            .split(DELIMITER)
            .map(|c| c.trim().to_string())
            .collect();
        let kept: Vec<usize> = (0..header.len()).filter(|&i| wanted(&header[i])).collect();
        if kept.len() < header.len() {
            debug!(
                source = source_name,
                skipped = header.len() - kept.len(),
                "Skipping unselected columns"
            );
        }

        let mut table = Self::new(kept.iter().map(|&i| header[i].clone()).collect());
        for (idx, line) in lines {
            let line = line.map_err(|e| read_error(source_name, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(DELIMITER).collect();
            if fields.len() != header.len() {
                return Err(RulError::SchemaMismatch {
                    source_name: format!("{} line {}", source_name, idx + 1),
                    found: fields.len(),
                    expected: header.len(),
                    schema: header.join(", "),
                });
            }
            let mut row = Vec::with_capacity(kept.len());
            for &col in &kept {
                let field = fields[col].trim();
                if field.is_empty() {
                    row.push(f64::NAN);
                    continue;
                }
                let value = field.parse::<f64>().map_err(|_| RulError::InvalidInput {
                    source_name: source_name.to_string(),
                    line: idx + 1,
                    column: header[col].clone(),
                    message: format!("'{}' is not a number", field),
                })?;
                row.push(value);
            }
            table.rows.push(row);
        }
        Ok(table)
    }
}

fn open_input(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| RulError::InputUnreadable {
            path: path.to_path_buf(),
            source: e,
        })
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

fn read_error(source_name: &str, err: std::io::Error) -> RulError {
    RulError::InputUnreadable {
        path: source_name.into(),
        source: err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SensorRecord, SENSOR_COUNT};
    use tempfile::TempDir;

    fn labeled(unit: u32, cycle: u32, rul: u32) -> LabeledRecord {
        let mut sensors = [0.0; SENSOR_COUNT];
        for (i, s) in sensors.iter_mut().enumerate() {
            *s = (i + 1) as f64 * 0.5 + cycle as f64;
        }
        sensors[3] = f64::NAN;
        LabeledRecord {
            record: SensorRecord {
                unit,
                cycle,
                sensors,
            },
            rul,
        }
    }

    #[test]
    fn test_header_names_every_column() {
        let table = Table::from_labeled(&[labeled(1, 1, 2)]);
        assert_eq!(table.columns().len(), SENSOR_COUNT + 3);
        assert_eq!(table.columns()[0], "unit");
        assert_eq!(table.columns()[1], "cycle");
        assert_eq!(table.columns()[2], "sensor_1");
        assert_eq!(table.columns().last().unwrap(), "RUL");
    }

    #[test]
    fn test_selected_features_keep_order() {
        let features = vec!["sensor_9".to_string(), "sensor_2".to_string()];
        let table = Table::from_labeled_features(&[labeled(3, 7, 0)], &features);
        assert_eq!(table.columns(), &["unit", "cycle", "sensor_9", "sensor_2", "RUL"]);
        assert_eq!(table.rows()[0], vec![3.0, 7.0, 11.5, 8.0, 0.0]);
    }

    #[test]
    fn test_write_then_read_preserves_missing_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("train_with_rul.csv");
        let table = Table::from_labeled(&[labeled(1, 1, 1), labeled(1, 2, 0)]);
        table.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("unit,cycle,sensor_1,"));
        assert!(content.contains(",,"), "NaN should be written as an empty field");

        let read = Table::read_csv(&path).unwrap();
        assert_eq!(read.columns(), table.columns());
        assert_eq!(read.len(), 2);
        let sensor_4 = read.column("test", "sensor_4").unwrap();
        assert!(sensor_4.iter().all(|v| v.is_nan()));
        assert_eq!(read.column("test", "RUL").unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_missing_column_names_stage() {
        let table = Table::new(vec!["unit".to_string()]);
        let err = table.column("evaluate", "cycle").unwrap_err();
        assert_eq!(err.to_string(), "evaluate: missing column 'cycle'");
    }

    #[test]
    fn test_parse_rejects_ragged_rows() {
        let input = "a,b\n1,2\n3\n";
        let err = Table::parse("inline", input.as_bytes()).unwrap_err();
        assert!(matches!(err, RulError::SchemaMismatch { found: 1, expected: 2, .. }));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        let input = "sensor_5,sensor_15\n490.2,abc\n";
        let err = Table::parse("upload.csv", input.as_bytes()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("upload.csv"));
        assert!(msg.contains("sensor_15"));
    }

    #[test]
    fn test_projection_skips_text_columns() {
        let keep = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let input = "engine_id,b,timestamp,a\nE-17,2.0,2024-05-01T10:00,1.0\nE-18,,n/a,3.5\n";
        let table = Table::parse_projected("upload.csv", input.as_bytes(), &keep).unwrap();

        assert_eq!(table.columns(), &["b", "a"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], vec![2.0, 1.0]);
        assert!(table.rows()[1][0].is_nan());
        assert_eq!(table.rows()[1][1], 3.5);
    }

    #[test]
    fn test_projection_still_validates_kept_columns() {
        let keep = vec!["a".to_string()];
        let err = Table::parse_projected("upload.csv", "id,a\nx,oops\n".as_bytes(), &keep).unwrap_err();
        assert!(err.to_string().contains("column a"));
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut table = Table::new(vec!["a".to_string(), "b".to_string()]);
        assert!(table.push_row(vec![1.0, 2.0]).is_ok());
        assert!(table.push_row(vec![1.0]).is_err());
        assert_eq!(table.len(), 1);
    }
}
