//! Raw log ingestion
//!
//! Parses space-delimited run-to-failure logs into typed [`SensorRecord`]s.
//! Irregular spacing produces empty columns; any column that is empty on
//! every row is dropped before the fixed schema is assigned positionally.

use crate::error::{Result, RulError};
use crate::models::{raw_schema, SensorRecord, SCHEMA_WIDTH, SENSOR_COUNT};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Field separator of raw logs
const SEPARATOR: char = ' ';

/// Normalizes raw logs into the `[unit, cycle, sensor_1 .. sensor_24]` schema
#[derive(Debug, Clone)]
pub struct IngestNormalizer {
    expected_width: usize,
}

impl Default for IngestNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestNormalizer {
    pub fn new() -> Self {
        Self {
            expected_width: SCHEMA_WIDTH,
        }
    }

    /// Read and normalize a raw log file
    pub fn normalize_file(&self, path: &Path) -> Result<Vec<SensorRecord>> {
        let file = File::open(path).map_err(|e| RulError::InputUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.normalize_reader(&path.display().to_string(), file)
    }

    /// Normalize a raw log from any reader
    pub fn normalize_reader<R: Read>(&self, source_name: &str, reader: R) -> Result<Vec<SensorRecord>> {
        let mut rows = Vec::new();
        for (idx, line) in BufReader::new(reader).lines().enumerate() {
            let line = line.map_err(|e| RulError::InputUnreadable {
                path: source_name.into(),
                source: e,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            rows.push(RawRow {
                line: idx + 1,
                fields: split_fields(source_name, idx + 1, &line)?,
            });
        }
        self.assign_schema(source_name, rows)
    }

    /// Normalize an in-memory raw log
    pub fn normalize_str(&self, source_name: &str, text: &str) -> Result<Vec<SensorRecord>> {
        self.normalize_reader(source_name, text.as_bytes())
    }

    fn assign_schema(&self, source_name: &str, rows: Vec<RawRow>) -> Result<Vec<SensorRecord>> {
        let width = rows.iter().map(|r| r.fields.len()).max().unwrap_or(0);

        // Column-level filter: keep a column if any row has a value in it
        let kept: Vec<usize> = (0..width)
            .filter(|&col| rows.iter().any(|r| matches!(r.fields.get(col), Some(Some(_)))))
            .collect();

        debug!(
            source = %source_name,
            raw_columns = width,
            kept_columns = kept.len(),
            rows = rows.len(),
            "Dropped empty columns"
        );

        if kept.len() != self.expected_width {
            return Err(RulError::SchemaMismatch {
                source_name: source_name.to_string(),
                found: kept.len(),
                expected: self.expected_width,
                schema: "unit, cycle, sensor_1..sensor_24".to_string(),
            });
        }

        let schema = raw_schema();
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let value = |pos: usize| row.fields.get(kept[pos]).copied().flatten();

            let unit = positive_int(source_name, row.line, &schema[0], value(0))?;
            let cycle = positive_int(source_name, row.line, &schema[1], value(1))?;

            let mut sensors = [f64::NAN; SENSOR_COUNT];
            for (i, sensor) in sensors.iter_mut().enumerate() {
                if let Some(v) = value(i + 2) {
                    *sensor = v;
                }
            }
            records.push(SensorRecord {
                unit,
                cycle,
                sensors,
            });
        }

        info!(source = %source_name, records = records.len(), "Ingested raw log");
        Ok(records)
    }
}

struct RawRow {
    line: usize,
    fields: Vec<Option<f64>>,
}

fn split_fields(source_name: &str, line: usize, text: &str) -> Result<Vec<Option<f64>>> {
    text.trim_end_matches(['\r', '\n'])
        .split(SEPARATOR)
        .enumerate()
        .map(|(col, token)| {
            let token = token.trim();
            if token.is_empty() {
                return Ok(None);
            }
            token.parse::<f64>().map(Some).map_err(|_| RulError::InvalidInput {
                source_name: source_name.to_string(),
                line,
                column: format!("raw column {}", col + 1),
                message: format!("'{}' is not a number", token),
            })
        })
        .collect()
}

fn positive_int(source_name: &str, line: usize, column: &str, value: Option<f64>) -> Result<u32> {
    let invalid = |message: String| RulError::InvalidInput {
        source_name: source_name.to_string(),
        line,
        column: column.to_string(),
        message,
    };
    let v = value.ok_or_else(|| invalid("value is missing".to_string()))?;
    if v.fract() != 0.0 || v < 1.0 || v > u32::MAX as f64 {
        return Err(invalid(format!("{} is not a positive integer", v)));
    }
    Ok(v as u32)
}
