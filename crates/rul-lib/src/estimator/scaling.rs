//! Optional feature scaling
//!
//! Statistics ignore `NaN` entries, and `NaN` inputs stay `NaN`. A column
//! with no spread maps every value to `value - offset`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scaling method selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMethod {
    #[default]
    MinMax,
    Standard,
}

impl ScalingMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MinMax => "minmax",
            Self::Standard => "standard",
        }
    }
}

impl fmt::Display for ScalingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minmax" => Ok(Self::MinMax),
            "standard" => Ok(Self::Standard),
            other => Err(format!("unknown scaling method '{}' (expected minmax or standard)", other)),
        }
    }
}

/// A fitted per-column affine scaler: `(x - offset) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub method: ScalingMethod,
    offset: Vec<f64>,
    scale: Vec<f64>,
}

impl Scaler {
    pub fn fit(method: ScalingMethod, rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let mut offset = Vec::with_capacity(width);
        let mut scale = Vec::with_capacity(width);

        for col in 0..width {
            let values: Vec<f64> = rows.iter().map(|r| r[col]).filter(|v| !v.is_nan()).collect();
            let (o, s) = match method {
                ScalingMethod::MinMax => {
                    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    if values.is_empty() {
                        (0.0, 1.0)
                    } else {
                        (min, max - min)
                    }
                }
                ScalingMethod::Standard => {
                    if values.is_empty() {
                        (0.0, 1.0)
                    } else {
                        let n = values.len() as f64;
                        let mean = values.iter().sum::<f64>() / n;
                        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                        (mean, var.sqrt())
                    }
                }
            };
            offset.push(o);
            scale.push(if s > 0.0 && s.is_finite() { s } else { 1.0 });
        }

        Self {
            method,
            offset,
            scale,
        }
    }

    pub fn width(&self) -> usize {
        self.offset.len()
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.offset.iter().zip(&self.scale))
            .map(|(v, (o, s))| (v - o) / s)
            .collect()
    }

    /// Map scaled values back to raw feature units
    pub fn inverse_transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.offset.iter().zip(&self.scale))
            .map(|(v, (o, s))| v * s + o)
            .collect()
    }
}
