//! Least-squares trend fitting and deviation checks for per-period series.

use serde::{Deserialize, Serialize};

/// Slopes closer to zero than this are reported as flat.
const FLAT_SLOPE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    pub fn tendency(&self) -> Tendency {
        if self.slope > FLAT_SLOPE_TOLERANCE {
            Tendency::Growth
        } else if self.slope < -FLAT_SLOPE_TOLERANCE {
            Tendency::Decline
        } else {
            Tendency::Stable
        }
    }
}

/// Ordinary least squares of `values[i]` against `i`. Needs at least two points.
pub fn linear_regression(values: &[f64]) -> Option<LinearFit> {
    if values.len() < 2 {
        return None;
    }

    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        covariance += dx * (y - mean_y);
        variance += dx * dx;
    }

    let slope = covariance / variance;
    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tendency {
    Growth,
    Decline,
    Stable,
}

impl Tendency {
    pub fn label(&self) -> &'static str {
        match self {
            Tendency::Growth => "crescimento",
            Tendency::Decline => "queda",
            Tendency::Stable => "estabilidade",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAssessment {
    pub latest: f64,
    pub historical_mean: f64,
    /// `None` when the historical mean is zero
    pub deviation_pct: Option<f64>,
    pub flagged: bool,
}

/// Compares the most recent value against the mean of the older ones, all in
/// absolute terms. `most_recent_first[0]` is the latest period.
pub fn assess_anomaly(most_recent_first: &[f64], threshold_pct: f64) -> Option<AnomalyAssessment> {
    let (latest, history) = most_recent_first.split_first()?;
    if history.is_empty() {
        return None;
    }

    let latest = latest.abs();
    let historical_mean = history.iter().map(|v| v.abs()).sum::<f64>() / history.len() as f64;

    let deviation_pct = if historical_mean == 0.0 {
        None
    } else {
        Some((latest - historical_mean) / historical_mean * 100.0)
    };

    Some(AnomalyAssessment {
        latest,
        historical_mean,
        deviation_pct,
        flagged: deviation_pct.is_some_and(|d| d > threshold_pct),
    })
}
