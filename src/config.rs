use crate::error::{MetricsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable thresholds for the time-series metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deviation above the historical mean, in percent, that flags an expense
    /// as anomalous. The comparison is strict.
    #[serde(default = "default_anomaly_threshold_pct")]
    pub anomaly_threshold_pct: f64,

    /// Minimum number of periods before a revenue trend is projected
    #[serde(default = "default_min_trend_periods")]
    pub min_trend_periods: usize,

    /// Minimum number of periods (latest plus history) for anomaly detection
    #[serde(default = "default_min_anomaly_periods")]
    pub min_anomaly_periods: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold_pct: default_anomaly_threshold_pct(),
            min_trend_periods: default_min_trend_periods(),
            min_anomaly_periods: default_min_anomaly_periods(),
        }
    }
}

fn default_anomaly_threshold_pct() -> f64 {
    25.0
}

fn default_min_trend_periods() -> usize {
    3
}

fn default_min_anomaly_periods() -> usize {
    2
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.anomaly_threshold_pct.is_finite() || self.anomaly_threshold_pct < 0.0 {
            return Err(MetricsError::InvalidConfig(format!(
                "anomaly_threshold_pct must be a non-negative number, got {}",
                self.anomaly_threshold_pct
            )));
        }

        // A regression line needs at least two points
        if self.min_trend_periods < 2 {
            return Err(MetricsError::InvalidConfig(format!(
                "min_trend_periods must be at least 2, got {}",
                self.min_trend_periods
            )));
        }

        if self.min_anomaly_periods < 2 {
            return Err(MetricsError::InvalidConfig(format!(
                "min_anomaly_periods must be at least 2, got {}",
                self.min_anomaly_periods
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.anomaly_threshold_pct, 25.0);
        assert_eq!(config.min_trend_periods, 3);
        assert_eq!(config.min_anomaly_periods, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{"anomaly_threshold_pct": 10.0}"#).unwrap();
        assert_eq!(config.anomaly_threshold_pct, 10.0);
        assert_eq!(config.min_trend_periods, 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_json_str(r#"{"min_trend_periods": 1}"#).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidConfig(_)));

        let err = EngineConfig::from_json_str(r#"{"anomaly_threshold_pct": -1.0}"#).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidConfig(_)));

        let err = EngineConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, MetricsError::SerializationError(_)));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"min_anomaly_periods": 4}"#).unwrap();

        let config = EngineConfig::from_path(&path).unwrap();
        assert_eq!(config.min_anomaly_periods, 4);
    }
}
