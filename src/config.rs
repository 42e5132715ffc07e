use crate::analytics::DEFAULT_TOP_N;
use crate::cluster::{DEFAULT_CLUSTERS, DEFAULT_SEED};
use crate::error::{AnalyticsError, Result};
use crate::report::{DEFAULT_REPORT_FILE, DEFAULT_REPORT_TITLE};
use crate::suggestions::DEFAULT_TARGETS;
use serde::{Deserialize, Serialize};

/// Parameters of one dashboard run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub top_n: usize,
    pub clusters: usize,
    pub targets: Vec<f64>,
    pub seed: u64,
    pub report_title: String,
    pub report_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            top_n: DEFAULT_TOP_N,
            clusters: DEFAULT_CLUSTERS,
            targets: DEFAULT_TARGETS.to_vec(),
            seed: DEFAULT_SEED,
            report_title: DEFAULT_REPORT_TITLE.to_string(),
            report_file: DEFAULT_REPORT_FILE.to_string(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(AnalyticsError::InvalidArgument("top_n must be at least 1".to_string()));
        }
        if self.clusters == 0 {
            return Err(AnalyticsError::InvalidArgument("clusters must be at least 1".to_string()));
        }
        if self.targets.is_empty() {
            return Err(AnalyticsError::InvalidArgument("targets must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard() {
        let settings = Settings::default();
        assert_eq!(settings.top_n, 5);
        assert_eq!(settings.clusters, 3);
        assert_eq!(settings.targets, vec![60.0, 75.0, 90.0]);
        assert_eq!(settings.seed, 42);
        assert_eq!(settings.report_file, "student_report.pdf");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"top_n": 3}"#).unwrap();
        assert_eq!(settings.top_n, 3);
        assert_eq!(settings.clusters, 3);
    }

    #[test]
    fn validate_rejects_degenerate_settings() {
        let settings = Settings { targets: vec![], ..Settings::default() };
        assert!(matches!(settings.validate(), Err(AnalyticsError::InvalidArgument(_))));
        let settings = Settings { top_n: 0, ..Settings::default() };
        assert!(settings.validate().is_err());
    }
}
