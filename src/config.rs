use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::stages::ReportKind;

/// Pipeline settings. Every field has a default, so a YAML file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory scanned for input CSV files
    pub input_dir: PathBuf,
    /// Where cleaned tables are written
    pub processed_dir: PathBuf,
    /// Root for visualizations, reports and state
    pub output_dir: PathBuf,
    /// Column used for regression and target-aware plots
    pub target: Option<String>,
    /// k for k-means, capped at the row count
    pub n_clusters: usize,
    /// Reports written per dataset, in order
    pub report_kinds: Vec<ReportKind>,
    /// Add `<column>_encoded` integer columns for categorical columns
    pub encode_categorical: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/input"),
            processed_dir: PathBuf::from("data/processed"),
            output_dir: PathBuf::from("output"),
            target: None,
            n_clusters: 3,
            report_kinds: vec![ReportKind::Technical, ReportKind::Business],
            encode_categorical: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn visualizations_dir(&self) -> PathBuf {
        self.output_dir.join("visualizations")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.output_dir.join("reports")
    }

    pub fn state_path(&self) -> PathBuf {
        self.output_dir.join("workflow_state.json")
    }

    pub fn analysis_results_path(&self) -> PathBuf {
        self.output_dir.join("analysis_results.json")
    }

    /// Create the output directories the stages write into
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.processed_dir.clone(), self.visualizations_dir(), self.reports_dir()] {
            fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.state_path(), PathBuf::from("output/workflow_state.json"));
        assert_eq!(config.reports_dir(), PathBuf::from("output/reports"));
        assert_eq!(config.report_kinds, vec![ReportKind::Technical, ReportKind::Business]);
        assert_eq!(config.n_clusters, 3);
    }

    #[test]
    fn test_partial_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.yaml");
        fs::write(&path, "target: price\nn_clusters: 5\nreport_kinds: [business]\n").unwrap();

        let config = PipelineConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.target.as_deref(), Some("price"));
        assert_eq!(config.n_clusters, 5);
        assert_eq!(config.report_kinds, vec![ReportKind::Business]);
        assert_eq!(config.input_dir, PathBuf::from("data/input"));
    }

    #[test]
    fn test_unknown_report_kind_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.yaml");
        fs::write(&path, "report_kinds: [poetry]\n").unwrap();
        assert!(PipelineConfig::from_yaml_file(&path).is_err());
    }

    #[test]
    fn test_ensure_directories() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig {
            processed_dir: dir.path().join("data/processed"),
            output_dir: dir.path().join("output"),
            ..Default::default()
        };
        config.ensure_directories().unwrap();
        assert!(config.visualizations_dir().is_dir());
        assert!(config.reports_dir().is_dir());
        assert!(config.processed_dir.is_dir());
    }
}
