//! Stage collaborators
//!
//! The orchestrator drives four collaborators through the traits below. Each
//! one gets borrowed inputs and returns an owned, typed result; none of them
//! see or mutate the workflow state. Default implementations read CSV,
//! compute statistics in-process, draw SVG/HTML plots and write Markdown
//! reports.

pub mod analyzer;
pub mod loader;
pub mod plot;
pub mod reporter;
pub mod stats;
pub mod types;
pub mod visualizer;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::classify::ColumnPartition;
use crate::error::{AnalysisError, LoadError, ReportError, VisualizationError};
use crate::table::Table;

pub use analyzer::StatsAnalyzer;
pub use loader::CsvLoader;
pub use reporter::MarkdownReporter;
pub use types::{
    AnalysisArtifact, AnalysisKind, ClusteringFit, CorrelationMatrix, DatasetAnalysis,
    DescriptiveStats, RegressionFit, ReportKind, VisualizationFiles,
};
pub use visualizer::SvgVisualizer;

/// Input to one analyzer call
#[derive(Debug, Clone)]
pub struct AnalysisRequest<'a> {
    pub dataset: &'a str,
    pub table: &'a Table,
    /// Kinds to compute, in order
    pub kinds: Vec<AnalysisKind>,
    pub target: Option<&'a str>,
    pub features: &'a [String],
}

/// Input to one visualizer call
#[derive(Debug, Clone)]
pub struct VisualizationRequest<'a> {
    pub dataset: &'a str,
    pub table: &'a Table,
    /// Columns to plot individually
    pub columns: &'a [String],
    pub partition: &'a ColumnPartition,
    pub target: Option<&'a str>,
}

/// Input to one reporter call
#[derive(Debug, Clone)]
pub struct ReportRequest<'a> {
    pub dataset: &'a str,
    pub analysis: &'a DatasetAnalysis,
    pub visualizations: &'a VisualizationFiles,
    pub kind: ReportKind,
}

pub trait Loader {
    /// Load and preprocess every table in `input_dir`, keyed by dataset name
    fn load(&self, input_dir: &Path) -> Result<IndexMap<String, Table>, LoadError>;
}

pub trait Analyzer {
    fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<DatasetAnalysis, AnalysisError>;
}

pub trait Visualizer {
    fn visualize(&self, request: &VisualizationRequest<'_>) -> Result<VisualizationFiles, VisualizationError>;
}

pub trait Reporter {
    /// Write one report and return its path
    fn report(&self, request: &ReportRequest<'_>) -> Result<PathBuf, ReportError>;
}
