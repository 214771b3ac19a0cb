//! Error types for the analysis pipeline
//!
//! Each stage collaborator has its own error enum. The orchestrator wraps
//! them in [`PipelineError`] together with the stage that raised them, so the
//! recovery planner and the CLI can report which stage aborted the run.

use std::path::PathBuf;
use thiserror::Error;

use crate::workflow::{Stage, StageStatus};

/// Errors raised while loading and preprocessing input tables
#[derive(Error, Debug)]
pub enum LoadError {
    /// Input directory missing or not readable
    #[error("Input directory unreadable: {path}: {source}")]
    UnreadableDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV files were present but none could be parsed
    #[error("No valid tabular files in {0}")]
    NoValidFiles(PathBuf),

    /// A single file could not be parsed
    #[error("Malformed tabular file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// Writing the processed table failed
    #[error("Failed to write processed table {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },
}

/// Errors raised by the analyzer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Column {0} is not numeric")]
    NonNumeric(String),

    #[error("Column {0} contains missing values")]
    MissingValues(String),

    #[error("Not enough rows for {kind}: need {required}, got {actual}")]
    InsufficientRows {
        kind: &'static str,
        required: usize,
        actual: usize,
    },

    /// Numerical failure inside a computation (e.g. singular system)
    #[error("Numerical failure in {kind}: {reason}")]
    Numerical { kind: &'static str, reason: String },
}

/// Errors raised by the visualizer
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("Unsupported column combination for {plot}: {detail}")]
    Unsupported { plot: &'static str, detail: String },

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Failed to write plot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the reporter
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Missing prerequisite artifact: {0}")]
    MissingArtifact(String),

    #[error("Failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the workflow state store
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to write state {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read state {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupted state document {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },
}

/// Error from a single stage collaborator
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Visualization(#[from] VisualizationError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage collaborator failed; the stage is marked failed
    #[error("Stage {stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },

    /// Persisting or reloading workflow state failed
    #[error("State store error: {0}")]
    State(#[from] StateError),

    /// A transition the stage state machine does not allow
    #[error("Invalid transition for {stage}: {from} -> {to}")]
    InvalidTransition {
        stage: Stage,
        from: StageStatus,
        to: StageStatus,
    },

    /// Filesystem setup outside any collaborator
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Stage that raised the error, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            PipelineError::InvalidTransition { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
