use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;

use crate::classify::{ColumnKind, ColumnPartition};
use crate::config::PipelineConfig;
use crate::context::{StageOutput, WorkflowState};
use crate::error::{AnalysisError, PipelineError, ReportError, Result, StageError, VisualizationError};
use crate::recovery::RecoveryPlan;
use crate::stages::{
    AnalysisKind, AnalysisRequest, Analyzer, CsvLoader, DatasetAnalysis, Loader, MarkdownReporter,
    ReportRequest, Reporter, StatsAnalyzer, SvgVisualizer, VisualizationFiles, VisualizationRequest,
    Visualizer,
};
use crate::state::StateStore;
use crate::workflow::{BoardStats, Stage};

/// The four stage collaborators
pub struct Collaborators {
    pub loader: Box<dyn Loader>,
    pub analyzer: Box<dyn Analyzer>,
    pub visualizer: Box<dyn Visualizer>,
    pub reporter: Box<dyn Reporter>,
}

impl Collaborators {
    /// CSV loader, in-process statistics, SVG plots and Markdown reports,
    /// all rooted at the configured directories
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            loader: Box::new(
                CsvLoader::new(&config.processed_dir).with_encoding(config.encode_categorical),
            ),
            analyzer: Box::new(StatsAnalyzer::new(config.n_clusters)),
            visualizer: Box::new(SvgVisualizer::new(config.visualizations_dir())),
            reporter: Box::new(MarkdownReporter::new(config.reports_dir())),
        }
    }
}

/// Drives the stages in order, merging each output into the workflow state
/// and persisting the state after every completed stage.
pub struct Orchestrator {
    collaborators: Collaborators,
    store: StateStore,
    config: PipelineConfig,
    state: WorkflowState,
}

impl Orchestrator {
    /// Fresh run: every stage pending, persisted state ignored
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            store: StateStore::new(config.state_path()),
            config,
            state: WorkflowState::new(),
        }
    }

    /// Resume from the state document when there is one
    pub fn resume(config: PipelineConfig, collaborators: Collaborators) -> Result<Self> {
        let mut orchestrator = Self::new(config, collaborators);
        if let Some(state) = orchestrator.store.load()? {
            orchestrator.state = state;
        }
        Ok(orchestrator)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn stats(&self) -> BoardStats {
        self.state.board.stats()
    }

    /// Earliest pending stage, `None` when the pipeline is done
    pub fn next_task(&self) -> Option<Stage> {
        self.state.board.next_task()
    }

    /// Run every remaining stage in order. Stops at the first failure.
    pub fn run(&mut self) -> Result<()> {
        while let Some(stage) = self.next_task() {
            self.run_stage(stage)?;
        }

        let stats = self.stats();
        tracing::info!(
            "All tasks completed: {}/{} stages, {} reports",
            stats.completed,
            stats.total,
            self.state.context.report_paths.len()
        );
        Ok(())
    }

    /// Run one stage: `pending -> running`, invoke the collaborator, then
    /// either complete and persist, or mark the stage failed. A stage whose
    /// completed state cannot be saved is failed as well.
    pub fn run_stage(&mut self, stage: Stage) -> Result<()> {
        self.state.board.start(stage)?;
        tracing::info!("Executing task: {}", stage);

        let output = match self.execute(stage) {
            Ok(output) => output,
            Err(source) => {
                self.state.board.fail(stage)?;
                tracing::error!("Stage {} failed: {}", stage, source);
                return Err(PipelineError::Stage { stage, source });
            }
        };

        if let StageOutput::Analyzed(results) = &output {
            if let Err(e) = self.write_analysis_results(results) {
                self.state.board.fail(stage)?;
                return Err(e);
            }
        }

        // Commit only once the completed state is on disk
        let mut candidate = self.state.clone();
        candidate.complete(output)?;
        if let Err(e) = self.store.save(&candidate) {
            self.state.board.fail(stage)?;
            tracing::error!("Stage {} could not be persisted: {}", stage, e);
            return Err(e.into());
        }
        self.state = candidate;

        tracing::info!("Stage {} completed", stage);
        Ok(())
    }

    /// Recovery plan for an error returned by [`Orchestrator::run`]
    pub fn recovery_plan(&self, error: &PipelineError) -> RecoveryPlan {
        RecoveryPlan::for_state(&self.state.board, error)
    }

    fn execute(&self, stage: Stage) -> std::result::Result<StageOutput, StageError> {
        let output = match stage {
            Stage::DataLoading => {
                let datasets = self.collaborators.loader.load(&self.config.input_dir)?;
                tracing::info!("Loaded {} datasets", datasets.len());
                StageOutput::Loaded(datasets)
            }
            Stage::Analysis => StageOutput::Analyzed(self.analyze_all()?),
            Stage::Visualization => StageOutput::Visualized(self.visualize_all()?),
            Stage::Reporting => StageOutput::Reported(self.report_all()?),
        };
        Ok(output)
    }

    /// Configured target, if the dataset has it as a column of `kind`
    fn target_in(&self, partition: &ColumnPartition, kind: Option<ColumnKind>) -> Option<&str> {
        let target = self.config.target.as_deref()?;
        let actual = partition.kind_of(target)?;
        match kind {
            Some(kind) if kind != actual => None,
            _ => Some(target),
        }
    }

    fn analyze_all(&self) -> std::result::Result<IndexMap<String, DatasetAnalysis>, AnalysisError> {
        let mut results = IndexMap::new();

        for (name, table) in &self.state.context.processed_datasets {
            let partition = ColumnPartition::of(table);
            if !partition.has_numeric() {
                tracing::debug!("{}: no numeric columns, skipping analysis", name);
                results.insert(name.clone(), DatasetAnalysis::default());
                continue;
            }

            let target = self.target_in(&partition, Some(ColumnKind::Numeric));
            let mut kinds = vec![AnalysisKind::Descriptive, AnalysisKind::Correlation];
            if target.is_some() && partition.numeric.len() > 1 {
                kinds.push(AnalysisKind::Regression);
            }
            kinds.push(AnalysisKind::Clustering);

            tracing::debug!("{}: analyzing {:?}", name, kinds);
            let request = AnalysisRequest {
                dataset: name,
                table,
                kinds,
                target,
                features: &partition.numeric,
            };
            let analysis = self.collaborators.analyzer.analyze(&request)?;
            if let Some(path) = analysis.first_non_finite() {
                return Err(AnalysisError::Numerical {
                    kind: "analysis",
                    reason: format!("{}: non-finite value at {}", name, path),
                });
            }
            results.insert(name.clone(), analysis);
        }

        Ok(results)
    }

    fn visualize_all(&self) -> std::result::Result<IndexMap<String, VisualizationFiles>, VisualizationError> {
        let mut files = IndexMap::new();

        for (name, table) in &self.state.context.processed_datasets {
            let partition = ColumnPartition::of(table);
            let request = VisualizationRequest {
                dataset: name,
                table,
                columns: &partition.numeric,
                partition: &partition,
                target: self.target_in(&partition, None),
            };
            files.insert(name.clone(), self.collaborators.visualizer.visualize(&request)?);
        }

        Ok(files)
    }

    fn report_all(&self) -> std::result::Result<Vec<PathBuf>, ReportError> {
        let context = &self.state.context;
        let no_analysis = DatasetAnalysis::default();
        let no_files = VisualizationFiles::default();
        let mut paths = vec![];

        for name in context.processed_datasets.keys() {
            let analysis = context.analysis_results.get(name).unwrap_or(&no_analysis);
            let visualizations = context.visualization_files.get(name).unwrap_or(&no_files);

            for kind in &self.config.report_kinds {
                let request = ReportRequest {
                    dataset: name,
                    analysis,
                    visualizations,
                    kind: *kind,
                };
                let path = self.collaborators.reporter.report(&request)?;
                tracing::info!("{}: {} report at {}", name, kind, path.display());
                paths.push(path);
            }
        }

        Ok(paths)
    }

    fn write_analysis_results(&self, results: &IndexMap<String, DatasetAnalysis>) -> Result<()> {
        let path = self.config.analysis_results_path();
        let io_error = |source: std::io::Error| PipelineError::Io { path: path.clone(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(results)
            .map_err(|e| io_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        fs::write(&path, json).map_err(io_error)?;

        tracing::debug!("Saved analysis results to {}", path.display());
        Ok(())
    }
}
