//! In-memory workflow state: stage board plus the accumulating context

use std::path::PathBuf;

use indexmap::IndexMap;

use crate::artifact::{self, Artifact};
use crate::stages::{DatasetAnalysis, VisualizationFiles};
use crate::table::Table;
use crate::workflow::{Stage, StageBoard};

/// Everything the stages have produced so far. Each field is owned by
/// exactly one stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineContext {
    /// Written by `data_loading`
    pub processed_datasets: IndexMap<String, Table>,
    /// Written by `analysis`
    pub analysis_results: IndexMap<String, DatasetAnalysis>,
    /// Written by `visualization`
    pub visualization_files: IndexMap<String, VisualizationFiles>,
    /// Appended by `reporting`
    pub report_paths: Vec<PathBuf>,
}

impl PipelineContext {
    pub fn to_artifact(&self) -> Artifact {
        let tables = self
            .processed_datasets
            .iter()
            .map(|(name, table)| (name.clone(), Artifact::Table(table.clone())));

        Artifact::map([
            ("processed_datasets", Artifact::map(tables)),
            ("analysis_results", Artifact::from_serialize(&self.analysis_results)),
            ("visualization_files", Artifact::from_serialize(&self.visualization_files)),
            ("report_paths", Artifact::from(self.report_paths.clone())),
        ])
    }

    /// Merge a stage output into the field that stage owns
    pub fn merge(&mut self, output: StageOutput) {
        match output {
            StageOutput::Loaded(datasets) => self.processed_datasets = datasets,
            StageOutput::Analyzed(results) => self.analysis_results = results,
            StageOutput::Visualized(files) => self.visualization_files = files,
            StageOutput::Reported(paths) => self.report_paths.extend(paths),
        }
    }
}

/// Result of one stage run, tagged by the stage that produced it
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Loaded(IndexMap<String, Table>),
    Analyzed(IndexMap<String, DatasetAnalysis>),
    Visualized(IndexMap<String, VisualizationFiles>),
    Reported(Vec<PathBuf>),
}

impl StageOutput {
    pub fn stage(&self) -> Stage {
        match self {
            StageOutput::Loaded(_) => Stage::DataLoading,
            StageOutput::Analyzed(_) => Stage::Analysis,
            StageOutput::Visualized(_) => Stage::Visualization,
            StageOutput::Reported(_) => Stage::Reporting,
        }
    }

    /// Task result recorded on the stage board, keyed like the context field
    pub fn to_artifact(&self) -> Artifact {
        match self {
            StageOutput::Loaded(datasets) => Artifact::map([(
                "processed_datasets",
                Artifact::map(datasets.iter().map(|(k, t)| (k.clone(), Artifact::Table(t.clone())))),
            )]),
            StageOutput::Analyzed(results) => {
                Artifact::map([("analysis_results", Artifact::from_serialize(results))])
            }
            StageOutput::Visualized(files) => {
                Artifact::map([("visualization_files", Artifact::from_serialize(files))])
            }
            StageOutput::Reported(paths) => Artifact::map([("report_paths", Artifact::from(paths.clone()))]),
        }
    }
}

/// Stage board plus context; exclusively owned by the orchestrator
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    pub board: StageBoard,
    pub context: PipelineContext,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattened JSON document `{task_status, current_state}`
    pub fn to_json(&self) -> serde_json::Value {
        let task_status = Artifact::map(self.board.records().iter().map(|(stage, record)| {
            let result = record.result.clone().map(Artifact::from).unwrap_or(Artifact::Null);
            (
                stage.as_str(),
                Artifact::map([("status", Artifact::from(record.status.to_string())), ("result", result)]),
            )
        }));

        artifact::serialize(&Artifact::map([
            ("task_status", task_status),
            ("current_state", self.context.to_artifact()),
        ]))
    }

    /// Complete the running stage with `output`, merging it into the
    /// context in the same step
    pub fn complete(&mut self, output: StageOutput) -> crate::error::Result<()> {
        let stage = output.stage();
        let result = artifact::serialize(&output.to_artifact());
        self.board.complete(stage, result)?;
        self.context.merge(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::table::{Column, Value};
    use serde_json::json;

    fn datasets() -> IndexMap<String, Table> {
        let table = Table::from_columns(vec![Column::new("x", vec![Value::Int(1), Value::Int(2)])]).unwrap();
        IndexMap::from([("a".to_string(), table)])
    }

    #[test]
    fn test_complete_merges_and_records() {
        let mut state = WorkflowState::new();
        state.board.start(Stage::DataLoading).unwrap();
        state.complete(StageOutput::Loaded(datasets())).unwrap();

        assert_eq!(state.context.processed_datasets.len(), 1);
        let record = state.board.record(Stage::DataLoading);
        assert_eq!(
            record.result,
            Some(json!({"processed_datasets": {"a": [{"x": 1}, {"x": 2}]}}))
        );
    }

    #[test]
    fn test_output_for_wrong_stage_rejected() {
        let mut state = WorkflowState::new();
        state.board.start(Stage::DataLoading).unwrap();

        let err = state.complete(StageOutput::Reported(vec![])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { stage: Stage::Reporting, .. }));
        assert!(state.context.report_paths.is_empty());
    }

    #[test]
    fn test_state_document_shape() {
        let mut state = WorkflowState::new();
        state.context.report_paths.push(PathBuf::from("out/r.md"));

        let doc = state.to_json();
        assert_eq!(doc["task_status"]["data_loading"], json!({"status": "pending", "result": null}));
        assert_eq!(
            doc["task_status"].as_object().unwrap().keys().collect::<Vec<_>>(),
            vec!["data_loading", "analysis", "visualization", "reporting"]
        );
        assert_eq!(doc["current_state"]["report_paths"], json!(["out/r.md"]));
        assert_eq!(doc["current_state"]["processed_datasets"], json!({}));
    }
}
