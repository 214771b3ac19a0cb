//! Workflow state store
//!
//! One JSON document, `{task_status, current_state}`, rewritten after every
//! completed stage. Writes go to a temporary file in the same directory and
//! are renamed into place, so a reader never sees a partial document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Map;

use crate::context::{PipelineContext, WorkflowState};
use crate::error::StateError;
use crate::stages::{DatasetAnalysis, VisualizationFiles};
use crate::table::Table;
use crate::workflow::{Stage, StageBoard, TaskRecord};

#[derive(Debug, Deserialize)]
struct PersistedState {
    task_status: IndexMap<String, TaskRecord>,
    #[serde(default)]
    current_state: PersistedContext,
}

#[derive(Debug, Default, Deserialize)]
struct PersistedContext {
    #[serde(default)]
    processed_datasets: IndexMap<String, Vec<Map<String, serde_json::Value>>>,
    #[serde(default)]
    analysis_results: IndexMap<String, DatasetAnalysis>,
    #[serde(default)]
    visualization_files: IndexMap<String, VisualizationFiles>,
    #[serde(default)]
    report_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Atomically replace the state document
    pub fn save(&self, state: &WorkflowState) -> Result<(), StateError> {
        let write_failed = |source: io::Error| StateError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(write_failed)?;

        let bytes = serde_json::to_vec_pretty(&state.to_json())
            .map_err(|e| write_failed(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("workflow_state.json");
        let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        fs::write(&tmp_path, bytes).map_err(write_failed)?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(write_failed(e));
        }

        tracing::debug!("Saved workflow state to {}", self.path.display());
        Ok(())
    }

    /// Load the state document. `Ok(None)` when there is none yet.
    pub fn load(&self) -> Result<Option<WorkflowState>, StateError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::ReadFailed {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let persisted: PersistedState =
            serde_json::from_str(&json).map_err(|e| self.corrupted(e.to_string()))?;

        let mut records = IndexMap::new();
        for (name, record) in persisted.task_status {
            let stage: Stage = name.parse().map_err(|e: String| self.corrupted(e))?;
            records.insert(stage, record);
        }

        let mut board = StageBoard::from_records(records);
        for stage in board.reset_unfinished() {
            tracing::warn!("Stage {} was not completed; resetting to pending", stage);
        }
        if !board.is_prefix_consistent() {
            return Err(self.corrupted("completed stages do not form a prefix".to_string()));
        }
        if let Some((stage, _)) = board
            .records()
            .iter()
            .find(|(_, r)| r.is_completed() && r.result.is_none())
        {
            return Err(self.corrupted(format!("completed stage {} has no result", stage)));
        }

        let saved = persisted.current_state;
        let mut context = PipelineContext {
            processed_datasets: saved
                .processed_datasets
                .into_iter()
                .map(|(name, rows)| (name, Table::from_records(&rows)))
                .collect(),
            analysis_results: saved.analysis_results,
            visualization_files: saved.visualization_files,
            report_paths: saved.report_paths,
        };
        drop_unowned(&board, &mut context);

        tracing::info!(
            "Loaded workflow state from {} ({}/{} stages completed)",
            self.path.display(),
            board.stats().completed,
            board.stats().total
        );
        Ok(Some(WorkflowState { board, context }))
    }

    /// Delete the state document. Returns whether one existed.
    pub fn remove(&self) -> Result<bool, StateError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StateError::WriteFailed {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn corrupted(&self, reason: String) -> StateError {
        StateError::Corrupted {
            path: self.path.clone(),
            reason,
        }
    }
}

/// Clear context fields whose owning stage is not completed
fn drop_unowned(board: &StageBoard, context: &mut PipelineContext) {
    let done = |stage: Stage| board.record(stage).is_completed();

    if !done(Stage::DataLoading) && !context.processed_datasets.is_empty() {
        tracing::warn!("Discarding processed datasets of an unfinished stage");
        context.processed_datasets.clear();
    }
    if !done(Stage::Analysis) && !context.analysis_results.is_empty() {
        tracing::warn!("Discarding analysis results of an unfinished stage");
        context.analysis_results.clear();
    }
    if !done(Stage::Visualization) && !context.visualization_files.is_empty() {
        tracing::warn!("Discarding visualization files of an unfinished stage");
        context.visualization_files.clear();
    }
    if !done(Stage::Reporting) && !context.report_paths.is_empty() {
        tracing::warn!("Discarding report paths of an unfinished stage");
        context.report_paths.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StageOutput;
    use crate::table::{Column, Value};
    use tempfile::TempDir;

    fn loaded_state() -> WorkflowState {
        let table = Table::from_columns(vec![
            Column::new("x", vec![Value::Float(1.5), Value::Float(2.5)]),
            Column::new("day", vec![Value::parse("2024-01-01"), Value::parse("2024-01-02")]),
        ])
        .unwrap();

        let mut state = WorkflowState::new();
        state.board.start(Stage::DataLoading).unwrap();
        state
            .complete(StageOutput::Loaded(IndexMap::from([("a".to_string(), table)])))
            .unwrap();
        state
    }

    #[test]
    fn test_missing_file_is_fresh_run() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("workflow_state.json"));
        assert!(store.load().unwrap().is_none());
        assert!(!store.remove().unwrap());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("out").join("workflow_state.json"));
        let state = loaded_state();

        store.save(&state).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded.board.records(), state.board.records());
        assert_eq!(loaded.context, state.context);
        assert_eq!(loaded.board.next_task(), Some(Stage::Analysis));

        // No temp files left behind
        let leftovers = fs::read_dir(dir.path().join("out")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_corrupted_document() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("workflow_state.json"));
        fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.load(), Err(StateError::Corrupted { .. })));

        fs::write(store.path(), r#"{"task_status": {"plotting": {"status": "pending", "result": null}}}"#).unwrap();
        assert!(matches!(store.load(), Err(StateError::Corrupted { .. })));
    }

    #[test]
    fn test_unfinished_stages_reset_on_load() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("workflow_state.json"));
        fs::write(
            store.path(),
            r#"{
                "task_status": {
                    "data_loading": {"status": "completed", "result": {"processed_datasets": {}}},
                    "analysis": {"status": "running", "result": null}
                },
                "current_state": {"analysis_results": {"a": {}}}
            }"#,
        )
        .unwrap();

        let state = store.load().unwrap().unwrap();
        assert_eq!(state.board.next_task(), Some(Stage::Analysis));
        assert!(state.context.analysis_results.is_empty());
    }

    #[test]
    fn test_gap_in_completed_stages_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("workflow_state.json"));
        fs::write(
            store.path(),
            r#"{"task_status": {"analysis": {"status": "completed", "result": {}}}}"#,
        )
        .unwrap();
        assert!(matches!(store.load(), Err(StateError::Corrupted { .. })));
    }
}
