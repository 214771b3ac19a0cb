use std::collections::HashMap;

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use super::stage::{Stage, StageStatus, TaskRecord};
use crate::error::{PipelineError, Result};

/// Stage state machine.
///
/// The stages form a linear dependency graph: each stage depends on the one
/// before it. Only the earliest pending stage may start, and only once all
/// of its dependencies are completed.
#[derive(Debug, Clone)]
pub struct StageBoard {
    graph: DiGraph<Stage, ()>,
    indices: HashMap<Stage, NodeIndex>,
    records: IndexMap<Stage, TaskRecord>,
}

impl StageBoard {
    /// Fresh board with every stage pending
    pub fn new() -> Self {
        Self::from_records(IndexMap::new())
    }

    /// Board restored from persisted records. Stages missing from `records`
    /// start out pending; records are kept in stage order.
    pub fn from_records(mut records: IndexMap<Stage, TaskRecord>) -> Self {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();

        for stage in Stage::ALL {
            indices.insert(stage, graph.add_node(stage));
        }

        // Edge direction: dependency -> dependent
        for stage in Stage::ALL {
            if let Some(prev) = stage.previous() {
                graph.add_edge(indices[&prev], indices[&stage], ());
            }
        }

        let records = Stage::ALL
            .into_iter()
            .map(|stage| (stage, records.shift_remove(&stage).unwrap_or_default()))
            .collect();

        Self { graph, indices, records }
    }

    pub fn records(&self) -> &IndexMap<Stage, TaskRecord> {
        &self.records
    }

    pub fn record(&self, stage: Stage) -> &TaskRecord {
        &self.records[&stage]
    }

    pub fn status(&self, stage: Stage) -> StageStatus {
        self.record(stage).status
    }

    /// First pending stage in execution order, if any
    pub fn next_task(&self) -> Option<Stage> {
        self.execution_order().into_iter().find(|stage| self.record(*stage).is_pending())
    }

    /// First stage that is not completed. After a failure this is the
    /// stage that failed.
    pub fn first_unfinished(&self) -> Option<Stage> {
        self.execution_order().into_iter().find(|stage| !self.record(*stage).is_completed())
    }

    /// Stages that must complete before `stage` can start
    pub fn dependencies(&self, stage: Stage) -> Vec<Stage> {
        self.graph
            .neighbors_directed(self.indices[&stage], Direction::Incoming)
            .filter_map(|idx| self.graph.node_weight(idx).copied())
            .collect()
    }

    /// Topologically sorted stage order
    pub fn execution_order(&self) -> Vec<Stage> {
        // The graph is a chain built in `from_records`, so it has no cycle
        toposort(&self.graph, None)
            .map(|sorted| {
                sorted
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).copied())
                    .collect()
            })
            .unwrap_or_else(|_| Stage::ALL.to_vec())
    }

    /// `pending -> running`, only for the next task
    pub fn start(&mut self, stage: Stage) -> Result<()> {
        let deps_completed = self
            .dependencies(stage)
            .iter()
            .all(|dep| self.record(*dep).is_completed());

        if self.next_task() != Some(stage) || !deps_completed {
            return Err(self.invalid(stage, StageStatus::Running));
        }

        self.record_mut(stage).start();
        tracing::debug!("Stage {} running", stage);
        Ok(())
    }

    /// `running -> completed` with the serialized stage output
    pub fn complete(&mut self, stage: Stage, result: serde_json::Value) -> Result<()> {
        if !self.record(stage).is_running() {
            return Err(self.invalid(stage, StageStatus::Completed));
        }
        self.record_mut(stage).complete(result);
        Ok(())
    }

    /// `running -> failed`
    pub fn fail(&mut self, stage: Stage) -> Result<()> {
        if !self.record(stage).is_running() {
            return Err(self.invalid(stage, StageStatus::Failed));
        }
        self.record_mut(stage).fail();
        Ok(())
    }

    /// Put every stage that is not completed back to pending.
    /// Returns the stages that were reset.
    pub fn reset_unfinished(&mut self) -> Vec<Stage> {
        let mut reset = vec![];
        for (stage, record) in self.records.iter_mut() {
            if !record.is_completed() && !record.is_pending() {
                record.reset();
                reset.push(*stage);
            }
        }
        reset
    }

    /// Completed stages form a prefix of the execution order
    pub fn is_prefix_consistent(&self) -> bool {
        let completed = self
            .records
            .values()
            .take_while(|r| r.is_completed())
            .count();
        self.records.values().skip(completed).all(|r| !r.is_completed())
    }

    /// Check if all stages are completed
    pub fn is_complete(&self) -> bool {
        self.records.values().all(TaskRecord::is_completed)
    }

    /// Get completion statistics
    pub fn stats(&self) -> BoardStats {
        let count = |status: StageStatus| self.records.values().filter(|r| r.status == status).count();

        BoardStats {
            total: self.records.len(),
            completed: count(StageStatus::Completed),
            failed: count(StageStatus::Failed),
            pending: count(StageStatus::Pending),
            running: count(StageStatus::Running),
        }
    }

    fn record_mut(&mut self, stage: Stage) -> &mut TaskRecord {
        // Every stage is inserted by `from_records`
        self.records.entry(stage).or_default()
    }

    fn invalid(&self, stage: Stage, to: StageStatus) -> PipelineError {
        PipelineError::InvalidTransition {
            stage,
            from: self.status(stage),
            to,
        }
    }
}

impl Default for StageBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub running: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(board: &mut StageBoard, stage: Stage) {
        board.start(stage).unwrap();
        board.complete(stage, json!({})).unwrap();
    }

    #[test]
    fn test_linear_progression() {
        let mut board = StageBoard::new();
        assert_eq!(board.next_task(), Some(Stage::DataLoading));

        run(&mut board, Stage::DataLoading);
        assert_eq!(board.next_task(), Some(Stage::Analysis));

        run(&mut board, Stage::Analysis);
        run(&mut board, Stage::Visualization);
        run(&mut board, Stage::Reporting);

        assert_eq!(board.next_task(), None);
        assert!(board.is_complete());
        assert_eq!(board.stats().completed, 4);
    }

    #[test]
    fn test_only_earliest_pending_may_start() {
        let mut board = StageBoard::new();
        let err = board.start(Stage::Analysis).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition { stage: Stage::Analysis, from: StageStatus::Pending, to: StageStatus::Running }
        ));
        assert!(board.record(Stage::Analysis).is_pending());
    }

    #[test]
    fn test_complete_requires_running() {
        let mut board = StageBoard::new();
        assert!(board.complete(Stage::DataLoading, json!({})).is_err());
        assert!(board.fail(Stage::DataLoading).is_err());
    }

    #[test]
    fn test_failure_blocks_later_stages() {
        let mut board = StageBoard::new();
        run(&mut board, Stage::DataLoading);
        board.start(Stage::Analysis).unwrap();
        board.fail(Stage::Analysis).unwrap();

        assert_eq!(board.next_task(), Some(Stage::Visualization));
        assert!(board.start(Stage::Visualization).is_err());
        assert_eq!(board.first_unfinished(), Some(Stage::Analysis));

        assert_eq!(board.reset_unfinished(), vec![Stage::Analysis]);
        assert_eq!(board.next_task(), Some(Stage::Analysis));
    }

    #[test]
    fn test_dependencies_and_order() {
        let board = StageBoard::new();
        assert!(board.dependencies(Stage::DataLoading).is_empty());
        assert_eq!(board.dependencies(Stage::Reporting), vec![Stage::Visualization]);
        assert_eq!(board.execution_order(), Stage::ALL.to_vec());
    }

    #[test]
    fn test_from_records_fills_and_orders() {
        let mut records = IndexMap::new();
        records.insert(
            Stage::Analysis,
            TaskRecord { status: StageStatus::Completed, result: Some(json!({})) },
        );
        records.insert(
            Stage::DataLoading,
            TaskRecord { status: StageStatus::Completed, result: Some(json!({})) },
        );

        let board = StageBoard::from_records(records);
        assert_eq!(board.records().keys().copied().collect::<Vec<_>>(), Stage::ALL.to_vec());
        assert_eq!(board.next_task(), Some(Stage::Visualization));
        assert!(board.is_prefix_consistent());
    }

    #[test]
    fn test_gap_in_completed_stages_is_inconsistent() {
        let mut records = IndexMap::new();
        records.insert(
            Stage::Visualization,
            TaskRecord { status: StageStatus::Completed, result: Some(json!({})) },
        );
        assert!(!StageBoard::from_records(records).is_prefix_consistent());
    }
}
