//! Recovery plans for failed runs

use std::fmt;

use serde::Serialize;

use crate::workflow::{Stage, StageBoard};

/// Remediation steps offered for a failure in `stage`
pub fn recovery_steps(stage: Stage) -> [&'static str; 4] {
    match stage {
        Stage::DataLoading => [
            "Verify input data exists and is accessible",
            "Check CSV file format and encoding",
            "Attempt to load individual files separately",
            "Skip problematic files if necessary",
        ],
        Stage::Analysis => [
            "Verify data types are appropriate for analysis",
            "Handle missing values or outliers",
            "Reduce feature set if necessary",
            "Try alternative analysis methods",
        ],
        Stage::Visualization => [
            "Check if data is appropriate for visualization",
            "Reduce dataset size if necessary",
            "Try alternative visualization types",
            "Skip problematic visualizations",
        ],
        Stage::Reporting => [
            "Verify all required results are available",
            "Check file permissions for report output",
            "Try alternative report format",
            "Generate partial report if necessary",
        ],
    }
}

/// Advisory produced after a run aborts. Building one never re-runs or
/// mutates anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryPlan {
    pub error: String,
    pub failed_task: Option<Stage>,
    pub recovery_steps: Vec<String>,
}

impl RecoveryPlan {
    /// The failed task is the first stage that did not complete
    pub fn for_state(board: &StageBoard, error: &dyn fmt::Display) -> Self {
        let failed_task = board.first_unfinished();
        let recovery_steps = failed_task
            .map(|stage| recovery_steps(stage).iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        Self {
            error: error.to_string(),
            failed_task,
            recovery_steps,
        }
    }
}

impl fmt::Display for RecoveryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Recovery plan:")?;
        match self.failed_task {
            Some(stage) => writeln!(f, "Failed task: {}", stage)?,
            None => writeln!(f, "Failed task: none")?,
        }
        writeln!(f, "Recovery steps:")?;
        for step in &self.recovery_steps {
            writeln!(f, "- {}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_for_failed_stage() {
        let mut board = StageBoard::new();
        board.start(Stage::DataLoading).unwrap();
        board.complete(Stage::DataLoading, json!({})).unwrap();
        board.start(Stage::Analysis).unwrap();
        board.complete(Stage::Analysis, json!({})).unwrap();
        board.start(Stage::Visualization).unwrap();
        board.fail(Stage::Visualization).unwrap();

        let plan = RecoveryPlan::for_state(&board, &"disk full");
        assert_eq!(plan.failed_task, Some(Stage::Visualization));
        assert_eq!(plan.recovery_steps.len(), 4);
        assert_eq!(plan.recovery_steps[0], "Check if data is appropriate for visualization");
        assert_eq!(plan.error, "disk full");
    }

    #[test]
    fn test_plan_when_everything_completed() {
        let mut board = StageBoard::new();
        for stage in Stage::ALL {
            board.start(stage).unwrap();
            board.complete(stage, json!({})).unwrap();
        }
        let plan = RecoveryPlan::for_state(&board, &"late failure");
        assert_eq!(plan.failed_task, None);
        assert!(plan.recovery_steps.is_empty());
    }

    #[test]
    fn test_display_and_json() {
        let board = StageBoard::new();
        let plan = RecoveryPlan::for_state(&board, &"no input");

        let text = plan.to_string();
        assert!(text.starts_with("Recovery plan:\nFailed task: data_loading\nRecovery steps:\n"));
        assert!(text.contains("- Skip problematic files if necessary\n"));

        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["failed_task"], json!("data_loading"));
        assert_eq!(value["error"], json!("no input"));
    }
}
