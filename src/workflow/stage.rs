use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DataLoading,
    Analysis,
    Visualization,
    Reporting,
}

impl Stage {
    /// Fixed execution order
    pub const ALL: [Stage; 4] = [
        Stage::DataLoading,
        Stage::Analysis,
        Stage::Visualization,
        Stage::Reporting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::DataLoading => "data_loading",
            Stage::Analysis => "analysis",
            Stage::Visualization => "visualization",
            Stage::Reporting => "reporting",
        }
    }

    /// Position in [`Stage::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Stage immediately before this one
    pub fn previous(&self) -> Option<Stage> {
        self.index().checked_sub(1).map(|i| Stage::ALL[i])
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("Unknown stage: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Status and result of one stage.
///
/// `result` is set exactly when the stage is completed; it holds the
/// serialized stage output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskRecord {
    pub status: StageStatus,
    pub result: Option<serde_json::Value>,
}

impl TaskRecord {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.status == StageStatus::Pending
    }

    pub fn is_running(&self) -> bool {
        self.status == StageStatus::Running
    }

    pub fn is_completed(&self) -> bool {
        self.status == StageStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == StageStatus::Failed
    }

    pub fn start(&mut self) {
        self.status = StageStatus::Running;
        self.result = None;
    }

    pub fn complete(&mut self, result: serde_json::Value) {
        self.status = StageStatus::Completed;
        self.result = Some(result);
    }

    pub fn fail(&mut self) {
        self.status = StageStatus::Failed;
        self.result = None;
    }

    /// Back to pending, dropping any result
    pub fn reset(&mut self) {
        self.status = StageStatus::Pending;
        self.result = None;
    }
}
