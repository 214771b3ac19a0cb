pub mod artifact;
pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod stages;
pub mod state;
pub mod table;
pub mod workflow;

pub use artifact::{serialize, Artifact};
pub use classify::{ColumnKind, ColumnPartition};
pub use config::PipelineConfig;
pub use context::{PipelineContext, StageOutput, WorkflowState};
pub use error::{PipelineError, Result};
pub use orchestrator::{Collaborators, Orchestrator};
pub use recovery::RecoveryPlan;
pub use state::StateStore;
pub use table::{Column, ColumnType, Table, Value};
pub use workflow::{Stage, StageBoard, StageStatus, TaskRecord};
