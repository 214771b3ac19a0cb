mod stage;
mod board;

pub use stage::{Stage, StageStatus, TaskRecord};
pub use board::{BoardStats, StageBoard};
