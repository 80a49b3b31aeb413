use serde::{Deserialize, Serialize};

/// Status of a background batch-render job, as returned to pollers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    /// Percentage of records rendered so far.
    InProgress(u32),
    Completed(String),
    Failed(String),
}
