use serde::{Serialize, Deserialize};

/// Statistics of one training pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainStats {
    /// Mean criterion per sample.
    pub loss: f64,
    /// `100 - mean MAPE`.
    pub accuracy: f64,
}

/// Statistics of one evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidStats {
    pub loss: f64,
    pub accuracy: f64,
    pub mae: f64,
    pub rmse: f64,
}

/// One entry of the run history, appended after every completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    pub train: TrainStats,
    pub valid: ValidStats,
    /// Learning rate the epoch was trained with.
    pub learning_rate: f64,
    /// Whether this epoch replaced the best snapshot.
    pub improved: bool,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}
