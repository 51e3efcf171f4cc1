use std::path::PathBuf;

use serde::{Serialize, Deserialize};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::loss::loss_type::LossType;
use crate::optim::OptimizerKind;
use crate::train::early_stopping::StopDirection;

/// Rule that decides whether an epoch replaces the best snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Higher validation accuracy, ties broken by training accuracy.
    #[default]
    Accuracy,
    /// Lower validation loss.
    ValLoss,
}

/// Configuration of one `Trainer` run.
///
/// # Fields
/// - `epochs`          — maximum number of passes over the training data
/// - `batch_size`      — samples per optimiser step
/// - `learning_rate`   — initial learning rate
/// - `lr_gamma`        — factor applied to the learning rate after every epoch
/// - `patience`        — epochs without validation-loss improvement before stopping
/// - `checkpoint_path` — when set, every new best snapshot is written there and
///                       read back at the end of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub lr_gamma: f64,
    pub patience: usize,
    pub min_delta: f64,
    pub stop_direction: StopDirection,
    pub optimizer: OptimizerKind,
    pub loss: LossType,
    pub selection: Selection,
    pub shuffle: bool,
    pub seed: u64,
    pub device: Device,
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            epochs: 10,
            batch_size: 256,
            learning_rate: 0.001,
            lr_gamma: 0.95,
            patience: 5,
            min_delta: 0.0,
            stop_direction: StopDirection::Minimize,
            optimizer: OptimizerKind::Adam,
            loss: LossType::Mse,
            selection: Selection::Accuracy,
            shuffle: true,
            seed: 42,
            device: Device::Auto,
            checkpoint_path: None,
        }
    }
}

impl TrainConfig {
    pub fn new(epochs: usize, batch_size: usize, learning_rate: f64) -> Self {
        TrainConfig { epochs, batch_size, learning_rate, ..TrainConfig::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(Error::Config(format!("invalid learning rate {}", self.learning_rate)));
        }
        if !(self.lr_gamma > 0.0 && self.lr_gamma <= 1.0) {
            return Err(Error::Config(format!("lr_gamma must be in (0, 1], got {}", self.lr_gamma)));
        }
        if self.patience == 0 {
            return Err(Error::Config("patience must be at least 1".into()));
        }
        Ok(())
    }
}
