pub mod adam;
pub mod schedule;
pub mod sgd;

use serde::{Serialize, Deserialize};

use crate::layers::param::NamedParamMut;

pub use adam::Adam;
pub use schedule::ExponentialLr;
pub use sgd::Sgd;

/// Applies accumulated gradients to trainable parameters. Frozen parameters
/// are skipped.
pub trait Optimizer {
    fn step(&mut self, params: Vec<NamedParamMut<'_>>);
    fn learning_rate(&self) -> f64;
    fn set_learning_rate(&mut self, lr: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

impl OptimizerKind {
    pub fn build(self, learning_rate: f64) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Adam => Box::new(Adam::new(learning_rate)),
            OptimizerKind::Sgd => Box::new(Sgd::new(learning_rate)),
        }
    }
}
