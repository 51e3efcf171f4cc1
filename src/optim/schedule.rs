use crate::optim::Optimizer;

/// Multiplies the optimizer's learning rate by `gamma` once per epoch.
#[derive(Debug, Clone)]
pub struct ExponentialLr {
    gamma: f64,
    base_lr: f64,
    epoch: usize,
}

impl ExponentialLr {
    pub fn new(optimizer: &dyn Optimizer, gamma: f64) -> ExponentialLr {
        ExponentialLr { gamma, base_lr: optimizer.learning_rate(), epoch: 0 }
    }

    pub fn step(&mut self, optimizer: &mut dyn Optimizer) {
        self.epoch += 1;
        optimizer.set_learning_rate(self.base_lr * self.gamma.powi(self.epoch as i32));
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}
