use serde::{Serialize, Deserialize};

use crate::loss::mape::MapeLoss;
use crate::loss::mse::MseLoss;

/// Selects which criterion the training loop minimises.
///
/// - `Mse`  — mean-squared error; the criterion of the shared training loop.
/// - `Mape` — mean absolute percentage error; used for the recurrent
///   branch's standalone pretraining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    #[default]
    Mse,
    Mape,
}

impl LossType {
    /// Mean criterion over one batch.
    pub fn batch_loss(&self, predicted: &[f64], expected: &[f64]) -> f64 {
        match self {
            LossType::Mse  => MseLoss::loss(predicted, expected),
            LossType::Mape => MapeLoss::loss(predicted, expected),
        }
    }

    /// Gradient of `batch_loss` with respect to one prediction of the batch.
    pub fn sample_gradient(&self, predicted: f64, expected: f64, batch_len: usize) -> f64 {
        match self {
            LossType::Mse  => MseLoss::sample_gradient(predicted, expected, batch_len),
            LossType::Mape => MapeLoss::sample_gradient(predicted, expected, batch_len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_gradients_sum_to_batch_gradient() {
        let pred = [1.0, 4.0];
        let target = [2.0, 2.0];
        let h = 1e-6;
        for loss in [LossType::Mse, LossType::Mape] {
            let numeric = (loss.batch_loss(&[pred[0] + h, pred[1]], &target)
                - loss.batch_loss(&[pred[0] - h, pred[1]], &target)) / (2.0 * h);
            let analytic = loss.sample_gradient(pred[0], target[0], pred.len());
            assert!((numeric - analytic).abs() < 1e-4, "{loss:?}");
        }
    }
}
