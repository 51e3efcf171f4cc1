//! Regression metrics of the training loop. Every mean is taken over the
//! number of samples, never the number of batches.

use crate::train::epoch_stats::{TrainStats, ValidStats};

/// Summed absolute percentage error: `100 * Σ |t - p| / |t|`.
///
/// A zero target yields an infinite term.
pub fn mape(truth: &[f64], pred: &[f64]) -> f64 {
    100.0 * truth.iter().zip(pred.iter())
        .map(|(t, p)| (t - p).abs() / t.abs())
        .sum::<f64>()
}

/// `100 - mape_sum / n`.
pub fn accuracy(mape_sum: f64, samples: usize) -> f64 {
    100.0 - mape_sum / samples as f64
}

/// `sqrt(squared_error_sum / n)`.
pub fn rmse(squared_error_sum: f64, samples: usize) -> f64 {
    (squared_error_sum / samples as f64).sqrt()
}

/// Running sums for one pass over a dataset.
#[derive(Debug, Clone, Default)]
pub struct MetricAccumulator {
    samples: usize,
    loss_sum: f64,
    ape_sum: f64,
    abs_sum: f64,
    sq_sum: f64,
}

impl MetricAccumulator {
    /// Adds one batch. `batch_loss` is the batch-mean criterion, so it is
    /// weighted by the batch length before summing.
    pub fn add_batch(&mut self, batch_loss: f64, predictions: &[f64], targets: &[f64]) {
        self.samples += predictions.len();
        self.loss_sum += batch_loss * predictions.len() as f64;
        self.ape_sum += mape(targets, predictions);
        for (t, p) in targets.iter().zip(predictions.iter()) {
            let e = (t - p).abs();
            self.abs_sum += e;
            self.sq_sum += e * e;
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn train_stats(&self) -> TrainStats {
        TrainStats {
            loss: self.loss_sum / self.samples as f64,
            accuracy: accuracy(self.ape_sum, self.samples),
        }
    }

    pub fn valid_stats(&self) -> ValidStats {
        ValidStats {
            loss: self.loss_sum / self.samples as f64,
            accuracy: accuracy(self.ape_sum, self.samples),
            mae: self.abs_sum / self.samples as f64,
            rmse: rmse(self.sq_sum, self.samples),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions_score_full_accuracy() {
        let ape = mape(&[10.0, 20.0], &[10.0, 20.0]);
        assert_eq!(ape, 0.0);
        assert_eq!(accuracy(ape, 2), 100.0);
    }

    #[test]
    fn mape_sums_per_sample_percentages() {
        // 10% + 50%
        let ape = mape(&[10.0, 20.0], &[11.0, 10.0]);
        assert!((ape - 60.0).abs() < 1e-9);
        assert!((accuracy(ape, 2) - 70.0).abs() < 1e-9);
    }

    #[test]
    fn batch_partition_does_not_change_means() {
        let (pred, target) = ([1.0, 2.0, 4.0], [2.0, 2.0, 2.0]);
        let mut whole = MetricAccumulator::default();
        whole.add_batch(5.0 / 3.0, &pred, &target);

        let mut split = MetricAccumulator::default();
        split.add_batch(0.5, &pred[..2], &target[..2]);
        split.add_batch(4.0, &pred[2..], &target[2..]);

        let (a, b) = (whole.valid_stats(), split.valid_stats());
        assert!((a.loss - b.loss).abs() < 1e-12);
        assert!((a.mae - 1.0).abs() < 1e-12);
        assert!((b.mae - 1.0).abs() < 1e-12);
        assert!((b.rmse - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(split.samples(), 3);
    }
}
