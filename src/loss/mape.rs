/// Mean absolute percentage error as a training criterion.
///
/// Used by the recurrent branch's standalone pretraining stage. The
/// denominator is clamped to `EPS` so a zero target does not produce an
/// infinite loss.
pub struct MapeLoss;

const EPS: f64 = 1e-7;

impl MapeLoss {
    /// Scalar MAPE: 100 · mean(|y - p| / max(|y|, ε))
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        let n = predicted.len() as f64;
        100.0 * predicted.iter().zip(expected.iter())
            .map(|(p, y)| (y - p).abs() / y.abs().max(EPS))
            .sum::<f64>() / n
    }

    /// Subgradient for one sample of a batch: 100 · sign(p - y) / (max(|y|, ε) · n)
    pub fn sample_gradient(predicted: f64, expected: f64, batch_len: usize) -> f64 {
        let diff = predicted - expected;
        if diff == 0.0 {
            return 0.0;
        }
        100.0 * diff.signum() / (expected.abs().max(EPS) * batch_len as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_prediction_is_zero() {
        assert_eq!(MapeLoss::loss(&[10.0, 20.0], &[10.0, 20.0]), 0.0);
        assert_eq!(MapeLoss::sample_gradient(10.0, 10.0, 2), 0.0);
    }

    #[test]
    fn ten_percent_off_is_ten() {
        assert!((MapeLoss::loss(&[11.0, 18.0], &[10.0, 20.0]) - 10.0).abs() < 1e-12);
    }
}
