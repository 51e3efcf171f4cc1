/// Mean-squared error, the default training criterion.
pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE: mean((predicted - expected)²)
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        let n = predicted.len() as f64;
        predicted.iter().zip(expected.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>() / n
    }

    /// ∂loss/∂predicted for one sample of a batch of `batch_len`: 2(p - y) / n
    pub fn sample_gradient(predicted: f64, expected: f64, batch_len: usize) -> f64 {
        2.0 * (predicted - expected) / batch_len as f64
    }
}
