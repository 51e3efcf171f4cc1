use std::collections::HashMap;

use crate::layers::param::NamedParamMut;
use crate::math::matrix::Matrix;
use crate::optim::Optimizer;

/// First and second moment estimates for one parameter tensor.
struct Moments {
    m: Matrix,
    v: Matrix,
}

/// Adaptive moment estimation (Kingma & Ba) with bias correction.
///
/// Moments are keyed by the parameter's qualified name, so the optimizer can
/// be handed a freshly collected parameter list on every step.
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: i32,
    moments: HashMap<String, Moments>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Adam {
        Adam::with_betas(learning_rate, 0.9, 0.999, 1e-8)
    }

    pub fn with_betas(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Adam {
        Adam { learning_rate, beta1, beta2, epsilon, t: 0, moments: HashMap::new() }
    }

    /// Number of steps taken so far.
    pub fn steps(&self) -> i32 {
        self.t
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: Vec<NamedParamMut<'_>>) {
        self.t += 1;
        let bc1 = 1.0 - self.beta1.powi(self.t);
        let bc2 = 1.0 - self.beta2.powi(self.t);

        for (name, param) in params.into_iter().filter(|(_, p)| p.is_trainable()) {
            let (rows, cols) = param.value.shape();
            let state = self.moments.entry(name).or_insert_with(|| Moments {
                m: Matrix::zeros(rows, cols),
                v: Matrix::zeros(rows, cols),
            });
            for i in 0..rows {
                for j in 0..cols {
                    let g = param.grad.data[i][j];
                    let m = &mut state.m.data[i][j];
                    let v = &mut state.v.data[i][j];
                    *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                    *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                    let m_hat = *m / bc1;
                    let v_hat = *v / bc2;
                    param.value.data[i][j] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
                }
            }
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::param::Param;

    #[test]
    fn first_step_moves_by_learning_rate() {
        let mut p = Param::new(Matrix::from_data(vec![vec![1.0, -1.0]]));
        p.grad = Matrix::from_data(vec![vec![0.5, -3.0]]);
        let mut adam = Adam::new(0.1);
        adam.step(vec![("p".to_string(), &mut p)]);
        // Bias-corrected first step is ±lr regardless of gradient magnitude.
        assert!((p.value.data[0][0] - 0.9).abs() < 1e-6);
        assert!((p.value.data[0][1] + 0.9).abs() < 1e-6);
    }

    #[test]
    fn frozen_params_are_untouched() {
        let mut p = Param::new(Matrix::from_data(vec![vec![1.0]]));
        p.frozen = true;
        p.grad = Matrix::from_data(vec![vec![1.0]]);
        let mut adam = Adam::new(0.1);
        adam.step(vec![("p".to_string(), &mut p)]);
        assert_eq!(p.value.data[0][0], 1.0);
    }
}
