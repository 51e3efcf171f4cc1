use crate::layers::param::NamedParamMut;
use crate::optim::Optimizer;

/// Plain stochastic gradient descent: `w -= lr · ∂L/∂w`.
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: Vec<NamedParamMut<'_>>) {
        for (_, param) in params.into_iter().filter(|(_, p)| p.is_trainable()) {
            for (row, grad) in param.value.data.iter_mut().zip(param.grad.data.iter()) {
                for (w, g) in row.iter_mut().zip(grad.iter()) {
                    *w -= self.learning_rate * g;
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
