use rand::Rng;

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};
use crate::layers::param::{NamedParam, NamedParamMut, Param};

/// Fully connected layer `a = act(x · W + b)`.
///
/// The last forward input and pre-activation are cached so that `backward`
/// can be called once per forward.
#[derive(Debug, Clone)]
pub struct Dense {
    name: String,
    pub weights: Param,  // (input_size, size)
    pub biases: Param,   // (1, size)
    pub activator: ActivationFunction,
    input: Vec<f64>,
    pre_neurons: Vec<f64>,  // z = xW + b, needed for the activation derivative
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(
        name: impl Into<String>,
        input_size: usize,
        size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Dense {
        let weights = match activation {
            ActivationFunction::ReLU => Matrix::he(input_size, size, rng),
            _ => Matrix::xavier(input_size, size, rng),
        };
        Dense {
            name: name.into(),
            weights: Param::new(weights),
            biases: Param::new(Matrix::zeros(1, size)),
            activator: activation,
            input: Vec::new(),
            pre_neurons: Vec::new(),
        }
    }

    /// Marks both weight tensors as frozen.
    pub fn frozen(mut self) -> Dense {
        self.set_frozen(true);
        self
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.weights.frozen = frozen;
        self.biases.frozen = frozen;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_size(&self) -> usize {
        self.weights.value.rows
    }

    pub fn size(&self) -> usize {
        self.weights.value.cols
    }

    pub fn forward(&mut self, input: &[f64]) -> Vec<f64> {
        let mut z = self.weights.value.left_mul(input);
        for (zi, b) in z.iter_mut().zip(self.biases.value.data[0].iter()) {
            *zi += b;
        }
        let a = z.iter().map(|&x| self.activator.function(x)).collect();
        self.input = input.to_vec();
        self.pre_neurons = z;
        a
    }

    /// Accumulates gradients for the cached sample and returns ∂L/∂input.
    /// `d_output` is ∂L/∂a for this layer.
    pub fn backward(&mut self, d_output: &[f64]) -> Vec<f64> {
        assert_eq!(
            d_output.len(),
            self.pre_neurons.len(),
            "Dense::backward called without a matching forward"
        );
        // δ = error ⊙ σ'(z)
        let delta: Vec<f64> = d_output.iter().zip(self.pre_neurons.iter())
            .map(|(g, &z)| g * self.activator.derivative(z))
            .collect();

        if !self.weights.frozen {
            self.weights.grad.add_outer(&self.input, &delta);
            self.biases.grad.add_row(&delta);
        }
        self.weights.value.right_mul(&delta)
    }

    pub fn params(&self) -> Vec<NamedParam<'_>> {
        vec![
            (format!("{}.weights", self.name), &self.weights),
            (format!("{}.biases", self.name), &self.biases),
        ]
    }

    pub fn params_mut(&mut self) -> Vec<NamedParamMut<'_>> {
        vec![
            (format!("{}.weights", self.name), &mut self.weights),
            (format!("{}.biases", self.name), &mut self.biases),
        ]
    }
}
