use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::activation::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::{Dense, Mode, NamedParam, NamedParamMut};
use crate::model::regressor::Regressor;

/// Hidden widths of the fusion head.
pub const FUSION_UNITS: [usize; 3] = [1024, 512, 128];

/// Joins two embeddings along the feature axis, `first` before `second`.
pub fn concat(first: &[f64], second: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(first.len() + second.len());
    out.extend_from_slice(first);
    out.extend_from_slice(second);
    out
}

/// Feed-forward regressor over concatenated branch embeddings: ReLU hidden
/// layers followed by a linear scalar output. No normalisation, no dropout.
#[derive(Debug, Clone)]
pub struct FusionHead {
    layers: Vec<Dense>,
}

impl FusionHead {
    pub fn new(input_dim: usize, units: &[usize], seed: u64) -> Result<FusionHead> {
        if input_dim == 0 || units.contains(&0) {
            return Err(Error::Config(format!(
                "fusion head widths must be positive (input {}, hidden {:?})",
                input_dim, units
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut layers = Vec::with_capacity(units.len() + 1);
        let mut width = input_dim;
        for (i, &size) in units.iter().enumerate() {
            layers.push(Dense::new(format!("fusion_{}", i + 1), width, size, ActivationFunction::ReLU, &mut rng));
            width = size;
        }
        layers.push(Dense::new("fusion_out", width, 1, ActivationFunction::Identity, &mut rng));
        debug!("fusion head: {} -> {:?} -> 1", input_dim, units);
        Ok(FusionHead { layers })
    }

    pub fn input_dim(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn forward_features(&mut self, features: &[f64]) -> f64 {
        let mut a = features.to_vec();
        for layer in self.layers.iter_mut() {
            a = layer.forward(&a);
        }
        a[0]
    }

    /// Backpropagates ∂L/∂prediction and returns ∂L/∂features.
    pub fn backward_features(&mut self, d_output: f64) -> Vec<f64> {
        let mut d = vec![d_output];
        for layer in self.layers.iter_mut().rev() {
            d = layer.backward(&d);
        }
        d
    }
}

impl Regressor for FusionHead {
    type Input = Vec<f64>;

    fn forward(&mut self, input: &Vec<f64>, _mode: Mode) -> f64 {
        self.forward_features(input)
    }

    fn backward(&mut self, d_output: f64) {
        self.backward_features(d_output);
    }

    fn params(&self) -> Vec<NamedParam<'_>> {
        self.layers.iter().flat_map(|l| l.params()).collect()
    }

    fn params_mut(&mut self) -> Vec<NamedParamMut<'_>> {
        self.layers.iter_mut().flat_map(|l| l.params_mut()).collect()
    }
}
