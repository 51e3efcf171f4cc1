use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::layers::Mode;

/// Inverted dropout: in `Train` mode each unit is zeroed with probability
/// `rate` and survivors are scaled by `1 / (1 - rate)`; `Eval` is identity.
#[derive(Debug, Clone)]
pub struct Dropout {
    rate: f64,
    rng: StdRng,
    mask: Vec<f64>,
}

impl Dropout {
    pub fn new(rate: f64, seed: u64) -> Dropout {
        assert!((0.0..1.0).contains(&rate), "dropout rate must be in [0, 1)");
        Dropout { rate, rng: StdRng::seed_from_u64(seed), mask: Vec::new() }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn forward(&mut self, input: &[f64], mode: Mode) -> Vec<f64> {
        if mode == Mode::Eval || self.rate == 0.0 {
            self.mask = vec![1.0; input.len()];
            return input.to_vec();
        }
        let keep = 1.0 / (1.0 - self.rate);
        let rate = self.rate;
        let rng = &mut self.rng;
        self.mask = input.iter()
            .map(|_| if rng.gen::<f64>() < rate { 0.0 } else { keep })
            .collect();
        input.iter().zip(self.mask.iter()).map(|(x, m)| x * m).collect()
    }

    pub fn backward(&self, d_output: &[f64]) -> Vec<f64> {
        d_output.iter().zip(self.mask.iter()).map(|(g, m)| g * m).collect()
    }
}
