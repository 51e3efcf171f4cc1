use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{Error, Result};

/// Ordered `(input, target)` pairs. Inputs and targets always have the same
/// length, and batching hands out indices so the pairing is never broken.
#[derive(Debug, Clone)]
pub struct Dataset<I> {
    inputs: Vec<I>,
    targets: Vec<f64>,
}

impl<I> Dataset<I> {
    pub fn new(inputs: Vec<I>, targets: Vec<f64>) -> Result<Dataset<I>> {
        if inputs.len() != targets.len() {
            return Err(Error::Data(format!(
                "{} inputs but {} targets",
                inputs.len(),
                targets.len()
            )));
        }
        Ok(Dataset { inputs, targets })
    }

    /// Number of samples (not batches).
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn inputs(&self) -> &[I] {
        &self.inputs
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    pub fn get(&self, index: usize) -> (&I, f64) {
        (&self.inputs[index], self.targets[index])
    }

    /// Sample visiting order for one epoch.
    pub fn order(&self, shuffle: bool, rng: &mut StdRng) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        if shuffle {
            indices.shuffle(rng);
        }
        indices
    }

    /// Applies `f` to every input, keeping the targets.
    pub fn map_inputs<J, F>(&self, f: F) -> Dataset<J>
    where
        F: FnMut(&I) -> J,
    {
        Dataset {
            inputs: self.inputs.iter().map(f).collect(),
            targets: self.targets.clone(),
        }
    }

    /// Pairs inputs with another input collection of the same length,
    /// keeping this dataset's targets.
    pub fn zip_inputs<J>(self, other: Vec<J>) -> Result<Dataset<(I, J)>> {
        if other.len() != self.len() {
            return Err(Error::Data(format!(
                "cannot pair {} samples with {} samples",
                self.len(),
                other.len()
            )));
        }
        Ok(Dataset {
            inputs: self.inputs.into_iter().zip(other).collect(),
            targets: self.targets,
        })
    }
}
