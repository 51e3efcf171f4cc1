use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::{Dense, Dropout, Lstm, Mode, NamedParam, NamedParamMut};
use crate::math::matrix::Matrix;
use crate::model::branch::Branch;
use crate::model::regressor::Regressor;

/// Architecture of the recurrent sequence branch.
///
/// Defaults reproduce the configuration the RUL experiments use:
/// LSTM(512) → LSTM(256) → flatten → dropout(0.3) → dense(256, relu)
/// → dense(512, relu) → dense(1000) → dense(1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrentConfig {
    /// Features per time step (1 for a single sensor history).
    pub input_features: usize,
    pub lstm_units: Vec<usize>,
    /// Candidate/cell-output activation of every LSTM layer.
    pub cell_activation: ActivationFunction,
    pub dropout: f64,
    /// ReLU layers between the dropout and the embedding layer.
    pub dense_units: Vec<usize>,
    /// Width of the linear layer whose output is the branch embedding.
    pub embedding_dim: usize,
    pub seed: u64,
}

impl Default for RecurrentConfig {
    fn default() -> Self {
        RecurrentConfig {
            input_features: 1,
            lstm_units: vec![512, 256],
            cell_activation: ActivationFunction::ReLU,
            dropout: 0.3,
            dense_units: vec![256, 512],
            embedding_dim: 1000,
            seed: 42,
        }
    }
}

impl RecurrentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_features == 0 || self.embedding_dim == 0 {
            return Err(Error::Config("recurrent branch widths must be positive".into()));
        }
        if self.lstm_units.is_empty() || self.lstm_units.contains(&0) {
            return Err(Error::Config("recurrent branch needs at least one non-empty LSTM layer".into()));
        }
        if self.dense_units.contains(&0) {
            return Err(Error::Config("dense layer widths must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::Config(format!("dropout rate {} is outside [0, 1)", self.dropout)));
        }
        Ok(())
    }
}

/// Stacked-LSTM encoder over a sensor history with a scalar output layer.
///
/// `predict` runs the whole stack; `embed` stops before `output_layer`.
#[derive(Debug, Clone)]
pub struct RecurrentBranch {
    seq_len: usize,
    input_features: usize,
    lstm: Vec<Lstm>,
    dropout: Dropout,
    hidden: Vec<Dense>,
    output: Dense,
}

impl RecurrentBranch {
    pub fn new(seq_len: usize, config: &RecurrentConfig) -> Result<RecurrentBranch> {
        config.validate()?;
        if seq_len == 0 {
            return Err(Error::Config("sequence length must be positive".into()));
        }
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut lstm = Vec::with_capacity(config.lstm_units.len());
        let mut width = config.input_features;
        for (i, &units) in config.lstm_units.iter().enumerate() {
            lstm.push(Lstm::new(format!("lstm_{}", i + 1), width, units, config.cell_activation, &mut rng));
            width = units;
        }

        let mut hidden = Vec::with_capacity(config.dense_units.len() + 1);
        let mut width = seq_len * width;
        for (i, &units) in config.dense_units.iter().enumerate() {
            hidden.push(Dense::new(format!("dense_{}", i + 1), width, units, ActivationFunction::ReLU, &mut rng));
            width = units;
        }
        hidden.push(Dense::new(
            format!("dense_{}", config.dense_units.len() + 1),
            width,
            config.embedding_dim,
            ActivationFunction::Identity,
            &mut rng,
        ));
        let output = Dense::new("output_layer", config.embedding_dim, 1, ActivationFunction::Identity, &mut rng);

        debug!(
            "recurrent branch: {} steps, lstm {:?}, dense {:?}, embedding {}",
            seq_len, config.lstm_units, config.dense_units, config.embedding_dim
        );
        Ok(RecurrentBranch {
            seq_len,
            input_features: config.input_features,
            lstm,
            dropout: Dropout::new(config.dropout, config.seed.wrapping_add(1)),
            hidden,
            output,
        })
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Checks that `sequence` is `seq_len x input_features`.
    pub fn check_input(&self, sequence: &Matrix) -> Result<()> {
        if sequence.shape() != (self.seq_len, self.input_features) {
            return Err(Error::Data(format!(
                "sequence of shape {:?} does not match the branch input ({}, {})",
                sequence.shape(),
                self.seq_len,
                self.input_features
            )));
        }
        Ok(())
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.lstm.iter_mut().for_each(|l| l.set_frozen(frozen));
        self.hidden.iter_mut().for_each(|d| d.set_frozen(frozen));
        self.output.set_frozen(frozen);
    }

    fn encode(&mut self, sequence: &Matrix, mode: Mode) -> Vec<f64> {
        let mut states = self.lstm[0].forward(sequence);
        for layer in self.lstm.iter_mut().skip(1) {
            states = layer.forward(&states);
        }
        let mut a = self.dropout.forward(&states.flatten(), mode);
        for layer in self.hidden.iter_mut() {
            a = layer.forward(&a);
        }
        a
    }

    /// Backpropagates ∂L/∂embedding through the dense stack, the dropout and
    /// every LSTM layer.
    pub fn backward_embedding(&mut self, d_embedding: &[f64]) {
        let mut d = d_embedding.to_vec();
        for layer in self.hidden.iter_mut().rev() {
            d = layer.backward(&d);
        }
        let d = self.dropout.backward(&d);

        let units = self.lstm.last().map(|l| l.hidden_size()).unwrap_or(1);
        let mut d_states = Matrix::from_data(d.chunks(units).map(|c| c.to_vec()).collect());
        for layer in self.lstm.iter_mut().rev() {
            d_states = layer.backward(&d_states);
        }
    }
}

impl Branch for RecurrentBranch {
    type Input = Matrix;

    fn embedding_dim(&self) -> usize {
        self.output.input_size()
    }

    fn embed(&mut self, input: &Matrix, mode: Mode) -> Vec<f64> {
        self.encode(input, mode)
    }

    fn predict(&mut self, input: &Matrix) -> f64 {
        let e = self.encode(input, Mode::Eval);
        self.output.forward(&e)[0]
    }
}

impl Regressor for RecurrentBranch {
    type Input = Matrix;

    fn forward(&mut self, input: &Matrix, mode: Mode) -> f64 {
        let e = self.encode(input, mode);
        self.output.forward(&e)[0]
    }

    fn backward(&mut self, d_output: f64) {
        let d_embedding = self.output.backward(&[d_output]);
        self.backward_embedding(&d_embedding);
    }

    fn params(&self) -> Vec<NamedParam<'_>> {
        let mut out = Vec::new();
        for layer in &self.lstm {
            out.extend(layer.params());
        }
        for layer in &self.hidden {
            out.extend(layer.params());
        }
        out.extend(self.output.params());
        out
    }

    fn params_mut(&mut self) -> Vec<NamedParamMut<'_>> {
        let mut out = Vec::new();
        for layer in self.lstm.iter_mut() {
            out.extend(layer.params_mut());
        }
        for layer in self.hidden.iter_mut() {
            out.extend(layer.params_mut());
        }
        out.extend(self.output.params_mut());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> RecurrentConfig {
        RecurrentConfig {
            input_features: 1,
            lstm_units: vec![3, 2],
            cell_activation: ActivationFunction::Tanh,
            dropout: 0.0,
            dense_units: vec![4],
            embedding_dim: 5,
            seed: 1,
        }
    }

    #[test]
    fn embed_stops_before_the_output_layer() {
        let mut branch = RecurrentBranch::new(4, &tiny()).unwrap();
        let seq = Matrix::column(&[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(branch.embedding_dim(), 5);
        assert_eq!(branch.embed(&seq, Mode::Eval).len(), 5);
        assert_eq!(branch.predict(&seq), branch.forward(&seq, Mode::Eval));
    }

    #[test]
    fn prediction_is_deterministic_in_eval_mode() {
        let mut branch = RecurrentBranch::new(4, &RecurrentConfig { dropout: 0.5, ..tiny() }).unwrap();
        let seq = Matrix::column(&[0.5, 0.1, -0.3, 0.9]);
        assert_eq!(branch.predict(&seq), branch.predict(&seq));
    }

    #[test]
    fn parameters_follow_layer_names() {
        let branch = RecurrentBranch::new(4, &tiny()).unwrap();
        let names: Vec<String> = branch.params().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"lstm_2.w_recurrent".to_string()));
        assert!(names.contains(&"dense_2.weights".to_string()));
        assert!(names.contains(&"output_layer.biases".to_string()));
    }

    #[test]
    fn output_gradient_matches_finite_difference() {
        let mut branch = RecurrentBranch::new(3, &tiny()).unwrap();
        let seq = Matrix::column(&[0.2, -0.4, 0.7]);
        branch.zero_grad();
        branch.forward(&seq, Mode::Train);
        branch.backward(1.0);
        let analytic = branch.lstm[0].w_input.grad.data[0][2];

        let h = 1e-6;
        let mut plus = branch.clone();
        plus.lstm[0].w_input.value.data[0][2] += h;
        let mut minus = branch.clone();
        minus.lstm[0].w_input.value.data[0][2] -= h;
        let numeric = (plus.forward(&seq, Mode::Eval) - minus.forward(&seq, Mode::Eval)) / (2.0 * h);
        assert!((numeric - analytic).abs() < 1e-5);
    }

    #[test]
    fn empty_lstm_stack_is_a_config_error() {
        let cfg = RecurrentConfig { lstm_units: vec![], ..tiny() };
        assert!(matches!(RecurrentBranch::new(4, &cfg), Err(Error::Config(_))));
    }
}
