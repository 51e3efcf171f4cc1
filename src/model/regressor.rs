use crate::error::Result;
use crate::layers::param::{NamedParam, NamedParamMut};
use crate::layers::Mode;
use crate::model::state_dict::StateDict;

/// A model that maps one input to a scalar prediction and can be trained by
/// the shared training loop.
///
/// `backward` must follow the `forward` of the same sample; gradients
/// accumulate into the parameters until `zero_grad`.
pub trait Regressor {
    type Input;

    fn forward(&mut self, input: &Self::Input, mode: Mode) -> f64;

    /// Backpropagates ∂L/∂prediction for the most recent forward pass.
    fn backward(&mut self, d_output: f64);

    /// Every parameter, trainable or frozen, under its qualified name.
    fn params(&self) -> Vec<NamedParam<'_>>;

    fn params_mut(&mut self) -> Vec<NamedParamMut<'_>>;

    fn zero_grad(&mut self) {
        for (_, p) in self.params_mut() {
            if p.is_trainable() {
                p.zero_grad();
            }
        }
    }

    /// Number of trainable scalars.
    fn trainable_len(&self) -> usize {
        self.params()
            .iter()
            .filter(|(_, p)| p.is_trainable())
            .map(|(_, p)| p.value.len())
            .sum()
    }

    fn state_dict(&self) -> StateDict {
        StateDict::from_params(self.params())
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        state.restore_into(self.params_mut())
    }
}
