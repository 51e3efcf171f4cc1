use crate::layers::Mode;

/// An encoder that can both regress the target on its own and hand its last
/// hidden representation to a fusion head.
pub trait Branch {
    type Input;

    /// Width of the vector returned by `embed`.
    fn embedding_dim(&self) -> usize;

    /// Last hidden representation before the scalar output layer.
    fn embed(&mut self, input: &Self::Input, mode: Mode) -> Vec<f64>;

    /// Scalar prediction in evaluation mode.
    fn predict(&mut self, input: &Self::Input) -> f64;
}
