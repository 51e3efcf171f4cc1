pub mod param;
pub mod dense;
pub mod dropout;
pub mod lstm;

pub use param::{NamedParam, NamedParamMut, Param};
pub use dense::Dense;
pub use dropout::Dropout;
pub use lstm::Lstm;

/// Whether a forward pass is part of training (dropout active, caches used
/// for backprop) or evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}
