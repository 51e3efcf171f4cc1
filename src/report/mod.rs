//! Run artefacts: the loss-curve plot and the epoch history.

pub mod history;
pub mod loss_curve;

pub use history::{load_history, save_history};
pub use loss_curve::{render_loss_curve, save_loss_curve};
