pub mod mse;
pub mod mape;
pub mod loss_type;

pub use mse::MseLoss;
pub use mape::MapeLoss;
pub use loss_type::LossType;
