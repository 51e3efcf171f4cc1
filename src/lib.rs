pub mod math;
pub mod activation;
pub mod layers;
pub mod loss;
pub mod optim;
pub mod data;
pub mod model;
pub mod device;
pub mod train;
pub mod report;
pub mod config;
pub mod pipeline;
pub mod error;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::Mode;
pub use loss::loss_type::LossType;
pub use optim::OptimizerKind;
pub use data::{Dataset, ImageTensor};
pub use model::{
    Backbone, BackboneKind, Branch, FusionHead, HybridModel, HybridSample, ImageBranch,
    RecurrentBranch, RecurrentConfig, Regressor, StateDict,
};
pub use device::Device;
pub use train::{EarlyStopping, EpochStats, StopDirection, TrainConfig, TrainOutcome, Trainer};
pub use config::RunConfig;
pub use error::{Error, Result};
