pub mod early_stopping;
pub mod epoch_stats;
pub mod metrics;
pub mod train_config;
pub mod trainer;

pub use early_stopping::{EarlyStopping, StopDirection};
pub use epoch_stats::{EpochStats, TrainStats, ValidStats};
pub use train_config::{Selection, TrainConfig};
pub use trainer::{evaluate, test_model, TrainOutcome, Trainer};
