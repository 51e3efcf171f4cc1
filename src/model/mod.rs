//! Branch encoders, the fusion head and the trainable-model abstraction the
//! training loop works against.

pub mod backbone;
pub mod branch;
pub mod fusion;
pub mod hybrid;
pub mod image;
pub mod recurrent;
pub mod regressor;
pub mod state_dict;

pub use backbone::{Backbone, BackboneKind};
pub use branch::Branch;
pub use fusion::{concat, FusionHead, FUSION_UNITS};
pub use hybrid::{HybridModel, HybridSample};
pub use image::ImageBranch;
pub use recurrent::{RecurrentBranch, RecurrentConfig};
pub use regressor::Regressor;
pub use state_dict::StateDict;
