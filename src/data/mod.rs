//! Loading of precomputed feature matrices, image stacks and RUL targets,
//! and pairing them into datasets.

pub mod array;
pub mod dataset;
pub mod images;
pub mod provider;

pub use array::NumericArray;
pub use dataset::Dataset;
pub use images::{load_images, ImageTensor, CHANNEL_MEAN, CHANNEL_STD};
pub use provider::{load_field, load_sequences, load_targets};
