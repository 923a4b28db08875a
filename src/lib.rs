//! CIFAR-10 classification with a convolutional network normalized by
//! [instance normalization](norm::InstanceNorm).

pub mod data;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod inference;
pub mod layer;
pub mod model;
pub mod norm;
pub mod training;

pub use error::Error;
