use burn::data::dataset::vision::ImageLoaderError;

use crate::norm::InstanceNormError;

/// Error raised while setting up or persisting an experiment.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid normalization: {0}")]
    Norm(#[from] InstanceNormError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dataset error: {0}")]
    Dataset(#[from] ImageLoaderError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Record error: {0}")]
    Record(String),
}
