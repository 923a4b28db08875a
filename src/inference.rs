use std::path::Path;

use burn::{
    config::Config,
    module::Module,
    record::{CompactRecorder, Recorder},
    tensor::{activation::softmax, backend::Backend, Tensor},
};

use crate::{
    dataset::CLASSES,
    error::Error,
    experiment::{CONFIG_FILE, MODEL_FILE},
    model::Model,
    training::TrainingConfig,
};

/// Most likely class of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: usize,
    pub probability: f32,
}

impl Prediction {
    /// Name of the predicted CIFAR-10 class, if the label is one.
    pub fn class_name(&self) -> Option<&'static str> {
        CLASSES.get(self.label).copied()
    }
}

/// Loads the model trained in `artifact_dir` from its recorded configuration and weights.
pub fn load_model<B: Backend>(artifact_dir: &Path, device: &B::Device) -> Result<Model<B>, Error> {
    let config = TrainingConfig::load(artifact_dir.join(CONFIG_FILE))
        .map_err(|err| Error::Config(format!("{err:?}")))?;
    let record = CompactRecorder::new()
        .load(artifact_dir.join(MODEL_FILE), device)
        .map_err(|err| Error::Record(format!("{err:?}")))?;

    Ok(config.model.try_init::<B>(device)?.load_record(record))
}

/// Classifies a batch of normalized images.
pub fn predict<B: Backend>(model: &Model<B>, images: Tensor<B, 4>) -> Vec<Prediction> {
    let probabilities = softmax(model.forward(images), 1);
    let [batch_size, _] = probabilities.dims();

    let labels = probabilities.clone().argmax(1).reshape([batch_size]);
    let best = probabilities.max_dim(1).reshape([batch_size]);

    labels
        .into_data()
        .iter::<i64>()
        .zip(best.into_data().iter::<f32>())
        .map(|(label, probability)| Prediction {
            label: label as usize,
            probability,
        })
        .collect()
}
