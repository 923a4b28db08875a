use std::path::PathBuf;

use crate::{
    data::{Augmentation, ClassificationBatch, ClassificationBatcher},
    dataset::Cifar10Loader,
    error::Error,
    experiment::Experiment,
    model::{Model, ModelConfig},
};
use burn::data::{dataloader::DataLoaderBuilder, dataset::vision::ImageFolderDataset};
use burn::train::{
    metric::{AccuracyMetric, LossMetric},
    ClassificationOutput, LearnerBuilder, TrainOutput, TrainStep, ValidStep,
};
use burn::{
    config::Config,
    module::Module,
    nn::loss::CrossEntropyLossConfig,
    optim::AdamConfig,
    record::CompactRecorder,
    tensor::{
        backend::{AutodiffBackend, Backend},
        Int, Tensor,
    },
};

impl<B: Backend> Model<B> {
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

impl<B: AutodiffBackend> TrainStep<ClassificationBatch<B>, ClassificationOutput<B>> for Model<B> {
    fn step(&self, batch: ClassificationBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);

        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<ClassificationBatch<B>, ClassificationOutput<B>> for Model<B> {
    fn step(&self, batch: ClassificationBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub optimizer: AdamConfig,
    #[config(default = 2.5e-4)]
    pub learning_rate: f64,
    #[config(default = 10)]
    pub num_epochs: usize,
    #[config(default = 64)]
    pub batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    /// Random crop and horizontal flip of the training images.
    #[config(default = true)]
    pub augment: bool,
    /// Directory where CIFAR-10 is downloaded and extracted.
    #[config(default = "String::from(\"/tmp/burn-cifar10\")")]
    pub data_dir: String,
}

/// Trains the model on CIFAR-10 and returns the path of the trained model.
///
/// The test split doubles as the validation set.
pub fn run<B: AutodiffBackend>(
    mut experiment: Experiment,
    config: TrainingConfig,
    device: B::Device,
) -> Result<PathBuf, Error> {
    experiment.record_config(&config)?;

    B::seed(config.seed);

    let model = config.model.try_init::<B>(&device)?;
    log::info!("Model initialized with {} parameters", model.num_params());

    // Dataloaders
    let mut batcher_train = ClassificationBatcher::<B>::new(device.clone());
    if config.augment {
        batcher_train = batcher_train.with_augmentation(Augmentation::default());
    }
    let batcher_valid = ClassificationBatcher::<B::InnerBackend>::new(device.clone());

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(ImageFolderDataset::cifar10_train(&config.data_dir)?);

    let dataloader_valid = DataLoaderBuilder::new(batcher_valid)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(ImageFolderDataset::cifar10_test(&config.data_dir)?);

    let artifact_dir = experiment.artifact_dir().to_string_lossy().into_owned();
    let learner = LearnerBuilder::new(&artifact_dir)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .devices(vec![device.clone()])
        .num_epochs(config.num_epochs)
        .summary()
        .build(model, config.optimizer.init(), config.learning_rate);

    experiment.start();
    let model_trained = learner.fit(dataloader_train, dataloader_valid);

    experiment.finish(model_trained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::Optimizer;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    fn small_model<B: Backend>(device: &B::Device) -> Model<B> {
        ModelConfig::new()
            .with_num_classes(4)
            .with_stages(vec![vec![4], vec![8]])
            .init(device)
    }

    #[test]
    fn default_training_config() {
        let config = TrainingConfig::new(ModelConfig::new(), AdamConfig::new());

        assert_eq!(config.learning_rate, 2.5e-4);
        assert_eq!(config.num_epochs, 10);
        assert_eq!(config.batch_size, 64);
        assert!(config.augment);
        assert_eq!(config.model.num_classes, 10);
    }

    #[test]
    fn valid_step_reports_loss() {
        let device = Default::default();
        let model = small_model::<TestBackend>(&device);
        let batch = ClassificationBatch {
            images: Tensor::random([3, 3, 4, 4], Distribution::Default, &device),
            targets: Tensor::from_ints([0, 1, 3], &device),
        };

        let output = ValidStep::step(&model, batch);

        assert_eq!(output.output.dims(), [3, 4]);
        assert_eq!(output.loss.dims(), [1]);
        assert!(output.loss.into_scalar().is_finite());
    }

    #[test]
    fn train_step_updates_parameters() {
        let device = Default::default();
        let model = small_model::<TestAutodiffBackend>(&device);
        let batch = ClassificationBatch {
            images: Tensor::random([2, 3, 4, 4], Distribution::Default, &device),
            targets: Tensor::from_ints([2, 0], &device),
        };
        let before = model.norms()[0].named_parameters()[1].1.clone().into_data();

        let output = TrainStep::step(&model, batch);
        let mut optim = AdamConfig::new()
            .init::<TestAutodiffBackend, Model<TestAutodiffBackend>>();
        let model = optim.step(1e-1, model, output.grads);

        let after = model.norms()[0].named_parameters()[1].1.clone().into_data();
        assert_ne!(before, after);
    }
}
