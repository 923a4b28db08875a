use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AvgPool2d, AvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::layer::{forward_all, Layer};
use crate::norm::{InstanceNorm, InstanceNormConfig, InstanceNormError};

/// Configuration of the instance normalized VGG-style classifier.
#[derive(Config, Debug)]
pub struct ModelConfig {
    #[config(default = 10)]
    pub num_classes: usize,
    #[config(default = 3)]
    pub in_channels: usize,
    /// Output channels of every convolution, grouped by stage. Each stage ends with a 2x2 max
    /// pooling.
    #[config(
        default = "vec![vec![64, 64], vec![128, 128], vec![256, 256, 256], vec![512, 512, 512], vec![512, 512, 512]]"
    )]
    pub stages: Vec<Vec<usize>>,
    /// Template for every normalization layer, `num_channels` is replaced by the block width.
    #[config(default = "InstanceNormConfig::new(1)")]
    pub norm: InstanceNormConfig,
}

/// Convolution followed by instance normalization and a ReLU activation.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: InstanceNorm<B>,
    activation: Relu,
}

/// A sequence of [conv blocks](ConvBlock) followed by a max pooling halving the spatial size.
#[derive(Module, Debug)]
pub struct Stage<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    pool: MaxPool2d,
}

/// Image classifier producing class logits from `[batch_size, channels, height, width]` images.
///
/// Inputs of 32x32 pixels are reduced to 1x1 by the five default stages.
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    stages: Vec<Stage<B>>,
    pool: AvgPool2d,
    fc: Linear<B>,
}

impl ModelConfig {
    /// Returns the initialized model.
    ///
    /// # Panics
    ///
    /// Panics when the configuration is invalid, see [try_init](Self::try_init).
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        match self.try_init(device) {
            Ok(model) => model,
            Err(err) => panic!("Invalid model configuration: {err}"),
        }
    }

    /// Returns the initialized model, or an error when a stage or a channel count is empty.
    pub fn try_init<B: Backend>(&self, device: &B::Device) -> Result<Model<B>, InstanceNormError> {
        if self.in_channels == 0 {
            return Err(InstanceNormError::InvalidChannels(0));
        }

        let mut in_channels = self.in_channels;
        let mut stages = Vec::with_capacity(self.stages.len());

        for widths in self.stages.iter() {
            if widths.is_empty() {
                return Err(InstanceNormError::InvalidChannels(0));
            }

            let mut blocks = Vec::with_capacity(widths.len());
            for &channels in widths {
                blocks.push(self.conv_block(in_channels, channels, device)?);
                in_channels = channels;
            }

            stages.push(Stage {
                blocks,
                pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            });
        }

        Ok(Model {
            stages,
            pool: AvgPool2dConfig::new([1, 1]).with_strides([1, 1]).init(),
            fc: LinearConfig::new(in_channels, self.num_classes).init(device),
        })
    }

    fn conv_block<B: Backend>(
        &self,
        in_channels: usize,
        channels: usize,
        device: &B::Device,
    ) -> Result<ConvBlock<B>, InstanceNormError> {
        let norm = InstanceNormConfig::new(channels)
            .with_epsilon(self.norm.epsilon)
            .with_affine(self.norm.affine)
            .try_init(device)?;

        Ok(ConvBlock {
            conv: Conv2dConfig::new([in_channels, channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            norm,
            activation: Relu::new(),
        })
    }
}

impl<B: Backend> Layer<B> for ConvBlock<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(input);
        let x = self.norm.forward(x);

        self.activation.forward(x)
    }
}

impl<B: Backend> Layer<B> for Stage<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = forward_all(&self.blocks, input);

        self.pool.forward(x)
    }
}

impl<B: Backend> Model<B> {
    /// Computes the class logits.
    ///
    /// # Shapes
    ///
    /// - images: `[batch_size, in_channels, height, width]`
    /// - output: `[batch_size, num_classes]`
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = forward_all(&self.stages, images);
        let x = self.pool.forward(x);

        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        self.fc.forward(x)
    }

    /// Every instance normalization layer of the model, in forward order.
    pub fn norms(&self) -> Vec<&InstanceNorm<B>> {
        self.stages
            .iter()
            .flat_map(|stage| stage.blocks.iter().map(|block| &block.norm))
            .collect()
    }
}
