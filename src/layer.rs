use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::nn::pool::{AvgPool2d, MaxPool2d};
use burn::nn::Relu;
use burn::tensor::{backend::Backend, Tensor};

use crate::norm::InstanceNorm;

/// A module mapping a batch of feature maps `[batch_size, channels, height, width]` to another
/// batch of feature maps.
///
/// Parameters are enumerated, recorded and loaded through [Module]; this trait only adds the
/// forward pass so that heterogeneous layers can be chained uniformly.
pub trait Layer<B: Backend>: Module<B> {
    /// Applies the forward pass on the input tensor.
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Applies every layer in order.
pub fn forward_all<B: Backend, L: Layer<B>>(layers: &[L], input: Tensor<B, 4>) -> Tensor<B, 4> {
    layers
        .iter()
        .fold(input, |x, layer| Layer::forward(layer, x))
}

impl<B: Backend> Layer<B> for Conv2d<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        Conv2d::forward(self, input)
    }
}

impl<B: Backend> Layer<B> for InstanceNorm<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        InstanceNorm::forward(self, input)
    }
}

impl<B: Backend> Layer<B> for Relu {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        Relu::forward(self, input)
    }
}

impl<B: Backend> Layer<B> for MaxPool2d {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        MaxPool2d::forward(self, input)
    }
}

impl<B: Backend> Layer<B> for AvgPool2d {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        AvgPool2d::forward(self, input)
    }
}
