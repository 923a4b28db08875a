use burn::config::Config;
use burn::module::{Module, Param};
use burn::nn::Initializer;
use burn::tensor::{backend::Backend, Tensor};

/// Error raised when configuring or applying an [InstanceNorm] layer.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InstanceNormError {
    #[error("the number of channels must be a positive integer, got {0}")]
    InvalidChannels(usize),

    #[error("epsilon must be finite and non-negative, got {0}")]
    InvalidEpsilon(f64),

    #[error("expected {expected} channels but got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// Configuration to create an [InstanceNorm] layer.
#[derive(Config, Debug)]
pub struct InstanceNormConfig {
    /// The number of channels expected in the input.
    pub num_channels: usize,
    /// A value added to the variance for numerical stability. Default: 1e-5
    #[config(default = 1e-5)]
    pub epsilon: f64,
    /// A boolean value that when set to `true`, this module has learnable
    /// per-channel affine parameters initialized to ones (for the scale)
    /// and zeros (for the shift). Default: `true`
    #[config(default = true)]
    pub affine: bool,
}

/// Applies Instance Normalization over a batch of feature maps as described in the paper
/// [Instance Normalization](https://arxiv.org/abs/1607.08022).
///
/// `Y = norm(X) * scale + shift`
///
/// Where `norm` standardizes every `(sample, channel)` feature map with its own mean and
/// population variance. No running statistics are tracked: the statistics always come from the
/// current input, during training and inference alike.
///
/// Should be created using [InstanceNormConfig].
#[derive(Module, Debug)]
pub struct InstanceNorm<B: Backend> {
    /// The learnable per-channel scale, `None` when the layer is not affine.
    pub scale: Option<Param<Tensor<B, 1>>>,
    /// The learnable per-channel shift, `None` when the layer is not affine.
    pub shift: Option<Param<Tensor<B, 1>>>,
    num_channels: usize,
    epsilon: f64,
}

impl InstanceNormConfig {
    /// Initialize a new [instance norm](InstanceNorm) module.
    ///
    /// # Panics
    ///
    /// Panics when the configuration is invalid, see [try_init](Self::try_init).
    pub fn init<B: Backend>(&self, device: &B::Device) -> InstanceNorm<B> {
        match self.try_init(device) {
            Ok(module) => module,
            Err(err) => panic!("Invalid instance norm configuration: {err}"),
        }
    }

    /// Initialize a new [instance norm](InstanceNorm) module, validating the configuration.
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<InstanceNorm<B>, InstanceNormError> {
        self.validate()?;

        let (scale, shift) = if self.affine {
            (
                Some(Initializer::Ones.init([self.num_channels], device)),
                Some(Initializer::Zeros.init([self.num_channels], device)),
            )
        } else {
            (None, None)
        };

        Ok(InstanceNorm {
            scale,
            shift,
            num_channels: self.num_channels,
            epsilon: self.epsilon,
        })
    }

    fn validate(&self) -> Result<(), InstanceNormError> {
        if self.num_channels == 0 {
            return Err(InstanceNormError::InvalidChannels(self.num_channels));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(InstanceNormError::InvalidEpsilon(self.epsilon));
        }

        Ok(())
    }
}

impl<B: Backend> InstanceNorm<B> {
    /// Applies the forward pass on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, channels, height, width]`
    /// - output: `[batch_size, channels, height, width]`
    ///
    /// # Panics
    ///
    /// Panics if the channel dimension of the input differs from the configured number of
    /// channels.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        match self.try_forward(input) {
            Ok(output) => output,
            Err(err) => panic!("InstanceNorm: {err}"),
        }
    }

    /// Applies the forward pass on the input tensor, returning an error on a channel mismatch.
    pub fn try_forward(&self, input: Tensor<B, 4>) -> Result<Tensor<B, 4>, InstanceNormError> {
        let [batch_size, channels, height, width] = input.dims();

        if channels != self.num_channels {
            return Err(InstanceNormError::ShapeMismatch {
                expected: self.num_channels,
                actual: channels,
            });
        }

        if batch_size * channels * height * width == 0 {
            return Ok(input);
        }

        let output = self
            .standardize(input.reshape([batch_size, channels, height * width]))
            .reshape([batch_size, channels, height, width]);

        Ok(self.affine(output))
    }

    /// Named view over the learnable parameters, empty when the layer is not affine.
    pub fn named_parameters(&self) -> Vec<(&'static str, Tensor<B, 1>)> {
        let mut params = Vec::with_capacity(2);

        if let Some(scale) = &self.scale {
            params.push(("scale", scale.val()));
        }
        if let Some(shift) = &self.shift {
            params.push(("shift", shift.val()));
        }

        params
    }

    /// The number of channels this layer normalizes.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// The value added to the variance before taking the square root.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Whether learnable scale and shift parameters are applied.
    pub fn is_affine(&self) -> bool {
        self.scale.is_some()
    }

    // Statistics are reduced over the last dimension only, one (sample, channel) pair per row.
    fn standardize(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let mean = x.clone().mean_dim(2);
        let centered = x.sub(mean);
        let var = centered.clone().powf_scalar(2.0).mean_dim(2);

        centered.div(var.add_scalar(self.epsilon).sqrt())
    }

    fn affine(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let shape = [1, self.num_channels, 1, 1];
        let x = match &self.scale {
            Some(scale) => x.mul(scale.val().reshape(shape)),
            None => x,
        };

        match &self.shift {
            Some(shift) => x.add(shift.val().reshape(shape)),
            None => x,
        }
    }
}
