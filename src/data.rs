use burn::{
    data::{
        dataloader::batcher::Batcher,
        dataset::vision::{Annotation, ImageDatasetItem, PixelDepth},
    },
    prelude::*,
};
use rand::Rng;

pub const IMAGE_SIZE: usize = 32;
pub const NUM_CHANNELS: usize = 3;

// Maps [0, 1] pixels to [-1, 1].
const MEAN: [f32; NUM_CHANNELS] = [0.5, 0.5, 0.5];
const STD: [f32; NUM_CHANNELS] = [0.5, 0.5, 0.5];

/// Normalizer for the CIFAR-10 dataset.
#[derive(Clone)]
pub struct Normalizer<B: Backend> {
    pub mean: Tensor<B, 4>,
    pub std: Tensor<B, 4>,
}

impl<B: Backend> Normalizer<B> {
    /// Creates a new normalizer.
    pub fn new(device: &Device<B>) -> Self {
        let mean = Tensor::<B, 1>::from_floats(MEAN, device).reshape([1, NUM_CHANNELS, 1, 1]);
        let std = Tensor::<B, 1>::from_floats(STD, device).reshape([1, NUM_CHANNELS, 1, 1]);
        Self { mean, std }
    }

    /// Normalizes the input image.
    ///
    /// The input image should be in the range [0, 1].
    /// The output image will be in the range [-1, 1].
    pub fn normalize(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        (input - self.mean.clone()) / self.std.clone()
    }

    /// Returns a new normalizer on the given device.
    pub fn to_device(&self, device: &B::Device) -> Self {
        Self {
            mean: self.mean.clone().to_device(device),
            std: self.std.clone().to_device(device),
        }
    }
}

/// Training-time augmentation on raw `[height, width, channels]` pixels: a random crop of the
/// zero padded image followed by a random horizontal flip.
#[derive(Clone, Debug, PartialEq)]
pub struct Augmentation {
    pub padding: usize,
    pub flip_probability: f64,
}

impl Default for Augmentation {
    fn default() -> Self {
        Self {
            padding: 4,
            flip_probability: 0.5,
        }
    }
}

impl Augmentation {
    /// Augments one square image of `size x size` pixels.
    pub fn apply<R: Rng + ?Sized>(&self, image: &[u8], size: usize, rng: &mut R) -> Vec<u8> {
        let offset_y = rng.random_range(0..=2 * self.padding);
        let offset_x = rng.random_range(0..=2 * self.padding);
        let flip = rng.random_bool(self.flip_probability);

        self.crop(image, size, offset_y, offset_x, flip)
    }

    /// Crops `size x size` pixels at the given offset of the padded image, mirroring the columns
    /// when `flip` is set.
    pub fn crop(
        &self,
        image: &[u8],
        size: usize,
        offset_y: usize,
        offset_x: usize,
        flip: bool,
    ) -> Vec<u8> {
        let mut output = vec![0u8; size * size * NUM_CHANNELS];

        for y in 0..size {
            let src_y = (y + offset_y).checked_sub(self.padding);
            for x in 0..size {
                let col = if flip { size - 1 - x } else { x };
                let src_x = (col + offset_x).checked_sub(self.padding);

                if let (Some(src_y), Some(src_x)) = (src_y, src_x) {
                    if src_y < size && src_x < size {
                        let src = (src_y * size + src_x) * NUM_CHANNELS;
                        let dst = (y * size + x) * NUM_CHANNELS;
                        output[dst..dst + NUM_CHANNELS]
                            .copy_from_slice(&image[src..src + NUM_CHANNELS]);
                    }
                }
            }
        }

        output
    }
}

#[derive(Clone)]
pub struct ClassificationBatcher<B: Backend> {
    normalizer: Normalizer<B>,
    augmentation: Option<Augmentation>,
}

#[derive(Clone, Debug)]
pub struct ClassificationBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> ClassificationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self {
            normalizer: Normalizer::<B>::new(&device),
            augmentation: None,
        }
    }

    /// Augments every image of the batches produced.
    pub fn with_augmentation(mut self, augmentation: Augmentation) -> Self {
        self.augmentation = Some(augmentation);
        self
    }

    /// Builds a batch from `[height, width, channels]` pixels and class labels.
    pub fn batch_pixels(
        &self,
        items: Vec<(Vec<u8>, usize)>,
        device: &B::Device,
    ) -> ClassificationBatch<B> {
        let mut rng = rand::rng();

        let targets = items
            .iter()
            .map(|(_, label)| {
                Tensor::<B, 1, Int>::from_data(
                    TensorData::from([(*label as i64).elem::<B::IntElem>()]),
                    device,
                )
            })
            .collect();

        let images = items
            .into_iter()
            .map(|(pixels, _)| match &self.augmentation {
                Some(augmentation) => augmentation.apply(&pixels, IMAGE_SIZE, &mut rng),
                None => pixels,
            })
            .map(|pixels| {
                TensorData::new(pixels, Shape::new([IMAGE_SIZE, IMAGE_SIZE, NUM_CHANNELS]))
            })
            .map(|data| {
                Tensor::<B, 3>::from_data(data.convert::<B::FloatElem>(), device)
                    // permute(2, 0, 1)
                    .swap_dims(2, 1) // [H, C, W]
                    .swap_dims(1, 0) // [C, H, W]
            })
            .map(|tensor| tensor / 255) // normalize between [0, 1]
            .collect();

        let images = Tensor::stack(images, 0);
        let targets = Tensor::cat(targets, 0);

        let images = self.normalizer.to_device(device).normalize(images);

        ClassificationBatch { images, targets }
    }
}

impl<B: Backend> Batcher<B, ImageDatasetItem, ClassificationBatch<B>> for ClassificationBatcher<B> {
    fn batch(&self, items: Vec<ImageDatasetItem>, device: &B::Device) -> ClassificationBatch<B> {
        let items = items
            .into_iter()
            .map(|item| {
                // Expect class label (int) as target
                let label = match item.annotation {
                    Annotation::Label(y) => y,
                    _ => panic!("Invalid target type"),
                };
                let pixels = item.image.into_iter().map(pixel_as_u8).collect::<Vec<u8>>();

                (pixels, label)
            })
            .collect();

        self.batch_pixels(items, device)
    }
}

// CIFAR images are u8, other depths are rescaled to the same range.
fn pixel_as_u8(pixel: PixelDepth) -> u8 {
    match pixel {
        PixelDepth::U8(value) => value,
        PixelDepth::U16(value) => (value >> 8) as u8,
        PixelDepth::F32(value) => (value.clamp(0.0, 1.0) * 255.0).round() as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Tolerance;
    use rand::{rngs::StdRng, SeedableRng};

    type TestBackend = NdArray<f32>;

    // 2x2 image with a single channel value per pixel repeated over the three channels.
    fn tiny_image(values: [u8; 4]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| [*v; NUM_CHANNELS])
            .collect()
    }

    fn first_channel(image: &[u8]) -> Vec<u8> {
        image.iter().step_by(NUM_CHANNELS).copied().collect()
    }

    #[test]
    fn crop_without_offset_keeps_image() {
        let augmentation = Augmentation::default();
        let image = tiny_image([1, 2, 3, 4]);

        let output = augmentation.crop(&image, 2, 4, 4, false);

        assert_eq!(output, image);
    }

    #[test]
    fn crop_shifts_in_zero_padding() {
        let augmentation = Augmentation {
            padding: 1,
            flip_probability: 0.0,
        };
        let image = tiny_image([1, 2, 3, 4]);

        let top_left = augmentation.crop(&image, 2, 0, 0, false);
        let bottom_right = augmentation.crop(&image, 2, 2, 2, false);

        assert_eq!(first_channel(&top_left), vec![0, 0, 0, 1]);
        assert_eq!(first_channel(&bottom_right), vec![4, 0, 0, 0]);
    }

    #[test]
    fn crop_flips_columns() {
        let augmentation = Augmentation {
            padding: 1,
            flip_probability: 1.0,
        };
        let image = tiny_image([1, 2, 3, 4]);

        let output = augmentation.crop(&image, 2, 1, 1, true);

        assert_eq!(first_channel(&output), vec![2, 1, 4, 3]);
    }

    #[test]
    fn apply_keeps_size_and_pixel_values() {
        let augmentation = Augmentation::default();
        let mut rng = StdRng::seed_from_u64(42);
        let image: Vec<u8> = (0..IMAGE_SIZE * IMAGE_SIZE * NUM_CHANNELS)
            .map(|i| (i % 200) as u8 + 1)
            .collect();

        for _ in 0..8 {
            let output = augmentation.apply(&image, IMAGE_SIZE, &mut rng);

            assert_eq!(output.len(), image.len());
            assert!(output.iter().all(|v| *v == 0 || image.contains(v)));
        }
    }

    #[test]
    fn batch_pixels_shapes_and_range() {
        let device = Default::default();
        let batcher = ClassificationBatcher::<TestBackend>::new(device);
        let black = vec![0u8; IMAGE_SIZE * IMAGE_SIZE * NUM_CHANNELS];
        let white = vec![255u8; IMAGE_SIZE * IMAGE_SIZE * NUM_CHANNELS];

        let batch = batcher.batch_pixels(vec![(black, 3), (white, 7)], &device);

        assert_eq!(batch.images.dims(), [2, NUM_CHANNELS, IMAGE_SIZE, IMAGE_SIZE]);
        assert_eq!(batch.targets.clone().into_data().to_vec::<i64>().unwrap(), vec![3, 7]);

        let [min, max] = [batch.images.clone().min(), batch.images.max()];
        min.into_data()
            .assert_approx_eq::<f32>(&TensorData::from([-1.0]), Tolerance::default());
        max.into_data()
            .assert_approx_eq::<f32>(&TensorData::from([1.0]), Tolerance::default());
    }

    #[test]
    fn batch_pixels_is_channel_first() {
        let device = Default::default();
        let batcher = ClassificationBatcher::<TestBackend>::new(device);
        // Red image: only the first channel is lit.
        let red: Vec<u8> = (0..IMAGE_SIZE * IMAGE_SIZE)
            .flat_map(|_| [255u8, 0, 0])
            .collect();

        let batch = batcher.batch_pixels(vec![(red, 0)], &device);
        let channel_means = batch.images.mean_dim(3).mean_dim(2).reshape([NUM_CHANNELS]);

        channel_means
            .into_data()
            .assert_approx_eq::<f32>(&TensorData::from([1.0, -1.0, -1.0]), Tolerance::default());
    }

    #[test]
    fn pixel_depths_convert_to_u8() {
        assert_eq!(pixel_as_u8(PixelDepth::U8(17)), 17);
        assert_eq!(pixel_as_u8(PixelDepth::U16(u16::MAX)), 255);
        assert_eq!(pixel_as_u8(PixelDepth::F32(1.0)), 255);
        assert_eq!(pixel_as_u8(PixelDepth::F32(-3.0)), 0);
    }
}
