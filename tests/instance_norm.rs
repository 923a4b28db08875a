use burn::backend::NdArray;
use burn::tensor::{Distribution, Tensor, TensorData, Tolerance};
use cifar10_instance_norm::layer::Layer;
use cifar10_instance_norm::norm::{InstanceNorm, InstanceNormConfig};

pub type TestBackend = NdArray<f32>;

const SHAPE: [usize; 4] = [3, 4, 5, 6];

fn standardizer(epsilon: f64) -> InstanceNorm<TestBackend> {
    InstanceNormConfig::new(SHAPE[1])
        .with_epsilon(epsilon)
        .with_affine(false)
        .init(&Default::default())
}

fn random_input() -> Tensor<TestBackend, 4> {
    Tensor::random(SHAPE, Distribution::Normal(2.0, 3.0), &Default::default())
}

#[test]
fn output_shape_matches_input() {
    let module = InstanceNormConfig::new(SHAPE[1]).init::<TestBackend>(&Default::default());

    let output = module.forward(random_input());

    assert_eq!(output.dims(), SHAPE);
}

#[test]
fn every_feature_map_has_zero_mean_and_unit_variance() {
    let [batch_size, channels, height, width] = SHAPE;
    let output = standardizer(0.0)
        .forward(random_input())
        .reshape([batch_size, channels, height * width]);

    let mean = output.clone().mean_dim(2);
    let var = output.sub(mean.clone()).powf_scalar(2.0).mean_dim(2);

    mean.into_data().assert_approx_eq::<f32>(
        &TensorData::new(vec![0.0f32; batch_size * channels], [batch_size, channels, 1]),
        Tolerance::absolute(1e-4),
    );
    var.into_data().assert_approx_eq::<f32>(
        &TensorData::new(vec![1.0f32; batch_size * channels], [batch_size, channels, 1]),
        Tolerance::absolute(1e-3),
    );
}

#[test]
fn invariant_to_feature_map_scale_and_offset() {
    let module = standardizer(0.0);
    let input = random_input();

    // Only the feature map at (1, 2) is scaled by 4.5 and shifted by -7.
    let transformed = input.clone().slice_assign(
        [1..2, 2..3, 0..5, 0..6],
        input
            .clone()
            .slice([1..2, 2..3, 0..5, 0..6])
            .mul_scalar(4.5)
            .sub_scalar(7.0),
    );

    module.forward(transformed).into_data().assert_approx_eq::<f32>(
        &module.forward(input).into_data(),
        Tolerance::absolute(1e-4),
    );
}

#[test]
fn samples_are_normalized_independently() {
    let module = standardizer(1e-5);
    let input = random_input();
    let changed = input.clone().slice_assign(
        [0..1, 0..4, 0..5, 0..6],
        Tensor::random([1, 4, 5, 6], Distribution::Default, &Default::default()),
    );

    let expected = module.forward(input).slice([1..3, 0..4, 0..5, 0..6]);
    let actual = module.forward(changed).slice([1..3, 0..4, 0..5, 0..6]);

    actual
        .into_data()
        .assert_approx_eq::<f32>(&expected.into_data(), Tolerance::default());
}

#[test]
fn channels_are_normalized_independently() {
    let module = standardizer(1e-5);
    let input = random_input();
    let changed = input.clone().slice_assign(
        [0..3, 3..4, 0..5, 0..6],
        Tensor::random([3, 1, 5, 6], Distribution::Normal(-10.0, 0.1), &Default::default()),
    );

    let expected = module.forward(input).slice([0..3, 0..3, 0..5, 0..6]);
    let actual = module.forward(changed).slice([0..3, 0..3, 0..5, 0..6]);

    actual
        .into_data()
        .assert_approx_eq::<f32>(&expected.into_data(), Tolerance::default());
}

#[test]
fn layer_trait_matches_inherent_forward() {
    let module = InstanceNormConfig::new(SHAPE[1]).init::<TestBackend>(&Default::default());
    let input = random_input();

    Layer::forward(&module, input.clone())
        .into_data()
        .assert_approx_eq::<f32>(&module.forward(input).into_data(), Tolerance::default());
}
