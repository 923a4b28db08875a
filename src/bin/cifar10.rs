#![recursion_limit = "256"]

use burn::optim::AdamConfig;
use burn::tensor::backend::AutodiffBackend;
use cifar10_instance_norm::{
    experiment::Experiment,
    model::ModelConfig,
    training::{self, TrainingConfig},
};

const ARTIFACT_DIR: &str = "/tmp/burn-cifar10-instance-norm";

fn launch<B: AutodiffBackend>(device: B::Device) {
    let config = TrainingConfig::new(ModelConfig::new(), AdamConfig::new());

    let result = Experiment::create("cifar10", "instance norm", ARTIFACT_DIR)
        .and_then(|experiment| training::run::<B>(experiment, config, device));

    match result {
        Ok(path) => println!("Trained model saved to {}", path.display()),
        Err(err) => {
            log::error!("Training failed: {err}");
            eprintln!("Training failed: {err}");
            std::process::exit(1);
        }
    }
}

#[cfg(any(
    feature = "ndarray",
    feature = "ndarray-blas-netlib",
    feature = "ndarray-blas-openblas",
    feature = "ndarray-blas-accelerate",
))]
mod ndarray {
    use burn::backend::{
        ndarray::{NdArray, NdArrayDevice},
        Autodiff,
    };

    pub fn run() {
        let device = NdArrayDevice::Cpu;
        super::launch::<Autodiff<NdArray>>(device);
    }
}

#[cfg(feature = "tch-gpu")]
mod tch_gpu {
    use burn::backend::{
        libtorch::{LibTorch, LibTorchDevice},
        Autodiff,
    };

    pub fn run() {
        #[cfg(not(target_os = "macos"))]
        let device = LibTorchDevice::Cuda(0);
        #[cfg(target_os = "macos")]
        let device = LibTorchDevice::Mps;

        super::launch::<Autodiff<LibTorch>>(device);
    }
}

#[cfg(feature = "tch-cpu")]
mod tch_cpu {
    use burn::backend::{
        libtorch::{LibTorch, LibTorchDevice},
        Autodiff,
    };

    pub fn run() {
        let device = LibTorchDevice::Cpu;
        super::launch::<Autodiff<LibTorch>>(device);
    }
}

#[cfg(any(feature = "wgpu", feature = "metal"))]
mod wgpu {
    use burn::backend::{
        wgpu::{Wgpu, WgpuDevice},
        Autodiff,
    };

    pub fn run() {
        let device = WgpuDevice::default();
        super::launch::<Autodiff<Wgpu>>(device);
    }
}

fn main() {
    #[cfg(any(
        feature = "ndarray",
        feature = "ndarray-blas-netlib",
        feature = "ndarray-blas-openblas",
        feature = "ndarray-blas-accelerate",
    ))]
    ndarray::run();
    #[cfg(feature = "tch-gpu")]
    tch_gpu::run();
    #[cfg(feature = "tch-cpu")]
    tch_cpu::run();
    #[cfg(any(feature = "wgpu", feature = "metal"))]
    wgpu::run();

    #[cfg(not(any(
        feature = "ndarray",
        feature = "ndarray-blas-netlib",
        feature = "ndarray-blas-openblas",
        feature = "ndarray-blas-accelerate",
        feature = "tch-gpu",
        feature = "tch-cpu",
        feature = "wgpu",
        feature = "metal",
    )))]
    eprintln!("No backend selected, enable one of the backend features (e.g. `--features ndarray`).");
}
