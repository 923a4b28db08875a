use std::path::{Path, PathBuf};

use burn::data::{dataset::vision::ImageFolderDataset, network::downloader::download_file_as_bytes};
use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::Error;

/// Source of the CIFAR-10 image folder archive (train/test split into one directory per class).
const URL: &str = "https://s3.amazonaws.com/fast-ai-sample/cifar10.tgz";

/// The ten CIFAR-10 classes, indexed by label.
pub const CLASSES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

pub trait Cifar10Loader: Sized {
    fn cifar10_train<P: AsRef<Path>>(root: P) -> Result<Self, Error>;
    fn cifar10_test<P: AsRef<Path>>(root: P) -> Result<Self, Error>;
}

impl Cifar10Loader for ImageFolderDataset {
    /// Creates the training split, downloading the dataset into `root` if needed.
    fn cifar10_train<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let dir = download(root.as_ref())?;

        Ok(Self::new_classification(dir.join("train"))?)
    }

    /// Creates the test split, downloading the dataset into `root` if needed.
    fn cifar10_test<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let dir = download(root.as_ref())?;

        Ok(Self::new_classification(dir.join("test"))?)
    }
}

/// Download and extract the CIFAR-10 archive under `root`, returning the dataset directory.
fn download(root: &Path) -> Result<PathBuf, Error> {
    let cifar_dir = root.join("cifar10");

    if is_extracted(&cifar_dir) {
        return Ok(cifar_dir);
    }

    std::fs::create_dir_all(root)?;
    log::info!("Downloading CIFAR-10 into {}", root.display());
    let bytes = download_file_as_bytes(URL, "cifar10.tgz");

    extract(&bytes, root)?;
    log::info!("CIFAR-10 extracted to {}", cifar_dir.display());

    Ok(cifar_dir)
}

// Presence of the labels file marks a completed extraction.
fn is_extracted(cifar_dir: &Path) -> bool {
    cifar_dir.join("labels.txt").exists()
}

fn extract(bytes: &[u8], dest: &Path) -> Result<(), Error> {
    let gz_buffer = GzDecoder::new(bytes);
    let mut archive = Archive::new(gz_buffer);
    archive.unpack(dest)?;

    Ok(())
}
