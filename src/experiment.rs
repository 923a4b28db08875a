use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::{
    config::Config,
    module::Module,
    record::CompactRecorder,
    tensor::backend::Backend,
};

use crate::error::Error;

const INFO_FILE: &str = "experiment.json";
pub(crate) const CONFIG_FILE: &str = "config.json";
pub(crate) const MODEL_FILE: &str = "model";

/// Metadata written at the root of the artifact directory.
#[derive(Config, Debug)]
pub struct ExperimentInfo {
    pub name: String,
    pub comment: String,
}

/// Context of a single training run.
///
/// Owns the artifact directory of the run: created with [create](Experiment::create), the
/// configurations are recorded before [start](Experiment::start), and [finish](Experiment::finish)
/// persists the trained model and closes the run.
#[derive(Debug)]
pub struct Experiment {
    info: ExperimentInfo,
    artifact_dir: PathBuf,
    started: Option<Instant>,
}

impl Experiment {
    /// Creates the experiment and its artifact directory.
    ///
    /// Artifacts of a previous run in the same directory are removed to keep the learner summary
    /// accurate.
    pub fn create<P: AsRef<Path>>(
        name: impl Into<String>,
        comment: impl Into<String>,
        artifact_dir: P,
    ) -> Result<Self, Error> {
        let artifact_dir = artifact_dir.as_ref().to_path_buf();
        let info = ExperimentInfo::new(name.into(), comment.into());

        if artifact_dir.exists() {
            log::warn!(
                "Removing artifacts of a previous run in {}",
                artifact_dir.display()
            );
            std::fs::remove_dir_all(&artifact_dir)?;
        }
        std::fs::create_dir_all(&artifact_dir)?;
        info.save(artifact_dir.join(INFO_FILE))?;

        log::info!("Created experiment '{}' ({})", info.name, info.comment);

        Ok(Self {
            info,
            artifact_dir,
            started: None,
        })
    }

    pub fn info(&self) -> &ExperimentInfo {
        &self.info
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Saves the configuration of the run next to its artifacts.
    pub fn record_config<C: Config>(&self, config: &C) -> Result<(), Error> {
        config.save(self.config_path())?;

        Ok(())
    }

    /// Marks the beginning of the training run.
    pub fn start(&mut self) {
        log::info!("Starting experiment '{}'", self.info.name);
        self.started = Some(Instant::now());
    }

    /// Persists the trained model and closes the run, returning the path of the saved model.
    pub fn finish<B: Backend, M: Module<B>>(self, model: M) -> Result<PathBuf, Error> {
        let path = self.model_path();
        model
            .save_file(path.clone(), &CompactRecorder::new())
            .map_err(|err| Error::Record(format!("{err:?}")))?;

        match self.started {
            Some(started) => {
                let elapsed = started.elapsed().as_secs();
                log::info!(
                    "Experiment '{}' completed in {}m{}s",
                    self.info.name,
                    elapsed / 60,
                    elapsed % 60
                );
            }
            None => log::warn!(
                "Experiment '{}' finished without being started",
                self.info.name
            ),
        }

        Ok(path)
    }

    pub(crate) fn config_path(&self) -> PathBuf {
        self.artifact_dir.join(CONFIG_FILE)
    }

    pub(crate) fn model_path(&self) -> PathBuf {
        self.artifact_dir.join(MODEL_FILE)
    }
}
