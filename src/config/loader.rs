use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::SupervisorConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error reading config: `{0}`")]
    IOError(#[from] std::io::Error),

    #[error("error parsing config: `{0}`")]
    SerdeYamlError(#[from] serde_yaml::Error),
}

pub struct ConfigLoaderFile {
    path: PathBuf,
}

impl ConfigLoaderFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<SupervisorConfig, ConfigError> {
        let file = File::open(&self.path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}
