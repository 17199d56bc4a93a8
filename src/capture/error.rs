use thiserror::Error;

use crate::executor::ExecError;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture tool error: {0}")]
    Exec(#[from] ExecError),
}

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("lease file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lease file is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to terminate competing capture: {0}")]
    Exec(#[from] ExecError),
}
