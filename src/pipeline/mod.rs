mod run_log;
mod runner;

use thiserror::Error;

use crate::capture::{CaptureError, LeaseError};
use crate::config::ConfigError;
use crate::executor::ExecError;
use crate::images::ImageError;
use crate::store::StoreError;

pub use run_log::{RunLog, RunState};
pub use runner::{PassPipeline, PipelineOutcome};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("capture lease error: {0}")]
    Lease(#[from] LeaseError),
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("image processing error: {0}")]
    Image(#[from] ImageError),
    #[error("pass store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Exec(#[from] ExecError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
