pub mod canonical;
mod plots;
mod postprocess;
mod tools;
mod website;

use thiserror::Error;

use crate::executor::ExecError;

pub use plots::{PolarPlots, PolarPlotter};
pub use postprocess::ImagePostProcessor;
pub use website::WebsiteThumbnailSelector;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image tool error: {0}")]
    Exec(#[from] ExecError),
}
