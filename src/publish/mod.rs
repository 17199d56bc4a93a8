mod annotation;
mod fanout;

use thiserror::Error;

use crate::executor::ExecError;

pub use annotation::{AnnotationFields, AnnotationStyle};
pub use fanout::{DispatchMode, FanoutReport, PublishFanout};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("{0}")]
    Exec(#[from] ExecError),
    #[error("{channel} publisher exited with code {code}")]
    Rejected { channel: String, code: i32 },
    #[error("{channel} did not accept {} file(s): {}", .failed.len(), .failed.join(", "))]
    PartialDelivery { channel: String, failed: Vec<String> },
}
