mod error;
mod lease;
mod orchestrator;
mod staging;

pub use error::{CaptureError, LeaseError};
pub use lease::CaptureLeaseManager;
pub use orchestrator::{CaptureOrchestrator, CaptureOutput};
pub use staging::{MemoryStagingPolicy, StagingLocation};
