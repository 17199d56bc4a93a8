mod mode;
mod profile;

pub use mode::ReceiveMode;
pub use profile::{ReceiverProfile, ReceiverType};
