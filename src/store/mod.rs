//! SQLite store shared with the station web panel.

mod recorder;
mod types;

use thiserror::Error;

pub use recorder::PassRecorder;
pub use types::PassRecord;
#[cfg(test)]
pub use types::PredictedPass;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
