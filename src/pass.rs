use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use strum_macros::{Display, EnumString};

/// Offset from AOS used as the pass midpoint for sun elevation lookups.
pub const MIDPOINT_OFFSET_SECONDS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum PassDirection {
    Northbound,
    Southbound,
}

impl PassDirection {
    pub fn label(&self) -> &'static str {
        match self {
            PassDirection::Northbound => "Northbound",
            PassDirection::Southbound => "Southbound",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum PassSide {
    #[strum(to_string = "E", serialize = "east")]
    East,
    #[strum(to_string = "W", serialize = "west")]
    West,
}

/// Receiver gain as configured. A configured gain of 0 means automatic gain control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gain {
    Automatic,
    Db(f64),
}

impl Gain {
    pub fn from_config(gain: f64) -> Self {
        if gain == 0.0 {
            Gain::Automatic
        } else {
            Gain::Db(gain)
        }
    }

    /// `Automatic` or the bare dB value, as stored with the pass.
    pub fn label(&self) -> String {
        match self {
            Gain::Automatic => "Automatic".to_string(),
            Gain::Db(db) => db.to_string(),
        }
    }
}

/// A single pass handed to the pipeline by the scheduler.
#[derive(Debug, Clone)]
pub struct PassCapture {
    pub satellite: String,
    /// Unique key for every artifact of this pass.
    pub filename_base: String,
    pub tle_file: PathBuf,
    /// AOS as Unix seconds.
    pub epoch_start: i64,
    pub duration_seconds: u64,
    pub max_elevation_deg: f64,
    pub direction: PassDirection,
    pub side: PassSide,
}

impl PassCapture {
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.epoch_start, 0)
    }

    pub fn midpoint_epoch(&self) -> i64 {
        self.epoch_start + MIDPOINT_OFFSET_SECONDS
    }

    pub fn is_northbound(&self) -> bool {
        self.direction == PassDirection::Northbound
    }
}

#[cfg(test)]
pub(crate) fn sample_pass(filename_base: &str) -> PassCapture {
    PassCapture {
        satellite: "METEOR-M2 3".to_string(),
        filename_base: filename_base.to_string(),
        tle_file: PathBuf::from("/tmp/weather.tle"),
        epoch_start: 1_612_553_183,
        duration_seconds: 900,
        max_elevation_deg: 54.0,
        direction: PassDirection::Northbound,
        side: PassSide::East,
    }
}
