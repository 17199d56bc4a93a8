use serde::Serialize;

use crate::pass::Gain;

/// `sat_type` of every pass this pipeline records (LRPT weather satellites).
pub const SAT_TYPE_LRPT: i32 = 0;

/// A decoded pass as the web panel lists it. Keyed by `pass_start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassRecord {
    pub pass_start: i64,
    /// The filename base every artifact of the pass is named after.
    pub file_path: String,
    pub daylight: bool,
    pub sat_type: i32,
    pub has_spectrogram: bool,
    pub has_polar_az_el: bool,
    pub has_polar_direction: bool,
    /// Numeric dB or `Automatic`.
    pub gain: String,
}

impl PassRecord {
    pub fn new(pass_start: i64, file_path: &str, gain: Gain) -> Self {
        Self {
            pass_start,
            file_path: file_path.to_string(),
            daylight: false,
            sat_type: SAT_TYPE_LRPT,
            has_spectrogram: false,
            has_polar_az_el: false,
            has_polar_direction: false,
            gain: gain.label(),
        }
    }
}

/// A scheduled pass prediction. Recording a pass deactivates its prediction.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictedPass {
    pub sat_name: String,
    pub pass_start: i64,
    pub pass_end: i64,
    pub max_elev: i32,
    pub is_active: bool,
}
