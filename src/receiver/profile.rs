use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};

use crate::config::ConfigError;

/// The SDR hardware families the station can be wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ReceiverType {
    /// RTL2832U dongle sampled directly.
    #[strum(to_string = "rtl_sdr", serialize = "rtlsdr")]
    RtlSdr,
    AirspyMini,
    AirspyR2,
    /// HackRF and other wideband software-defined front ends.
    #[strum(serialize = "hackrf")]
    HackRf,
}

/// Capture parameters for one receiver type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceiverProfile {
    pub receiver_type: ReceiverType,
    pub sample_rate: f64,
    /// Source name understood by the integrated capture tool.
    pub backend: &'static str,
}

impl ReceiverProfile {
    /// Resolves a configured receiver type. Unknown types are fatal.
    pub fn resolve(receiver_type: &str) -> Result<Self, ConfigError> {
        let receiver_type = ReceiverType::from_str(receiver_type.trim())
            .map_err(|_| ConfigError::UnknownReceiverType(receiver_type.to_string()))?;
        Ok(Self::for_type(receiver_type))
    }

    pub fn for_type(receiver_type: ReceiverType) -> Self {
        let (sample_rate, backend) = match receiver_type {
            ReceiverType::RtlSdr => (1.024e6, "rtlsdr"),
            ReceiverType::AirspyMini => (3e6, "airspy"),
            ReceiverType::AirspyR2 => (2.5e6, "airspy"),
            ReceiverType::HackRf => (4e6, "hackrf"),
        };
        Self {
            receiver_type,
            sample_rate,
            backend,
        }
    }

    /// Prefix of the streaming-demod flowgraph written for this receiver,
    /// as in `rtlsdr_m2_lrpt_rx.py`.
    pub fn flowgraph_prefix(&self) -> &'static str {
        match self.receiver_type {
            ReceiverType::RtlSdr => "rtlsdr",
            ReceiverType::AirspyMini => "airspy_mini",
            ReceiverType::AirspyR2 => "airspy_r2",
            ReceiverType::HackRf => "hackrf",
        }
    }

    /// Sample rate in the `1.024e6` notation the capture tools accept.
    pub fn sample_rate_arg(&self) -> String {
        format!("{}e6", self.sample_rate / 1e6)
    }
}
