use strum_macros::{Display, EnumString};

/// How a pass is received and turned into images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ReceiveMode {
    /// rtl_fm records audio, then an offline OQPSK demodulator and decoder run.
    RtlFm,
    /// A GNU Radio flowgraph demodulates while recording soft symbols.
    Gnuradio,
    /// One live capture+decode tool handles the whole pass.
    Satdump,
}

impl ReceiveMode {
    /// The direct and streaming modes emit timestamped `spread_*` images.
    pub fn emits_spread_images(&self) -> bool {
        !matches!(self, ReceiveMode::Satdump)
    }
}
