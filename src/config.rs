use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::executor::OnFail;
use crate::publish::{AnnotationStyle, DispatchMode};
use crate::receiver::ReceiverProfile;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unknown receiver type: {0:?}")]
    UnknownReceiverType(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub station: StationConfig,
    pub receiver: ReceiverConfig,
    pub staging: StagingConfig,
    #[serde(default)]
    pub features: FeatureFlags,
    pub paths: PathsConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub daylight: DaylightConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationConfig {
    /// Shown at the top of every publish annotation when set.
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverConfig {
    pub receiver_type: String,
    /// Checked when the pipeline dispatches, an unknown mode makes the run a no-op.
    pub mode: String,
    /// dB, 0 selects automatic gain.
    #[serde(default)]
    pub gain: f64,
    pub frequency_mhz: f64,
    #[serde(default)]
    pub ppm: i32,
    #[serde(default)]
    pub bias_tee: bool,
    #[serde(default)]
    pub interleaving_80k: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    pub ram_dir: PathBuf,
    pub disk_dir: PathBuf,
    pub memory_threshold_mb: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub produce_spectrogram: bool,
    pub produce_polar_az_el: bool,
    pub produce_polar_direction: bool,
    pub flip_on_northbound: bool,
    pub delete_audio: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    pub image_output: PathBuf,
    /// Defaults to `{image_output}/thumb`.
    pub thumb_output: Option<PathBuf>,
    /// Where recorded audio is kept when `delete_audio` is off.
    pub audio_output: Option<PathBuf>,
    pub work_dir: PathBuf,
    pub database: PathBuf,
    pub lease_file: PathBuf,
    pub run_logs: Option<PathBuf>,
}

impl PathsConfig {
    pub fn thumb_output(&self) -> PathBuf {
        self.thumb_output
            .clone()
            .unwrap_or_else(|| self.image_output.join("thumb"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_annotation_quality")]
    pub annotation_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            annotation_quality: default_annotation_quality(),
        }
    }
}

fn default_annotation_quality() -> u8 {
    90
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaylightConfig {
    /// Sun elevation (degrees) a pass midpoint must exceed to count as daylight.
    #[serde(default)]
    pub min_sun_elevation: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub on_fail: OnFail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub rtl_fm: String,
    pub sox: String,
    pub meteor_demod: String,
    pub medet: String,
    pub rectify: String,
    pub python: String,
    pub gnuradio_flowgraph: PathBuf,
    pub satdump: String,
    pub convert: String,
    pub annotate: String,
    pub sun_elevation: String,
    pub polar_plot: String,
    pub kill: String,
    pub pkill: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            rtl_fm: "rtl_fm".into(),
            sox: "sox".into(),
            meteor_demod: "meteor_demod".into(),
            medet: "medet".into(),
            rectify: "rectify".into(),
            python: "python3".into(),
            gnuradio_flowgraph: PathBuf::from("/usr/local/share/pass-o-mat/rtlsdr_m2_lrpt_rx.py"),
            satdump: "satdump".into(),
            convert: "convert".into(),
            annotate: "annotate-image".into(),
            sun_elevation: "sun-elevation".into(),
            polar_plot: "polar-plot".into(),
            kill: "kill".into(),
            pkill: "pkill".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub style: AnnotationStyle,
    #[serde(default)]
    pub dispatch: DispatchMode,
    /// Pause between per-file calls, e.g. `2s`.
    #[serde(default = "default_channel_delay", deserialize_with = "deserialize_duration")]
    pub delay: Duration,
    /// Publisher executable for this channel.
    pub command: String,
    /// Channel-specific destination (webhook, address, room id).
    pub target: Option<String>,
}

fn default_channel_delay() -> Duration {
    Duration::from_secs(2)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    /// Loads and validates the station configuration.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ReceiverProfile::resolve(&self.receiver.receiver_type)?;

        if !(1..=100).contains(&self.images.annotation_quality) {
            return Err(ConfigError::Invalid(format!(
                "images.annotation_quality must be 1-100, got {}",
                self.images.annotation_quality
            )));
        }
        if self.receiver.frequency_mhz <= 0.0 {
            return Err(ConfigError::Invalid(
                "receiver.frequency_mhz must be positive".into(),
            ));
        }
        if self.receiver.gain < 0.0 {
            return Err(ConfigError::Invalid("receiver.gain must not be negative".into()));
        }
        for channel in &self.publish.channels {
            if channel.command.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "publish channel {} has no command",
                    channel.name
                )));
            }
        }
        if !self.features.delete_audio && self.paths.audio_output.is_none() {
            log::warn!("delete_audio is off but paths.audio_output is unset, audio will be deleted");
        }
        Ok(())
    }

    pub fn receiver_profile(&self) -> Result<ReceiverProfile, ConfigError> {
        ReceiverProfile::resolve(&self.receiver.receiver_type)
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_CONFIG: &str = r#"
station:
  label: "EA4 Ground Station"
receiver:
  receiver_type: rtl_sdr
  mode: rtl_fm
  gain: 0
  frequency_mhz: 137.9
staging:
  ram_dir: /run/pass-o-mat
  disk_dir: /srv/pass-o-mat/audio
  memory_threshold_mb: 1000
features:
  produce_spectrogram: true
  flip_on_northbound: true
  delete_audio: true
paths:
  image_output: /srv/images
  work_dir: /srv/pass-o-mat/work
  database: /srv/pass-o-mat/panel.db
  lease_file: /run/pass-o-mat/capture.lease
daylight:
  min_sun_elevation: 10
publish:
  channels:
    - name: discord
      enabled: true
      style: markdown
      dispatch: per_file
      delay: 1s
      command: discord-push
      target: https://discord.example/webhook
    - name: twitter
      enabled: false
      style: compact
      dispatch: batch
      command: tweet
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_config() {
        let config = Config::from_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.station.label.as_deref(), Some("EA4 Ground Station"));
        assert_eq!(config.receiver.mode, "rtl_fm");
        assert_eq!(config.paths.thumb_output(), PathBuf::from("/srv/images/thumb"));
        assert_eq!(config.images.annotation_quality, 90);
        assert_eq!(config.executor.on_fail, OnFail::Continue);
        assert_eq!(config.tools.satdump, "satdump");

        let discord = &config.publish.channels[0];
        assert_eq!(discord.delay, Duration::from_secs(1));
        assert_eq!(discord.dispatch, DispatchMode::PerFile);
        assert_eq!(config.publish.channels[1].delay, Duration::from_secs(2));
    }

    #[test]
    fn test_unknown_receiver_type_fails_validation() {
        let yaml = SAMPLE_CONFIG.replace("receiver_type: rtl_sdr", "receiver_type: funcube");
        let err = Config::from_str(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownReceiverType(t) if t == "funcube"));
    }

    #[test]
    fn test_unknown_mode_is_accepted_at_load() {
        let yaml = SAMPLE_CONFIG.replace("mode: rtl_fm", "mode: sdrangel");
        assert!(Config::from_str(&yaml).is_ok());
    }

    #[test]
    fn test_bad_channel_delay_is_yaml_error() {
        let yaml = SAMPLE_CONFIG.replace("delay: 1s", "delay: soon");
        assert!(matches!(
            Config::from_str(&yaml).unwrap_err(),
            ConfigError::Yaml(_)
        ));
    }
}
