use std::path::PathBuf;
use std::str::FromStr;

use crate::capture::{CaptureLeaseManager, CaptureOrchestrator, CaptureOutput, MemoryStagingPolicy};
use crate::config::Config;
use crate::daylight::{Daylight, DaylightClassifier, ExternalSunElevation};
use crate::executor::Executor;
use crate::images::{ImagePostProcessor, PolarPlots, PolarPlotter, WebsiteThumbnailSelector};
use crate::pass::{Gain, PassCapture};
use crate::pipeline::{PipelineError, RunLog, RunState};
use crate::publish::{AnnotationFields, PublishFanout};
use crate::receiver::{ReceiveMode, ReceiverProfile};
use crate::store::{PassRecord, PassRecorder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The pass was recorded and handed to the publish channels.
    Completed {
        images: usize,
        failed_channels: Vec<String>,
    },
    /// Nothing was recorded or published.
    Skipped { reason: String },
}

/// What the leased part of a run hands to post-processing.
struct CapturedPass {
    daylight: Daylight,
    plots: PolarPlots,
    output: CaptureOutput,
}

/// Runs one pass from receiver selection to publishing.
pub struct PassPipeline<'a> {
    config: &'a Config,
    executor: &'a Executor,
}

impl<'a> PassPipeline<'a> {
    pub fn new(config: &'a Config, executor: &'a Executor) -> Self {
        Self { config, executor }
    }

    pub fn run(&self, pass: &PassCapture) -> Result<PipelineOutcome, PipelineError> {
        let profile = self.config.receiver_profile()?;
        let mut run_log = RunLog::new(pass);

        let result = match ReceiveMode::from_str(&self.config.receiver.mode) {
            Ok(mode) => self.run_leased(pass, &profile, mode, &mut run_log),
            Err(_) => {
                log::error!(
                    "Unknown receive mode {:?}, nothing to do for {}",
                    self.config.receiver.mode,
                    pass.filename_base
                );
                Ok(PipelineOutcome::Skipped {
                    reason: format!("unknown receive mode {}", self.config.receiver.mode),
                })
            }
        };

        match &result {
            Ok(PipelineOutcome::Completed { .. }) => run_log.finish(RunState::Completed, None),
            Ok(PipelineOutcome::Skipped { reason }) => {
                run_log.finish(RunState::Skipped, Some(reason.clone()))
            }
            Err(e) => run_log.finish(RunState::Failed, Some(e.to_string())),
        }
        self.save_run_log(&run_log);

        result
    }

    /// Holds the capture lease only while the receiver is in use. Image work
    /// and publishing run unleased so the next pass can take the receiver.
    fn run_leased(
        &self,
        pass: &PassCapture,
        profile: &ReceiverProfile,
        mode: ReceiveMode,
        run_log: &mut RunLog,
    ) -> Result<PipelineOutcome, PipelineError> {
        let leases = CaptureLeaseManager::new(
            &self.config.paths.lease_file,
            self.executor,
            &self.config.tools,
        );
        let lease = run_log.stage("lease", || leases.acquire(&pass.filename_base))?;
        log::debug!("Holding capture lease as PID {}", lease.holder().pid);

        let captured = self.capture(pass, profile, mode, run_log);

        if let Err(e) = leases.release(lease) {
            log::warn!("Failed to release capture lease: {}", e);
        }
        self.process(pass, captured?, run_log)
    }

    fn capture(
        &self,
        pass: &PassCapture,
        profile: &ReceiverProfile,
        mode: ReceiveMode,
        run_log: &mut RunLog,
    ) -> Result<CapturedPass, PipelineError> {
        let config = self.config;
        let daylight = self.classify_daylight(pass);
        let staging = MemoryStagingPolicy::new(&config.staging).choose();

        let plots = run_log.stage("polar_plots", || {
            PolarPlotter::new(config, self.executor).produce(pass)
        })?;

        let output = run_log.stage("capture", || {
            CaptureOrchestrator::new(config, self.executor).capture(pass, profile, mode, &staging)
        })?;

        Ok(CapturedPass {
            daylight,
            plots,
            output,
        })
    }

    fn process(
        &self,
        pass: &PassCapture,
        captured: CapturedPass,
        run_log: &mut RunLog,
    ) -> Result<PipelineOutcome, PipelineError> {
        let config = self.config;
        let CapturedPass {
            daylight,
            plots,
            output: capture,
        } = captured;

        let gain = Gain::from_config(config.receiver.gain);
        let fields = AnnotationFields::new(
            pass,
            config.station.label.as_deref(),
            daylight.sun_elevation_deg,
            gain,
        );
        let processed = run_log.stage("post_process", || {
            ImagePostProcessor::new(config, self.executor).process(&capture, pass, &fields)
        })?;

        if !processed.push_files.iter().any(|p| p.exists()) {
            log::info!(
                "No images decoded for {}, skipping record and publish",
                pass.filename_base
            );
            return Ok(PipelineOutcome::Skipped {
                reason: "no images decoded".to_string(),
            });
        }

        let record = PassRecord {
            daylight: daylight.is_day,
            has_spectrogram: capture.spectrogram.is_some(),
            has_polar_az_el: plots.az_el.is_some(),
            has_polar_direction: plots.direction.is_some(),
            ..PassRecord::new(pass.epoch_start, &pass.filename_base, gain)
        };
        run_log.stage("record", || {
            PassRecorder::open(&config.paths.database)?.record(&record)
        })?;

        let thumb_output = config.paths.thumb_output();
        run_log.stage("website_thumbnail", || {
            WebsiteThumbnailSelector::new(&thumb_output).select(&pass.filename_base)
        })?;

        let mut push_files: Vec<PathBuf> = processed.push_files.clone();
        push_files.extend(plots.files().cloned());
        let report = PublishFanout::from_config(&config.publish.channels, self.executor)
            .publish(&push_files, &fields);

        let failed_channels = match &report {
            Some(report) => {
                log::info!(
                    "Publish attempted on {} channel(s) for {}",
                    report.attempted(),
                    pass.filename_base
                );
                report.failed().into_iter().map(String::from).collect()
            }
            None => Vec::new(),
        };
        run_log.publish = report;

        Ok(PipelineOutcome::Completed {
            images: processed.artifacts.len(),
            failed_channels,
        })
    }

    /// A failing ephemeris tool leaves the pass as night with unknown sun elevation.
    fn classify_daylight(&self, pass: &PassCapture) -> Daylight {
        let source = ExternalSunElevation::new(&self.config.tools.sun_elevation, self.executor);
        DaylightClassifier::new(source, self.config.daylight.min_sun_elevation)
            .classify(pass.midpoint_epoch())
            .unwrap_or_else(|e| {
                log::warn!("Sun elevation unavailable ({}), treating pass as night", e);
                Daylight::unknown()
            })
    }

    fn save_run_log(&self, run_log: &RunLog) {
        let Some(dir) = &self.config.paths.run_logs else {
            return;
        };
        match run_log.save(dir) {
            Ok(path) => log::debug!("Run log written to {}", path.display()),
            Err(e) => log::warn!("Failed to write run log: {}", e),
        }
    }
}
