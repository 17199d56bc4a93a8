use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::{CaptureError, StagingLocation};
use crate::config::Config;
use crate::executor::{Executor, ExternalCommand};
use crate::fs_utils::{list_images, move_file, remove_if_exists};
use crate::pass::PassCapture;
use crate::receiver::{ReceiveMode, ReceiverProfile};

/// Composite name and medet channel mapping (red, green, blue APIDs).
const COMPOSITES: [(&str, [u8; 3]); 3] = [
    ("321", [68, 65, 64]),
    ("221", [65, 65, 64]),
    ("IR", [68, 68, 68]),
];

/// Byproducts the integrated tool leaves next to its images.
const INTEGRATED_BYPRODUCTS: [&str; 3] = ["satdump.log", "dataset.json", "product.cbor"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    SelectMode,
    Record,
    Demodulate,
    Cleanup,
    Done,
}

/// What a capture left behind for post-processing.
#[derive(Debug, Clone)]
pub struct CaptureOutput {
    pub mode: ReceiveMode,
    /// Raw decoder images in discovery order.
    pub raw_images: Vec<PathBuf>,
    pub spectrogram: Option<PathBuf>,
    pub work_dir: PathBuf,
}

/// Paths and settings shared by every state of one capture.
struct CaptureContext<'a> {
    pass: &'a PassCapture,
    profile: &'a ReceiverProfile,
    config: &'a Config,
    executor: &'a Executor,
    staging: &'a Path,
    work_dir: PathBuf,
}

impl CaptureContext<'_> {
    fn staged(&self, extension: &str) -> PathBuf {
        self.staging
            .join(format!("{}.{}", self.pass.filename_base, extension))
    }

    fn composite_base(&self, composite: &str) -> PathBuf {
        self.staging
            .join(format!("{}_{}", self.pass.filename_base, composite))
    }

    fn run(&self, cmd: &ExternalCommand) -> Result<(), CaptureError> {
        self.executor.run_best_effort(cmd)?;
        Ok(())
    }

    /// `timeout` bounds a recorder to the pass duration.
    fn timeout_prefix(&self) -> String {
        format!("timeout {}", self.pass.duration_seconds)
    }

    fn gain(&self) -> Option<f64> {
        let gain = self.config.receiver.gain;
        (gain > 0.0).then_some(gain)
    }

    fn spread_timestamp(&self) -> String {
        self.pass
            .start_time()
            .unwrap_or_default()
            .format("%Y-%m-%d-%H-%M-%S")
            .to_string()
    }

    /// Keeps or deletes the recorded source file per `delete_audio`.
    fn dispose_of_recording(&self, recording: &Path) -> Result<(), CaptureError> {
        if !recording.exists() {
            return Ok(());
        }
        match (&self.config.paths.audio_output, self.config.features.delete_audio) {
            (Some(audio_output), false) => {
                let file_name = recording.file_name().unwrap_or_default();
                let target = audio_output.join(file_name);
                log::info!("Archiving recording to {}", target.display());
                move_file(recording, &target)?;
            }
            _ => {
                log::info!("Deleting recording {}", recording.display());
                remove_if_exists(recording)?;
            }
        }
        Ok(())
    }
}

/// One receive-mode variant. All variants share the same three steps.
trait ReceiveDriver {
    fn record(&self, ctx: &CaptureContext<'_>) -> Result<Option<PathBuf>, CaptureError>;
    fn demodulate(&self, ctx: &CaptureContext<'_>) -> Result<(), CaptureError>;
    fn cleanup(&self, ctx: &CaptureContext<'_>) -> Result<(), CaptureError>;
    fn collect_images(&self, ctx: &CaptureContext<'_>) -> Result<Vec<PathBuf>, CaptureError>;
}

/// rtl_fm audio, offline OQPSK demodulation, medet decode, rectified spread images.
struct DirectDemod;

/// GNU Radio writes soft symbols during the pass; decode afterwards.
struct StreamingDemod;

/// The integrated tool records and decodes in one go.
struct IntegratedTool;

impl ReceiveDriver for DirectDemod {
    fn record(&self, ctx: &CaptureContext<'_>) -> Result<Option<PathBuf>, CaptureError> {
        let audio = ctx.staged("wav");
        let receiver = &ctx.config.receiver;
        let tools = &ctx.config.tools;

        let mut rtl_fm = format!(
            "{} {} -d 0 {}-M raw -f {}M -s 288k -p {}",
            ctx.timeout_prefix(),
            tools.rtl_fm,
            if receiver.bias_tee { "-T " } else { "" },
            receiver.frequency_mhz,
            receiver.ppm
        );
        if let Some(gain) = ctx.gain() {
            rtl_fm.push_str(&format!(" -g {}", gain));
        }
        let pipeline = format!(
            "{} | {} -t raw -r 288k -c 2 -b 16 -e s - -t wav {} rate 96k",
            rtl_fm,
            tools.sox,
            audio.display()
        );
        ctx.run(&ExternalCommand::shell(pipeline))?;

        if !ctx.config.features.produce_spectrogram {
            return Ok(None);
        }
        produce_spectrogram(ctx, &audio)
    }

    fn demodulate(&self, ctx: &CaptureContext<'_>) -> Result<(), CaptureError> {
        let audio = ctx.staged("wav");
        let qpsk = ctx.staged("qpsk");
        let symbol_rate = if ctx.config.receiver.interleaving_80k {
            "80000"
        } else {
            "72000"
        };

        let mut demod = ExternalCommand::new(&ctx.config.tools.meteor_demod)
            .args(["-B", "-m", "oqpsk", "-r", symbol_rate]);
        if ctx.config.receiver.interleaving_80k {
            demod = demod.arg("-diff");
        }
        ctx.run(&demod.arg("-o").path_arg(&qpsk).path_arg(&audio))?;

        decode_composites(ctx, &qpsk, false)
    }

    fn cleanup(&self, ctx: &CaptureContext<'_>) -> Result<(), CaptureError> {
        remove_decoder_byproducts(ctx)?;
        remove_if_exists(&ctx.staged("qpsk"))?;
        ctx.dispose_of_recording(&ctx.staged("wav"))
    }

    fn collect_images(&self, ctx: &CaptureContext<'_>) -> Result<Vec<PathBuf>, CaptureError> {
        Ok(list_images(&ctx.work_dir)?)
    }
}

impl ReceiveDriver for StreamingDemod {
    fn record(&self, ctx: &CaptureContext<'_>) -> Result<Option<PathBuf>, CaptureError> {
        let symbols = ctx.staged("s");
        let receiver = &ctx.config.receiver;
        let tools = &ctx.config.tools;

        let cmd = format!(
            "{} {} {} {} {} {}e6 {}",
            ctx.timeout_prefix(),
            tools.python,
            tools.gnuradio_flowgraph.display(),
            symbols.display(),
            ctx.gain().unwrap_or(0.0),
            receiver.frequency_mhz,
            receiver.ppm
        );
        ctx.run(&ExternalCommand::shell(cmd))?;
        Ok(None)
    }

    fn demodulate(&self, ctx: &CaptureContext<'_>) -> Result<(), CaptureError> {
        decode_composites(ctx, &ctx.staged("s"), true)
    }

    fn cleanup(&self, ctx: &CaptureContext<'_>) -> Result<(), CaptureError> {
        remove_decoder_byproducts(ctx)?;
        ctx.dispose_of_recording(&ctx.staged("s"))
    }

    fn collect_images(&self, ctx: &CaptureContext<'_>) -> Result<Vec<PathBuf>, CaptureError> {
        Ok(list_images(&ctx.work_dir)?)
    }
}

impl ReceiveDriver for IntegratedTool {
    fn record(&self, ctx: &CaptureContext<'_>) -> Result<Option<PathBuf>, CaptureError> {
        let receiver = &ctx.config.receiver;
        let mut cmd = ExternalCommand::new(&ctx.config.tools.satdump)
            .args(["live", "meteor_m2-x_lrpt"])
            .path_arg(&ctx.work_dir)
            .args(["--source", ctx.profile.backend])
            .arg("--samplerate")
            .arg(ctx.profile.sample_rate_arg())
            .arg("--frequency")
            .arg(format!("{}e6", receiver.frequency_mhz))
            .arg("--general_gain")
            .arg(ctx.gain().unwrap_or(0.0).to_string())
            .arg("--timeout")
            .arg(ctx.pass.duration_seconds.to_string());
        if receiver.bias_tee {
            cmd = cmd.arg("--bias");
        }
        if receiver.interleaving_80k {
            cmd = cmd.arg("--m2x_mode");
        }
        ctx.run(&cmd.current_dir(&ctx.work_dir))?;
        Ok(None)
    }

    fn demodulate(&self, _ctx: &CaptureContext<'_>) -> Result<(), CaptureError> {
        // decoded live during record
        Ok(())
    }

    fn cleanup(&self, ctx: &CaptureContext<'_>) -> Result<(), CaptureError> {
        for name in INTEGRATED_BYPRODUCTS {
            remove_if_exists(&ctx.work_dir.join(name))?;
        }
        for entry in fs::read_dir(&ctx.work_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("cadu") {
                remove_if_exists(&path)?;
            }
        }
        Ok(())
    }

    /// Images are grouped in one directory per instrument/channel set.
    fn collect_images(&self, ctx: &CaptureContext<'_>) -> Result<Vec<PathBuf>, CaptureError> {
        let mut channel_dirs: Vec<PathBuf> = fs::read_dir(&ctx.work_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        channel_dirs.sort();

        let mut images = Vec::new();
        for dir in channel_dirs {
            images.extend(list_images(&dir)?);
        }
        Ok(images)
    }
}

fn produce_spectrogram(
    ctx: &CaptureContext<'_>,
    audio: &Path,
) -> Result<Option<PathBuf>, CaptureError> {
    let paths = &ctx.config.paths;
    let base = &ctx.pass.filename_base;
    let spectrogram = paths.image_output.join(format!("{}-spectrogram.png", base));
    let thumb = paths.thumb_output().join(format!("{}-spectrogram.png", base));
    fs::create_dir_all(&paths.image_output)?;
    fs::create_dir_all(paths.thumb_output())?;

    let title = format!(
        "{} {}",
        ctx.pass.satellite,
        ctx.pass.start_time().unwrap_or_default().format("%Y-%m-%d %H:%M UTC")
    );
    ctx.run(
        &ExternalCommand::new(&ctx.config.tools.sox)
            .path_arg(audio)
            .args(["-n", "spectrogram", "-t"])
            .arg(title)
            .args(["-x", "1024", "-y", "257", "-o"])
            .path_arg(&spectrogram),
    )?;
    ctx.run(
        &ExternalCommand::new(&ctx.config.tools.convert)
            .path_arg(&spectrogram)
            .args(["-thumbnail", "300x300"])
            .path_arg(&thumb),
    )?;

    Ok(spectrogram.exists().then_some(spectrogram))
}

/// Decodes every composite and rectifies it into a timestamped spread image.
fn decode_composites(
    ctx: &CaptureContext<'_>,
    symbols: &Path,
    soft: bool,
) -> Result<(), CaptureError> {
    let timestamp = ctx.spread_timestamp();
    for (composite, [r, g, b]) in COMPOSITES {
        let output_base = ctx.composite_base(composite);
        let mut medet = ExternalCommand::new(&ctx.config.tools.medet)
            .path_arg(symbols)
            .path_arg(&output_base)
            .args(["-q", "-cd"])
            .arg("-r")
            .arg(r.to_string())
            .arg("-g")
            .arg(g.to_string())
            .arg("-b")
            .arg(b.to_string());
        if soft {
            medet = medet.arg("-s");
        }
        if ctx.config.receiver.interleaving_80k {
            medet = medet.args(["-int", "-diff"]);
        }
        ctx.run(&medet)?;

        let bmp = output_base.with_extension("bmp");
        let spread = ctx
            .work_dir
            .join(format!("spread_{}_{}.jpg", composite, timestamp));
        ctx.run(
            &ExternalCommand::new(&ctx.config.tools.rectify)
                .path_arg(&bmp)
                .path_arg(&spread),
        )?;
    }
    Ok(())
}

fn remove_decoder_byproducts(ctx: &CaptureContext<'_>) -> Result<(), CaptureError> {
    for (composite, _) in COMPOSITES {
        let base = ctx.composite_base(composite);
        remove_if_exists(&base.with_extension("bmp"))?;
        remove_if_exists(&base.with_extension("gcp"))?;
    }
    Ok(())
}

/// Cleans up after a failed record or demodulate step so no staged
/// recording or decoder byproduct outlives the run.
fn abandon(
    driver: &dyn ReceiveDriver,
    ctx: &CaptureContext<'_>,
    error: CaptureError,
) -> CaptureError {
    log::warn!("Capture of {} failed, cleaning up: {}", ctx.pass.filename_base, error);
    if let Err(e) = driver.cleanup(ctx) {
        log::warn!("Cleanup after failed capture also failed: {}", e);
    }
    error
}

/// Drives one capture through `SelectMode -> Record -> Demodulate -> Cleanup -> Done`.
pub struct CaptureOrchestrator<'a> {
    config: &'a Config,
    executor: &'a Executor,
}

impl<'a> CaptureOrchestrator<'a> {
    pub fn new(config: &'a Config, executor: &'a Executor) -> Self {
        Self { config, executor }
    }

    pub fn capture(
        &self,
        pass: &PassCapture,
        profile: &ReceiverProfile,
        mode: ReceiveMode,
        staging: &StagingLocation,
    ) -> Result<CaptureOutput, CaptureError> {
        let work_dir = self.config.paths.work_dir.join(&pass.filename_base);
        fs::create_dir_all(&work_dir)?;
        fs::create_dir_all(&staging.base)?;
        log::debug!(
            "{}: staging audio in {:?} at {}",
            pass.filename_base,
            staging.kind,
            staging.base.display()
        );

        let ctx = CaptureContext {
            pass,
            profile,
            config: self.config,
            executor: self.executor,
            staging: &staging.base,
            work_dir: work_dir.clone(),
        };

        let mut state = CaptureState::SelectMode;
        let mut driver: Option<Box<dyn ReceiveDriver>> = None;
        let mut spectrogram = None;
        let mut raw_images = Vec::new();

        while state != CaptureState::Done {
            log::debug!("{}: capture state {:?}", pass.filename_base, state);
            state = match state {
                CaptureState::SelectMode => {
                    log::info!(
                        "Receiving {} via {} ({})",
                        pass.satellite,
                        mode,
                        profile.receiver_type
                    );
                    driver = Some(match mode {
                        ReceiveMode::RtlFm => Box::new(DirectDemod),
                        ReceiveMode::Gnuradio => Box::new(StreamingDemod),
                        ReceiveMode::Satdump => Box::new(IntegratedTool),
                    });
                    CaptureState::Record
                }
                CaptureState::Record => {
                    if let Some(driver) = &driver {
                        spectrogram = driver
                            .record(&ctx)
                            .map_err(|e| abandon(&**driver, &ctx, e))?;
                    }
                    CaptureState::Demodulate
                }
                CaptureState::Demodulate => {
                    if let Some(driver) = &driver {
                        driver
                            .demodulate(&ctx)
                            .map_err(|e| abandon(&**driver, &ctx, e))?;
                    }
                    CaptureState::Cleanup
                }
                CaptureState::Cleanup => {
                    if let Some(driver) = &driver {
                        driver.cleanup(&ctx)?;
                        raw_images = driver.collect_images(&ctx)?;
                    }
                    CaptureState::Done
                }
                CaptureState::Done => CaptureState::Done,
            };
        }

        log::info!(
            "Capture of {} produced {} raw image(s)",
            pass.filename_base,
            raw_images.len()
        );

        Ok(CaptureOutput {
            mode,
            raw_images,
            spectrogram,
            work_dir,
        })
    }
}
