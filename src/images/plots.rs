use std::fs;
use std::path::PathBuf;

use crate::config::Config;
use crate::executor::{ExecError, Executor, ExternalCommand};
use crate::pass::PassCapture;

/// Polar plots that made it to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolarPlots {
    pub az_el: Option<PathBuf>,
    pub direction: Option<PathBuf>,
}

impl PolarPlots {
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.az_el.iter().chain(self.direction.iter())
    }
}

/// Sky-track plots drawn by the external plotter from the pass TLE.
pub struct PolarPlotter<'a> {
    config: &'a Config,
    executor: &'a Executor,
}

impl<'a> PolarPlotter<'a> {
    pub fn new(config: &'a Config, executor: &'a Executor) -> Self {
        Self { config, executor }
    }

    pub fn produce(&self, pass: &PassCapture) -> Result<PolarPlots, ExecError> {
        let features = &self.config.features;
        let mut plots = PolarPlots::default();
        if !(features.produce_polar_az_el || features.produce_polar_direction) {
            return Ok(plots);
        }
        if let Err(e) = fs::create_dir_all(&self.config.paths.image_output) {
            log::warn!("Cannot create image output directory: {}", e);
            return Ok(plots);
        }

        if features.produce_polar_az_el {
            plots.az_el = self.plot(pass, "azel", "polar-azel.jpg")?;
        }
        if features.produce_polar_direction {
            plots.direction = self.plot(pass, "direction", "polar-direction.png")?;
        }
        Ok(plots)
    }

    fn plot(
        &self,
        pass: &PassCapture,
        kind: &str,
        suffix: &str,
    ) -> Result<Option<PathBuf>, ExecError> {
        let output = self
            .config
            .paths
            .image_output
            .join(format!("{}-{}", pass.filename_base, suffix));
        self.executor.run_best_effort(
            &ExternalCommand::new(&self.config.tools.polar_plot)
                .arg(kind)
                .path_arg(&pass.tle_file)
                .arg(&pass.satellite)
                .arg(pass.epoch_start.to_string())
                .arg(pass.duration_seconds.to_string())
                .path_arg(&output),
        )?;

        if output.is_file() {
            Ok(Some(output))
        } else {
            log::warn!("Polar plot {} was not produced", output.display());
            Ok(None)
        }
    }
}
