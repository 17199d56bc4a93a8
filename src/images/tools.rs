use std::path::Path;

use crate::config::ToolsConfig;
use crate::executor::{ExecError, Executor, ExternalCommand};
use crate::publish::AnnotationFields;

/// Long edge of every generated thumbnail, in pixels.
pub const THUMBNAIL_SIZE: u32 = 300;

/// Thin wrappers around the external image tools.
pub struct ImageTools<'a> {
    tools: &'a ToolsConfig,
    executor: &'a Executor,
}

impl<'a> ImageTools<'a> {
    pub fn new(tools: &'a ToolsConfig, executor: &'a Executor) -> Self {
        Self { tools, executor }
    }

    /// Rotates the image 180° in place.
    pub fn flip(&self, image: &Path) -> Result<(), ExecError> {
        self.executor.run_best_effort(
            &ExternalCommand::new(&self.tools.convert)
                .path_arg(image)
                .args(["-rotate", "180"])
                .path_arg(image),
        )?;
        Ok(())
    }

    /// Renders the pass metadata onto `input`, writing a JPEG to `output`.
    pub fn annotate(
        &self,
        input: &Path,
        output: &Path,
        fields: &AnnotationFields,
        quality: u8,
    ) -> Result<(), ExecError> {
        let mut cmd = ExternalCommand::new(&self.tools.annotate);
        if let Some(label) = &fields.station_label {
            cmd = cmd.arg("--label").arg(label);
        }
        let cmd = cmd
            .arg("--satellite")
            .arg(&fields.satellite)
            .arg("--start")
            .arg(fields.capture_start_label())
            .arg("--max-elevation")
            .arg(format!("{:.0}", fields.max_elevation_deg))
            .arg("--side")
            .arg(fields.side.to_string())
            .arg("--sun-elevation")
            .arg(fields.sun_elevation_label())
            .arg("--direction")
            .arg(fields.direction.label())
            .arg("--gain")
            .arg(fields.gain.label())
            .arg("--quality")
            .arg(quality.to_string())
            .path_arg(input)
            .path_arg(output);
        self.executor.run_best_effort(&cmd)?;
        Ok(())
    }

    /// Re-encodes `input` as the JPEG at `output`.
    pub fn to_jpeg(&self, input: &Path, output: &Path) -> Result<(), ExecError> {
        self.executor.run_best_effort(
            &ExternalCommand::new(&self.tools.convert)
                .path_arg(input)
                .path_arg(output),
        )?;
        Ok(())
    }

    pub fn thumbnail(&self, input: &Path, output: &Path) -> Result<(), ExecError> {
        self.executor.run_best_effort(
            &ExternalCommand::new(&self.tools.convert)
                .path_arg(input)
                .arg("-thumbnail")
                .arg(format!("{0}x{0}", THUMBNAIL_SIZE))
                .path_arg(output),
        )?;
        Ok(())
    }
}
