use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::CaptureOutput;
use crate::config::Config;
use crate::executor::Executor;
use crate::fs_utils::{move_file, remove_if_exists};
use crate::images::canonical::{canonical_kind, CanonicalRule};
use crate::images::tools::ImageTools;
use crate::images::ImageError;
use crate::pass::PassCapture;
use crate::publish::AnnotationFields;
use crate::receiver::ReceiveMode;

/// One decoded image on its way from the decoder into the output namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub source: PathBuf,
    pub kind: String,
    pub output: PathBuf,
    pub thumbnail: PathBuf,
}

impl ImageArtifact {
    pub fn new(
        source: &Path,
        kind: &str,
        filename_base: &str,
        image_output: &Path,
        thumb_output: &Path,
    ) -> Self {
        let file_name = format!("{}-{}.jpg", filename_base, kind);
        Self {
            source: source.to_path_buf(),
            kind: kind.to_string(),
            output: image_output.join(&file_name),
            thumbnail: thumb_output.join(&file_name),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessedImages {
    pub artifacts: Vec<ImageArtifact>,
    /// Full-size outputs in discovery order.
    pub push_files: Vec<PathBuf>,
}

pub struct ImagePostProcessor<'a> {
    config: &'a Config,
    tools: ImageTools<'a>,
}

impl<'a> ImagePostProcessor<'a> {
    pub fn new(config: &'a Config, executor: &'a Executor) -> Self {
        Self {
            config,
            tools: ImageTools::new(&config.tools, executor),
        }
    }

    fn should_flip(&self, mode: ReceiveMode, kind: &str, pass: &PassCapture) -> bool {
        if !(self.config.features.flip_on_northbound && pass.is_northbound()) {
            return false;
        }
        if mode.emits_spread_images() {
            kind.starts_with("spread_")
        } else {
            kind.contains("corrected")
        }
    }

    /// Canonicalizes, flips, annotates, thumbnails and relocates every raw image.
    pub fn process(
        &self,
        capture: &CaptureOutput,
        pass: &PassCapture,
        fields: &AnnotationFields,
    ) -> Result<ProcessedImages, ImageError> {
        let image_output = &self.config.paths.image_output;
        let thumb_output = self.config.paths.thumb_output();
        fs::create_dir_all(image_output)?;
        fs::create_dir_all(&thumb_output)?;

        let rule = CanonicalRule::for_mode(capture.mode);
        let mut processed = ProcessedImages::default();
        let mut seen_kinds = HashSet::new();

        for raw in &capture.raw_images {
            let Some(raw_name) = raw.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let kind = canonical_kind(raw_name, rule);
            if kind.is_empty() {
                log::warn!(
                    "Skipping {}: no image kind left after canonicalization",
                    raw.display()
                );
                continue;
            }
            if !seen_kinds.insert(kind.clone()) {
                log::warn!(
                    "Skipping {}: another image already produced kind {}",
                    raw.display(),
                    kind
                );
                continue;
            }

            let artifact = ImageArtifact::new(
                raw,
                &kind,
                &pass.filename_base,
                image_output,
                &thumb_output,
            );
            if !self.process_one(&artifact, capture, pass, fields)? {
                continue;
            }

            processed.push_files.push(artifact.output.clone());
            processed.artifacts.push(artifact);
        }

        if capture.work_dir.exists() {
            fs::remove_dir_all(&capture.work_dir)?;
        }

        log::info!(
            "Post-processed {} image(s) for {}",
            processed.artifacts.len(),
            pass.filename_base
        );
        Ok(processed)
    }

    /// Returns false when no output image could be produced.
    fn process_one(
        &self,
        artifact: &ImageArtifact,
        capture: &CaptureOutput,
        pass: &PassCapture,
        fields: &AnnotationFields,
    ) -> Result<bool, ImageError> {
        let extension = artifact
            .source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg");
        let canonical = capture
            .work_dir
            .join(format!("{}.{}", artifact.kind, extension));
        move_file(&artifact.source, &canonical)?;

        if self.should_flip(capture.mode, &artifact.kind, pass) {
            log::info!("Flipping {} for northbound pass", artifact.kind);
            self.tools.flip(&canonical)?;
        }

        self.tools.annotate(
            &canonical,
            &artifact.output,
            fields,
            self.config.images.annotation_quality,
        )?;
        if !artifact.output.exists() {
            log::warn!(
                "Annotation produced no {}, keeping the image unannotated",
                artifact.output.display()
            );
            if is_jpeg(extension) {
                move_file(&canonical, &artifact.output)?;
            } else {
                self.tools.to_jpeg(&canonical, &artifact.output)?;
            }
        }
        remove_if_exists(&canonical)?;
        if !artifact.output.exists() {
            log::warn!("Dropping {}: no JPEG could be produced", artifact.kind);
            return Ok(false);
        }

        self.tools.thumbnail(&artifact.output, &artifact.thumbnail)?;
        if !artifact.thumbnail.exists() {
            log::warn!("No thumbnail generated for {}", artifact.kind);
        }
        Ok(true)
    }
}

fn is_jpeg(extension: &str) -> bool {
    extension.eq_ignore_ascii_case("jpg") || extension.eq_ignore_ascii_case("jpeg")
}
