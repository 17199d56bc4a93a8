use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ChannelConfig;
use crate::executor::{Executor, ExternalCommand};
use crate::publish::{AnnotationFields, AnnotationStyle, PublishError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One call carrying the whole push-file list.
    #[default]
    Batch,
    /// One call per file with a pause in between, for rate-limited services.
    PerFile,
}

/// A publish destination backed by an external publisher program.
#[derive(Debug, Clone)]
pub struct PushChannel {
    pub name: String,
    pub enabled: bool,
    pub style: AnnotationStyle,
    pub dispatch: DispatchMode,
    pub delay: Duration,
    pub command: String,
    pub target: Option<String>,
}

impl From<&ChannelConfig> for PushChannel {
    fn from(config: &ChannelConfig) -> Self {
        Self {
            name: config.name.clone(),
            enabled: config.enabled,
            style: config.style,
            dispatch: config.dispatch,
            delay: config.delay,
            command: config.command.clone(),
            target: config.target.clone(),
        }
    }
}

impl PushChannel {
    fn command(&self, annotation: &str, files: &[PathBuf]) -> ExternalCommand {
        let mut cmd = ExternalCommand::new(&self.command);
        if let Some(target) = &self.target {
            cmd = cmd.arg(target);
        }
        cmd = cmd.arg(annotation);
        for file in files {
            cmd = cmd.path_arg(file);
        }
        cmd
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Disabled,
    Delivered { calls: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FanoutReport {
    pub channels: Vec<(String, ChannelOutcome)>,
}

impl FanoutReport {
    pub fn attempted(&self) -> usize {
        self.channels
            .iter()
            .filter(|(_, o)| *o != ChannelOutcome::Disabled)
            .count()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.channels
            .iter()
            .filter(|(_, o)| matches!(o, ChannelOutcome::Failed { .. }))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Sends the pass artifacts to every enabled channel, each on its own.
pub struct PublishFanout<'a> {
    channels: Vec<PushChannel>,
    executor: &'a Executor,
}

impl<'a> PublishFanout<'a> {
    pub fn new(channels: Vec<PushChannel>, executor: &'a Executor) -> Self {
        Self { channels, executor }
    }

    pub fn from_config(channels: &[ChannelConfig], executor: &'a Executor) -> Self {
        Self::new(channels.iter().map(PushChannel::from).collect(), executor)
    }

    /// Returns `None` when no file in the push list exists, nothing is sent then.
    pub fn publish(&self, push_files: &[PathBuf], fields: &AnnotationFields) -> Option<FanoutReport> {
        let files: Vec<PathBuf> = push_files.iter().filter(|p| p.exists()).cloned().collect();
        if files.is_empty() {
            log::info!("No images to publish, skipping all channels");
            return None;
        }

        let mut report = FanoutReport::default();
        for channel in &self.channels {
            let outcome = if !channel.enabled {
                log::debug!("Channel {} disabled", channel.name);
                ChannelOutcome::Disabled
            } else {
                let annotation = fields.format(channel.style);
                match self.dispatch(channel, &annotation, &files) {
                    Ok(calls) => {
                        log::info!("Published {} file(s) to {}", files.len(), channel.name);
                        ChannelOutcome::Delivered { calls }
                    }
                    Err(e) => {
                        log::error!("Publishing to {} failed: {}", channel.name, e);
                        ChannelOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            };
            report.channels.push((channel.name.clone(), outcome));
        }
        Some(report)
    }

    fn dispatch(
        &self,
        channel: &PushChannel,
        annotation: &str,
        files: &[PathBuf],
    ) -> Result<usize, PublishError> {
        match channel.dispatch {
            DispatchMode::Batch => {
                self.call(channel, &channel.command(annotation, files))?;
                Ok(1)
            }
            DispatchMode::PerFile => {
                let mut failures = Vec::new();
                for (i, file) in files.iter().enumerate() {
                    if i > 0 && !channel.delay.is_zero() {
                        std::thread::sleep(channel.delay);
                    }
                    let cmd = channel.command(annotation, std::slice::from_ref(file));
                    if let Err(e) = self.call(channel, &cmd) {
                        log::warn!("{}: {}", channel.name, e);
                        failures.push(file.display().to_string());
                    }
                }
                if failures.is_empty() {
                    Ok(files.len())
                } else {
                    Err(PublishError::PartialDelivery {
                        channel: channel.name.clone(),
                        failed: failures,
                    })
                }
            }
        }
    }

    fn call(&self, channel: &PushChannel, cmd: &ExternalCommand) -> Result<(), PublishError> {
        let output = self.executor.run_unchecked(cmd)?;
        if !output.success() {
            return Err(PublishError::Rejected {
                channel: channel.name.clone(),
                code: output.exit_code,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::fake::FakeRunner;
    use crate::executor::OnFail;
    use crate::pass::{sample_pass, Gain};
    use std::fs;

    fn channel(name: &str, dispatch: DispatchMode) -> PushChannel {
        PushChannel {
            name: name.to_string(),
            enabled: true,
            style: AnnotationStyle::Plain,
            dispatch,
            delay: Duration::ZERO,
            command: format!("{}-push", name),
            target: None,
        }
    }

    fn fields() -> AnnotationFields {
        AnnotationFields::new(&sample_pass("base"), None, Some(5.0), Gain::Automatic)
    }

    fn images(dir: &std::path::Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                fs::write(&path, b"jpeg").unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_no_images_means_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new();
        let executor = runner.executor(OnFail::Continue);
        let fanout = PublishFanout::new(vec![channel("discord", DispatchMode::Batch)], &executor);

        let missing = vec![dir.path().join("base-spread_321.jpg")];
        assert!(fanout.publish(&missing, &fields()).is_none());
        assert!(fanout.publish(&[], &fields()).is_none());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_disabled_channels_make_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let files = images(dir.path(), &["base-spread_321.jpg"]);
        let runner = FakeRunner::new();
        let executor = runner.executor(OnFail::Continue);
        let mut a = channel("discord", DispatchMode::Batch);
        a.enabled = false;
        let mut b = channel("email", DispatchMode::PerFile);
        b.enabled = false;

        let report = PublishFanout::new(vec![a, b], &executor)
            .publish(&files, &fields())
            .unwrap();
        assert!(runner.calls().is_empty());
        assert_eq!(report.attempted(), 0);
    }

    #[test]
    fn test_failing_channel_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let files = images(dir.path(), &["base-spread_321.jpg", "base-spread_IR.jpg"]);
        let runner = FakeRunner::new();
        runner.missing("broken-push");
        let executor = runner.executor(OnFail::Abort);
        let fanout = PublishFanout::new(
            vec![
                channel("broken", DispatchMode::Batch),
                channel("matrix", DispatchMode::Batch),
            ],
            &executor,
        );

        let report = fanout.publish(&files, &fields()).unwrap();
        assert_eq!(report.failed(), vec!["broken"]);

        let matrix = runner.calls_to("matrix-push");
        assert_eq!(matrix.len(), 1);
        // annotation, then every file in push order
        assert_eq!(matrix[0].args.len(), 3);
        assert!(matrix[0].args[1].ends_with("base-spread_321.jpg"));
        assert_eq!(
            report.channels[1].1,
            ChannelOutcome::Delivered { calls: 1 }
        );
    }

    #[test]
    fn test_per_file_dispatch_calls_once_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = images(dir.path(), &["a.jpg", "b.jpg", "c.jpg"]);
        let runner = FakeRunner::new();
        let executor = runner.executor(OnFail::Continue);
        let mut email = channel("email", DispatchMode::PerFile);
        email.target = Some("ops@example.org".into());
        email.style = AnnotationStyle::Html;

        let report = PublishFanout::new(vec![email], &executor)
            .publish(&files, &fields())
            .unwrap();

        let calls = runner.calls_to("email-push");
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].args[0], "ops@example.org");
        assert!(calls[0].args[1].contains("<b>Gain:</b> Automatic"));
        assert!(calls[2].args[2].ends_with("c.jpg"));
        assert_eq!(report.channels[0].1, ChannelOutcome::Delivered { calls: 3 });
    }

    #[test]
    fn test_non_zero_exit_fails_only_that_channel() {
        let dir = tempfile::tempdir().unwrap();
        let files = images(dir.path(), &["a.jpg"]);
        let runner = FakeRunner::new();
        runner.exit_code("slack-push", 2);
        let executor = runner.executor(OnFail::Continue);

        let report = PublishFanout::new(
            vec![
                channel("slack", DispatchMode::PerFile),
                channel("discord", DispatchMode::PerFile),
            ],
            &executor,
        )
        .publish(&files, &fields())
        .unwrap();

        assert_eq!(report.failed(), vec!["slack"]);
        assert_eq!(runner.calls_to("discord-push").len(), 1);
    }
}
