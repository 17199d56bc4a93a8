mod process;

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use process::SystemRunner;

/// What to do when an external tool exits with a non-zero status.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnFail {
    Abort,
    /// Best effort: log and carry on, missing output is noticed downstream.
    #[default]
    Continue,
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with code {code}")]
    Failed { command: String, code: i32 },
}

/// An external tool invocation. Arguments are passed verbatim, no shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Runs a pipeline through `sh -c`, for recorders that pipe into a resampler.
    pub fn shell(cmd: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(cmd)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// -1 when the process was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Blocking process execution. Swapped for a recording fake in tests.
pub trait CommandRunner {
    fn run(&self, cmd: &ExternalCommand) -> std::io::Result<CommandOutput>;
}

/// Runs external tools and applies the configured failure policy.
pub struct Executor {
    runner: Box<dyn CommandRunner>,
    on_fail: OnFail,
}

impl Executor {
    pub fn new(runner: Box<dyn CommandRunner>, on_fail: OnFail) -> Self {
        Self { runner, on_fail }
    }

    pub fn system(on_fail: OnFail) -> Self {
        Self::new(Box::new(SystemRunner), on_fail)
    }

    pub fn on_fail(&self) -> OnFail {
        self.on_fail
    }

    pub fn run(&self, cmd: &ExternalCommand) -> Result<CommandOutput, ExecError> {
        log::info!("Executing: {}", cmd);

        let output = self.runner.run(cmd).map_err(|source| ExecError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;

        log::debug!("`{}` exited with code {}", cmd.program, output.exit_code);

        if !output.success() {
            if !output.stderr.trim().is_empty() {
                log::debug!("{} stderr: {}", cmd.program, output.stderr.trim());
            }
            match self.on_fail {
                OnFail::Abort => {
                    log::error!("{} failed with exit code {}", cmd.program, output.exit_code);
                    return Err(ExecError::Failed {
                        command: cmd.to_string(),
                        code: output.exit_code,
                    });
                }
                OnFail::Continue => {
                    log::warn!(
                        "{} exited with code {}, continuing",
                        cmd.program,
                        output.exit_code
                    );
                }
            }
        }

        Ok(output)
    }

    /// Runs without applying the failure policy, for tools where a non-zero
    /// exit is an answer rather than a failure (`pkill` with no match).
    pub fn run_unchecked(&self, cmd: &ExternalCommand) -> Result<CommandOutput, ExecError> {
        log::info!("Executing: {}", cmd);
        self.runner.run(cmd).map_err(|source| ExecError::Spawn {
            program: cmd.program.clone(),
            source,
        })
    }

    /// Like `run`, but spawn failures are logged instead of returned.
    /// Used for best-effort steps whose absence of output is checked later.
    pub fn run_best_effort(&self, cmd: &ExternalCommand) -> Result<Option<CommandOutput>, ExecError> {
        match self.run(cmd) {
            Ok(output) => Ok(Some(output)),
            Err(e @ ExecError::Spawn { .. }) if self.on_fail == OnFail::Continue => {
                log::warn!("{}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Hook = Box<dyn Fn(&ExternalCommand) + Send>;

    /// Records every command and answers with canned exit codes.
    #[derive(Clone, Default)]
    pub struct FakeRunner {
        pub calls: Arc<Mutex<Vec<ExternalCommand>>>,
        exit_codes: Arc<Mutex<HashMap<String, i32>>>,
        missing: Arc<Mutex<Vec<String>>>,
        hooks: Arc<Mutex<Vec<(String, Hook)>>>,
        stdout: Arc<Mutex<HashMap<String, String>>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn exit_code(&self, program: &str, code: i32) -> &Self {
            self.exit_codes
                .lock()
                .unwrap()
                .insert(program.to_string(), code);
            self
        }

        /// Makes spawning `program` fail as if the binary did not exist.
        pub fn missing(&self, program: &str) -> &Self {
            self.missing.lock().unwrap().push(program.to_string());
            self
        }

        pub fn stdout(&self, program: &str, out: &str) -> &Self {
            self.stdout
                .lock()
                .unwrap()
                .insert(program.to_string(), out.to_string());
            self
        }

        /// Runs `hook` whenever `program` is invoked, to fake tool output files.
        pub fn on(&self, program: &str, hook: impl Fn(&ExternalCommand) + Send + 'static) -> &Self {
            self.hooks
                .lock()
                .unwrap()
                .push((program.to_string(), Box::new(hook)));
            self
        }

        pub fn calls(&self) -> Vec<ExternalCommand> {
            self.calls.lock().unwrap().clone()
        }

        pub fn calls_to(&self, program: &str) -> Vec<ExternalCommand> {
            self.calls()
                .into_iter()
                .filter(|c| c.program == program)
                .collect()
        }

        pub fn executor(&self, on_fail: OnFail) -> Executor {
            Executor::new(Box::new(self.clone()), on_fail)
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, cmd: &ExternalCommand) -> std::io::Result<CommandOutput> {
            self.calls.lock().unwrap().push(cmd.clone());

            if self.missing.lock().unwrap().contains(&cmd.program) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "No such file or directory",
                ));
            }

            for (program, hook) in self.hooks.lock().unwrap().iter() {
                if *program == cmd.program {
                    hook(cmd);
                }
            }

            Ok(CommandOutput {
                exit_code: self
                    .exit_codes
                    .lock()
                    .unwrap()
                    .get(&cmd.program)
                    .copied()
                    .unwrap_or(0),
                stdout: self
                    .stdout
                    .lock()
                    .unwrap()
                    .get(&cmd.program)
                    .cloned()
                    .unwrap_or_default(),
                stderr: String::new(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeRunner;
    use super::*;

    #[test]
    fn test_continue_policy_returns_failed_output() {
        let runner = FakeRunner::new();
        runner.exit_code("medet", 3);
        let executor = runner.executor(OnFail::Continue);

        let output = executor.run(&ExternalCommand::new("medet")).unwrap();
        assert_eq!(output.exit_code, 3);
    }

    #[test]
    fn test_abort_policy_turns_exit_code_into_error() {
        let runner = FakeRunner::new();
        runner.exit_code("medet", 3);
        let executor = runner.executor(OnFail::Abort);

        let err = executor
            .run(&ExternalCommand::new("medet").arg("in.qpsk"))
            .unwrap_err();
        assert!(matches!(err, ExecError::Failed { code: 3, .. }));
    }

    #[test]
    fn test_spawn_failure_is_swallowed_only_when_continuing() {
        let runner = FakeRunner::new();
        runner.missing("satdump");

        let lenient = runner.executor(OnFail::Continue);
        assert!(lenient
            .run_best_effort(&ExternalCommand::new("satdump"))
            .unwrap()
            .is_none());

        let strict = runner.executor(OnFail::Abort);
        assert!(strict
            .run_best_effort(&ExternalCommand::new("satdump"))
            .is_err());
    }

    #[test]
    fn test_display_quotes_arguments_with_spaces() {
        let cmd = ExternalCommand::new("convert")
            .arg("-annotate")
            .arg("METEOR-M2 3");
        assert_eq!(cmd.to_string(), "convert -annotate 'METEOR-M2 3'");
    }
}
