use std::{
    io,
    process::{Command as StdCommand, Stdio},
};

use crate::executor::{CommandOutput, CommandRunner, ExternalCommand};

/// Spawns the command and blocks until it exits, capturing its output.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &ExternalCommand) -> io::Result<CommandOutput> {
        let mut command = StdCommand::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &cmd.cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn()?;
        log::debug!("{} spawned (PID: {})", cmd.program, child.id());

        let output = child.wait_with_output()?;
        let exit_code = output.status.code().unwrap_or(-1);

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout_and_exit_code() {
        let output = SystemRunner
            .run(&ExternalCommand::shell("echo 12.5; exit 2"))
            .unwrap();
        assert_eq!(output.stdout.trim(), "12.5");
        assert_eq!(output.exit_code, 2);
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let result = SystemRunner.run(&ExternalCommand::new("/nonexistent/pass-o-mat-tool"));
        assert!(result.is_err());
    }
}
