//! Command execution abstraction for testability.
//!
//! The iptables applier shells out to `iptables`, `ip6tables` and their
//! `-restore` counterparts. Going through this trait lets unit tests script
//! their exit codes and capture the restore input without running anything.

use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Command, Output, Stdio};

#[cfg(test)]
use mockall::automock;

/// Output from command execution
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Whether the command exited with code 0
    pub success: bool,
    /// The exit code, if the process was not killed by a signal
    pub code: Option<i32>,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Trait for command execution, allowing dependency injection for testing.
///
/// An `Err` means the program could not be run at all; a program that ran and
/// failed is reported through `CommandOutput::success`.
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    /// Run `cmd` with `args` and wait for it.
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput>;

    /// Run `cmd` with `args`, feeding `stdin` to it, and wait for it.
    fn execute_with_stdin(&self, cmd: &str, args: &[String], stdin: &[u8]) -> Result<CommandOutput>;
}

/// Real implementation of CommandExecutor that runs actual system commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealCommandExecutor;

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(cmd)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to execute {}", cmd))?;

        Ok(output.into())
    }

    fn execute_with_stdin(&self, cmd: &str, args: &[String], stdin: &[u8]) -> Result<CommandOutput> {
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute {}", cmd))?;

        // Dropped at the end of the block so the child sees EOF
        if let Some(mut pipe) = child.stdin.take() {
            if let Err(e) = pipe.write_all(stdin) {
                drop(pipe);
                // Reap the child so it does not linger as a zombie
                let _ = child.kill();
                let _ = child.wait();
                return Err(e).with_context(|| format!("Failed to write stdin of {}", cmd));
            }
        }

        let output = child.wait_with_output()?;
        Ok(output.into())
    }
}

/// Convert a slice of &str to the owned form the trait takes.
///
/// mockall cannot express the lifetimes of `&[&str]`, hence `&[String]`.
pub fn args_to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_strings() {
        let args = args_to_strings(&["-t", "nat", "-N", "IP-MASQ-AGENT"]);
        assert_eq!(args, vec!["-t", "nat", "-N", "IP-MASQ-AGENT"]);
        assert!(args_to_strings(&[]).is_empty());
    }

    #[test]
    fn test_command_output_default() {
        let output = CommandOutput::default();
        assert!(output.stdout.is_empty());
        assert!(!output.success);
        assert!(output.code.is_none());
    }

    #[test]
    fn test_real_command_executor_execute_echo() {
        let output = RealCommandExecutor
            .execute("echo", &args_to_strings(&["-n", "hello"]))
            .unwrap();
        assert!(output.success);
        assert_eq!(output.code, Some(0));
        assert_eq!(output.stdout, "hello");
    }

    #[test]
    fn test_real_command_executor_reports_failure() {
        let output = RealCommandExecutor
            .execute("ls", &args_to_strings(&["--invalid-flag"]))
            .unwrap();
        assert!(!output.success);
        assert!(!output.stderr.is_empty());
    }

    #[test]
    fn test_real_command_executor_missing_program() {
        let result = RealCommandExecutor.execute("/nonexistent/iptables", &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_real_command_executor_with_stdin() {
        let output = RealCommandExecutor
            .execute_with_stdin("cat", &[], b"*nat\nCOMMIT\n")
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "*nat\nCOMMIT\n");
    }

    #[test]
    fn test_real_command_executor_stdin_write_failure() {
        // `true` exits without reading, so the pipe breaks once its buffer fills
        let input = vec![b'x'; 4 * 1024 * 1024];
        let err = RealCommandExecutor
            .execute_with_stdin("true", &[], &input)
            .unwrap_err();
        assert!(err.to_string().contains("Failed to write stdin of true"));
    }

    #[test]
    fn test_mock_command_executor_with_stdin() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute_with_stdin()
            .withf(|cmd, args, stdin| {
                cmd == "iptables-restore" && args == ["--noflush".to_string()] && stdin == b"COMMIT\n"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(CommandOutput {
                    success: true,
                    code: Some(0),
                    ..Default::default()
                })
            });

        let output = mock
            .execute_with_stdin("iptables-restore", &args_to_strings(&["--noflush"]), b"COMMIT\n")
            .unwrap();
        assert!(output.success);
    }
}
