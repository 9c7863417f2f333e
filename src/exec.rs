//! External command execution.
//!
//! "The command ran and failed" and "the command could not be run" are
//! different outcomes and are kept apart in [`CommandOutcome`].

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Upper bound for helper commands such as `update-ca-certificates` or `ps`.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The process ran to completion. `status` is `None` when it was killed
    /// by a signal.
    Completed {
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The process never started (executable missing, permission denied, ...).
    InvocationFailed { program: String, reason: String },
    /// The process did not finish within the allotted time.
    TimedOut { program: String, after: Duration },
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        matches!(self, CommandOutcome::Completed { status: Some(0), .. })
    }

    pub fn stdout(&self) -> &str {
        match self {
            CommandOutcome::Completed { stdout, .. } => stdout,
            _ => "",
        }
    }

    /// One-line description for logs.
    pub fn describe(&self) -> String {
        match self {
            CommandOutcome::Completed {
                status: Some(code),
                stderr,
                ..
            } => format!("exited with status {}: {}", code, stderr.trim()),
            CommandOutcome::Completed { status: None, .. } => {
                "terminated by signal".to_string()
            }
            CommandOutcome::InvocationFailed { program, reason } => {
                format!("could not run '{}': {}", program, reason)
            }
            CommandOutcome::TimedOut { program, after } => {
                format!("'{}' did not finish within {:?}", program, after)
            }
        }
    }
}

/// Run `argv[0]` with the remaining arguments, capturing both channels.
pub async fn run_command(argv: &[String], timeout: Duration) -> CommandOutcome {
    let Some((program, args)) = argv.split_first() else {
        return CommandOutcome::InvocationFailed {
            program: String::new(),
            reason: "empty command line".to_string(),
        };
    };

    tracing::debug!("Running {} {:?}", program, args);

    let result = tokio::time::timeout(
        timeout,
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) => CommandOutcome::Completed {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Ok(Err(e)) => CommandOutcome::InvocationFailed {
            program: program.clone(),
            reason: e.to_string(),
        },
        Err(_) => CommandOutcome::TimedOut {
            program: program.clone(),
            after: timeout,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let outcome = run_command(&argv(&["sh", "-c", "echo hello"]), Duration::from_secs(5)).await;
        assert!(outcome.success());
        assert_eq!(outcome.stdout().trim(), "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_completed() {
        let outcome = run_command(
            &argv(&["sh", "-c", "echo oops >&2; exit 3"]),
            Duration::from_secs(5),
        )
        .await;
        assert!(!outcome.success());
        match outcome {
            CommandOutcome::Completed { status, stderr, .. } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr.trim(), "oops");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_invocation_failure() {
        let outcome = run_command(
            &argv(&["/nonexistent/definitely-not-here"]),
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(outcome, CommandOutcome::InvocationFailed { .. }));
        assert!(outcome.describe().contains("could not run"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let outcome = run_command(&argv(&["sleep", "5"]), Duration::from_millis(100)).await;
        assert!(matches!(outcome, CommandOutcome::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_empty_argv() {
        let outcome = run_command(&[], Duration::from_secs(1)).await;
        assert!(matches!(outcome, CommandOutcome::InvocationFailed { .. }));
    }
}
