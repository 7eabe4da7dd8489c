use std::process::Stdio;
use std::time::Duration;
use termpilot_core::{CommandError, CommandResult, ExecContext};
use tracing::{info, warn};

/// Time budget for programs forwarded to the host.
pub const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_OUTPUT: usize = 50_000;

/// Runs names that are not builtins as host programs, in the session's
/// working directory, with a bounded run time. Arguments are passed as-is:
/// there is no shell, so no pipes, globbing or redirection.
pub struct ShellFallback {
    timeout: Duration,
}

impl ShellFallback {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Exit status 0 yields trimmed stdout; anything else is an error
    /// carrying the exit code and stderr. The child is killed on timeout.
    pub async fn run(&self, program: &str, args: &[String], ctx: &ExecContext) -> CommandResult {
        info!(program = %program, args = ?args, cwd = %ctx.cwd.display(), "Running host program");

        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .current_dir(&ctx.cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if output.status.success() {
                    Ok(truncate_output(stdout.trim(), MAX_OUTPUT))
                } else {
                    let detail = if stderr.trim().is_empty() {
                        stdout.trim()
                    } else {
                        stderr.trim()
                    };
                    Err(CommandError::Failed {
                        code: output.status.code().unwrap_or(-1),
                        stderr: truncate_output(detail, MAX_OUTPUT),
                    })
                }
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CommandError::CommandNotFound(program.to_string()))
            }
            Ok(Err(e)) => Err(CommandError::from_io(e, program)),
            Err(_) => {
                warn!(program = %program, timeout = self.timeout.as_secs(), "Host program timed out");
                Err(CommandError::TimedOut(self.timeout.as_secs()))
            }
        }
    }
}

impl Default for ShellFallback {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL_TIMEOUT)
    }
}

fn truncate_output(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated, {} total bytes]", &s[..end], s.len())
}
