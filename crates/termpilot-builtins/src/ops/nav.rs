use super::usage;
use crate::builtin::{Builtin, BuiltinDescriptor};
use async_trait::async_trait;
use termpilot_core::{CommandError, CommandResult, ExecContext};
use tracing::debug;

/// Prints the session's working directory.
pub struct PwdCommand {
    descriptor: BuiltinDescriptor,
}

impl PwdCommand {
    pub fn new() -> Self {
        Self {
            descriptor: BuiltinDescriptor::new("pwd", "pwd", "Show current directory"),
        }
    }
}

impl Default for PwdCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Builtin for PwdCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _args: &[String], ctx: &mut ExecContext) -> CommandResult {
        Ok(ctx.cwd.display().to_string())
    }
}

/// Lists entry names of a directory, sorted.
pub struct LsCommand {
    descriptor: BuiltinDescriptor,
}

impl LsCommand {
    pub fn new() -> Self {
        Self {
            descriptor: BuiltinDescriptor::new("ls", "ls [path]", "List directory contents"),
        }
    }
}

impl Default for LsCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Builtin for LsCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: &[String], ctx: &mut ExecContext) -> CommandResult {
        // Flags such as `-la` are accepted and ignored.
        let raw = args
            .iter()
            .map(String::as_str)
            .find(|a| !a.starts_with('-'))
            .unwrap_or(".");
        let path = ctx.resolve(raw);

        let mut entries = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| CommandError::from_io(e, raw))?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CommandError::from_io(e, raw))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names.join("\n"))
    }
}

/// Changes the session's working directory. Only `ctx.cwd` is updated;
/// persisting it and moving the process are left to the caller.
pub struct CdCommand {
    descriptor: BuiltinDescriptor,
}

impl CdCommand {
    pub fn new() -> Self {
        Self {
            descriptor: BuiltinDescriptor::new("cd", "cd <directory>", "Change directory"),
        }
    }
}

impl Default for CdCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Builtin for CdCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: &[String], ctx: &mut ExecContext) -> CommandResult {
        let raw = args.first().ok_or_else(|| usage(&self.descriptor))?;
        let target = tokio::fs::canonicalize(ctx.resolve(raw))
            .await
            .map_err(|e| CommandError::from_io(e, raw))?;

        if !target.is_dir() {
            return Err(CommandError::NotADirectory(raw.clone()));
        }

        debug!(session = %ctx.session_id, from = %ctx.cwd.display(), to = %target.display(), "cd");
        ctx.cwd = target;
        Ok(String::new())
    }
}
