use crate::registry::BuiltinRegistry;
use crate::shell::ShellFallback;
use std::sync::Arc;
use termpilot_core::picker::{LineEditor, PathPicker};
use termpilot_core::{CommandError, CommandResult, ExecContext};
use termpilot_security::LockManager;
use tracing::debug;

/// Dispatches a command name to its builtin, or to the host when no builtin
/// has that name.
pub struct CommandExecutor {
    registry: BuiltinRegistry,
    shell: ShellFallback,
}

impl CommandExecutor {
    pub fn new(registry: BuiltinRegistry, shell: ShellFallback) -> Self {
        Self { registry, shell }
    }

    /// Every standard builtin plus a host fallback with the default timeout.
    pub fn standard(
        locks: Arc<LockManager>,
        picker: Arc<dyn PathPicker>,
        editor: Arc<dyn LineEditor>,
    ) -> Self {
        let mut registry = BuiltinRegistry::new();
        crate::register_builtins(&mut registry, locks, picker, editor);
        Self::new(registry, ShellFallback::default())
    }

    pub fn with_shell(mut self, shell: ShellFallback) -> Self {
        self.shell = shell;
        self
    }

    pub async fn execute(&self, name: &str, args: &[String], ctx: &mut ExecContext) -> CommandResult {
        if name.is_empty() {
            return Err(CommandError::Usage("<command> [args...]".to_string()));
        }

        match self.registry.get(name) {
            Some(builtin) => {
                debug!(command = %name, session = %ctx.session_id, "Dispatching builtin");
                builtin.execute(args, ctx).await
            }
            None => self.shell.run(name, args, ctx).await,
        }
    }
}
