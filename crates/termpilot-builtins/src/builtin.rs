use async_trait::async_trait;
use termpilot_core::{CommandResult, ExecContext};

/// Metadata describing a builtin's name, arguments and side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinDescriptor {
    pub name: String,
    /// Argument synopsis, e.g. `cp <src> <dest>`.
    pub usage: String,
    pub summary: String,
    /// Whether the command changes the filesystem and takes resource locks.
    pub mutating: bool,
}

impl BuiltinDescriptor {
    pub fn new(name: &str, usage: &str, summary: &str) -> Self {
        Self {
            name: name.to_string(),
            usage: usage.to_string(),
            summary: summary.to_string(),
            mutating: false,
        }
    }

    pub fn mutating(mut self) -> Self {
        self.mutating = true;
        self
    }
}

/// A command the terminal implements natively.
#[async_trait]
pub trait Builtin: Send + Sync {
    fn descriptor(&self) -> &BuiltinDescriptor;

    /// Run with already-split arguments. `ctx.cwd` may be changed (by `cd`).
    async fn execute(&self, args: &[String], ctx: &mut ExecContext) -> CommandResult;
}
