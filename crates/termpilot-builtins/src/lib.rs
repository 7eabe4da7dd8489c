//! Built-in commands for termpilot.
//!
//! Every command the terminal understands natively is a [`Builtin`]
//! registered by name in a [`BuiltinRegistry`]. The [`CommandExecutor`]
//! dispatches to them and forwards unknown names to the host with a timeout.
//!
//! # Main entry points
//!
//! - [`register_builtins()`]: Register the standard set of built-in commands.
//! - [`CommandExecutor::standard()`]: Executor with every builtin and a 10 s host fallback.

/// Builtin trait and descriptor.
pub mod builtin;
/// Name-to-command dispatch.
pub mod executor;
/// Terminal-backed and scripted path pickers and line editors.
pub mod interactive;
/// Command implementations, grouped by concern.
pub mod ops;
/// Builtin registry.
pub mod registry;
/// Host program fallback.
pub mod shell;

pub use builtin::{Builtin, BuiltinDescriptor};
pub use executor::CommandExecutor;
pub use interactive::{ScriptedEditor, ScriptedPicker, StdinLineEditor, StdinPathPicker};
pub use registry::BuiltinRegistry;
pub use shell::{ShellFallback, DEFAULT_SHELL_TIMEOUT};

use ops::{edit, fs, nav, read, system, text};
use std::sync::Arc;
use termpilot_core::picker::{LineEditor, PathPicker};
use termpilot_security::LockManager;

/// Register every built-in command into `registry`.
///
/// Mutating commands share `locks`; `picker` and `editor` serve the
/// interactive fallbacks of `mkdir`/`touch`/`cp`/`mv` and `edit`.
pub fn register_builtins(
    registry: &mut BuiltinRegistry,
    locks: Arc<LockManager>,
    picker: Arc<dyn PathPicker>,
    editor: Arc<dyn LineEditor>,
) {
    registry.register(Arc::new(nav::PwdCommand::new()));
    registry.register(Arc::new(nav::LsCommand::new()));
    registry.register(Arc::new(nav::CdCommand::new()));

    registry.register(Arc::new(fs::MkdirCommand::new(locks.clone(), picker.clone())));
    registry.register(Arc::new(fs::TouchCommand::new(locks.clone(), picker.clone())));
    registry.register(Arc::new(fs::RmCommand::new(locks.clone())));
    registry.register(Arc::new(fs::CopyCommand::new(locks.clone(), picker.clone())));
    registry.register(Arc::new(fs::MoveCommand::new(locks.clone(), picker)));
    registry.register(Arc::new(edit::EditCommand::new(locks, editor)));

    registry.register(Arc::new(read::CatCommand::new()));
    registry.register(Arc::new(read::FindCommand::new()));
    registry.register(Arc::new(read::GrepCommand::new()));

    registry.register(Arc::new(text::ClearCommand::new()));
    registry.register(Arc::new(text::EchoCommand::new()));
    registry.register(Arc::new(text::DateCommand::new()));

    registry.register(Arc::new(system::WhoamiCommand::new()));
    registry.register(Arc::new(system::UnameCommand::new()));
    registry.register(Arc::new(system::DfCommand::new()));
    registry.register(Arc::new(system::PsCommand::new()));
    registry.register(Arc::new(system::CpuCommand::new()));
    registry.register(Arc::new(system::MemCommand::new()));
}
