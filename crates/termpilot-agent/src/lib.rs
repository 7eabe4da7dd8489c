//! Input understanding and orchestration for termpilot.
//!
//! Turns a raw input line into executed commands: classify it, resolve
//! natural language through a completion backend when needed, run the result
//! through the [`termpilot_builtins::CommandExecutor`], and keep session state
//! and history in step.
//!
//! # Main entry points
//!
//! - [`InputClassifier`]: Deterministic labelling of an input line.
//! - [`ModelResolver`]: Natural language to commands, with local fallback.
//! - [`UnifiedProcessor`]: The full classify, resolve, execute, record pipeline.
//! - [`MetaCommand`]: Session-level commands handled by the REPL itself.

/// Completion backends (OpenAI-compatible and Ollama).
pub mod backends;
/// Precedence-ordered input classification.
pub mod classifier;
/// Model provider configuration.
pub mod config;
/// REPL meta-commands.
pub mod meta;
/// The unified input processor.
pub mod processor;
/// Natural-language command resolution.
pub mod resolver;

pub use backends::{backend_for, CompletionBackend, OllamaBackend, OpenAiBackend};
pub use classifier::{Classification, InputClassifier};
pub use config::{LlmProvider, ModelConfig};
pub use meta::{render_history, MetaCommand};
pub use processor::{ConversationMode, OutcomeKind, ProcessOutcome, UnifiedProcessor};
pub use resolver::{ModelResolver, NlResolver, Resolution, ResolutionSource};
