//! The classify, resolve, execute, record pipeline behind every input line.

use crate::classifier::{mentions, mentions_any, Classification, InputClassifier};
use crate::meta::render_history;
use crate::resolver::NlResolver;
use serde::Serialize;
use std::sync::Arc;
use termpilot_builtins::CommandExecutor;
use termpilot_core::{CommandError, ExecContext};
use termpilot_session::FileSessionStore;
use tracing::{debug, info, warn};

/// Number of history entries shown by `history`.
pub const HISTORY_WINDOW: usize = 20;

/// Names the terminal session handles itself. They reach the processor only
/// when it is driven without a REPL in front of it.
const SESSION_COMMANDS: &[&str] = &["exit", "help", "stats", "newterm", "sessions", "switch"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    #[default]
    Command,
    Conversation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Empty,
    ConversationToggle,
    DirectCommand,
    SimpleFolderCreation,
    SimpleFileCreation,
    FileOperation,
    SystemQuery,
    NaturalLanguage,
    Chat,
    Help,
    Suggestion,
    Unknown,
    Error,
}

/// What one processed line produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub kind: OutcomeKind,
    /// Primary output: command output, reply, or error text.
    pub text: String,
    /// Secondary hint shown under the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The command line(s) natural language was turned into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpreted: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ProcessOutcome {
    pub fn new(kind: OutcomeKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            message: None,
            interpreted: None,
            suggestions: Vec::new(),
        }
    }

    pub fn error(err: &CommandError) -> Self {
        Self::new(OutcomeKind::Error, err.to_string())
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_interpreted(mut self, interpreted: impl Into<String>) -> Self {
        self.interpreted = Some(interpreted.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == OutcomeKind::Error
    }
}

// ---------------------------------------------------------------------------
// Canned text
// ---------------------------------------------------------------------------

const HELP_KEYWORDS: &[&str] = &["help", "how", "what", "explain", "tell me"];
const SYSTEM_WORDS: &[&str] = &["cpu", "memory", "disk", "process", "system"];
const FILE_WORDS: &[&str] = &["create", "make", "file", "folder", "directory"];
const ACTION_VERBS: &[&str] = &["run", "execute", "do", "perform"];

const HELP_RESPONSES: &[(&str, &str)] = &[
    (
        "help",
        "I can help you with commands, file operations, system info, and more! Try: 'ls', 'create a folder', 'what is my CPU usage?', or just chat with me!",
    ),
    (
        "how",
        "I can show you how to do things! Try asking: 'how do I create a file?' or 'how do I check my system?'",
    ),
    (
        "what",
        "I can tell you about your system, files, and help with commands! Try: 'what files do I have?' or 'what is my memory usage?'",
    ),
    (
        "explain",
        "I can explain commands and concepts! Try: 'explain the ls command' or 'explain how to create folders'",
    ),
];

const GENERAL_HELP: &str =
    "I'm here to help! You can ask me about commands, file operations, system information, or just chat!";

fn help_response(lower: &str) -> &'static str {
    HELP_RESPONSES
        .iter()
        .find(|(keyword, _)| mentions(lower, keyword))
        .map(|(_, response)| *response)
        .unwrap_or(GENERAL_HELP)
}

fn chat_reply(lower: &str) -> &'static str {
    if mentions_any(lower, &["hello", "hi"]) {
        "Hello! I'm your AI terminal assistant. I can help you with commands, file operations, system information, or just chat! What would you like to do?"
    } else if lower.contains("thank") {
        "You're welcome! I'm here to help whenever you need me."
    } else if mentions_any(lower, &["bye", "goodbye"]) {
        "Goodbye! Feel free to come back anytime you need help!"
    } else if mentions(lower, "name") {
        "I'm your AI terminal assistant! I can help you with all sorts of tasks. What's your name?"
    } else {
        "I understand! I'm here to help you with terminal commands, file operations, system information, or just to chat. What would you like to do next?"
    }
}

const SUGGESTIONS: &[(&[&str], &str)] = &[
    (&["ls", "list"], "ls"),
    (&["cd", "change"], "cd <directory>"),
    (&["mkdir", "make"], "mkdir <directory>"),
    (&["touch", "create"], "touch <file>"),
    (&["rm", "delete"], "rm <file/folder>"),
    (&["cp", "copy"], "cp <source> <destination>"),
    (&["mv", "move"], "mv <source> <destination>"),
    (&["cat", "view"], "cat <file>"),
    (&["edit", "modify"], "edit <file>"),
    (&["find", "search"], "find <path> <pattern>"),
    (&["grep", "filter"], "grep <pattern> <file>"),
    (&["ps", "process"], "ps"),
    (&["cpu", "processor"], "cpu"),
    (&["mem", "memory"], "mem"),
    (&["df", "disk"], "df"),
    (&["date", "time"], "date"),
    (&["whoami", "user"], "whoami"),
    (&["uname", "system"], "uname"),
    (&["clear", "cls"], "clear"),
    (&["history", "commands"], "history"),
    (&["help", "?"], "help"),
];

/// Command template for a lone word that names a command loosely.
pub fn command_suggestion(input: &str) -> Option<&'static str> {
    let lower = input.trim().to_lowercase();
    SUGGESTIONS
        .iter()
        .find(|(words, _)| words.contains(&lower.as_str()))
        .map(|(_, suggestion)| *suggestion)
}

/// Recorded commands that start with or contain `input`, at most three.
pub fn history_suggestions(input: &str, recorded: &[String]) -> Vec<String> {
    let needle = input.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let (mut prefixed, mut containing): (Vec<&String>, Vec<&String>) = recorded
        .iter()
        .filter(|cmd| {
            let lower = cmd.to_lowercase();
            lower != needle && lower.contains(&needle)
        })
        .partition(|cmd| cmd.to_lowercase().starts_with(&needle));
    prefixed.append(&mut containing);
    prefixed.into_iter().take(3).cloned().collect()
}

fn shell_words(command: &str) -> String {
    if command.chars().any(char::is_whitespace) {
        format!("\"{command}\"")
    } else {
        command.to_string()
    }
}

// ---------------------------------------------------------------------------
// UnifiedProcessor
// ---------------------------------------------------------------------------

/// Routes each input line to the handler its classification selects and
/// keeps the session store in step with what ran.
pub struct UnifiedProcessor {
    classifier: InputClassifier,
    resolver: Arc<dyn NlResolver>,
    executor: Arc<CommandExecutor>,
    sessions: Arc<FileSessionStore>,
    mode: ConversationMode,
    sync_process_cwd: bool,
}

impl UnifiedProcessor {
    pub fn new(
        resolver: Arc<dyn NlResolver>,
        executor: Arc<CommandExecutor>,
        sessions: Arc<FileSessionStore>,
    ) -> Self {
        Self {
            classifier: InputClassifier::new(),
            resolver,
            executor,
            sessions,
            mode: ConversationMode::Command,
            sync_process_cwd: true,
        }
    }

    /// Whether a directory change also moves the process working directory.
    pub fn with_process_cwd_sync(mut self, enabled: bool) -> Self {
        self.sync_process_cwd = enabled;
        self
    }

    pub fn mode(&self) -> ConversationMode {
        self.mode
    }

    pub fn is_conversation_mode(&self) -> bool {
        self.mode == ConversationMode::Conversation
    }

    pub fn sessions(&self) -> &FileSessionStore {
        &self.sessions
    }

    /// Process one line. Never fails: errors come back as
    /// [`OutcomeKind::Error`] outcomes.
    ///
    /// Every line except an empty one and the conversation toggle is
    /// appended to the session's history once its outcome exists.
    pub async fn process(&mut self, input: &str, ctx: &mut ExecContext) -> ProcessOutcome {
        let input = input.trim();
        let classification = self.classifier.classify(input);
        debug!(kind = classification.kind(), session = %ctx.session_id, "Classified input");

        let outcome = match classification {
            Classification::Empty => return ProcessOutcome::new(OutcomeKind::Empty, ""),
            Classification::ConversationToggle => return self.toggle(),
            _ if self.is_conversation_mode() => self.converse(input, ctx).await,
            Classification::DirectCommand { command, args } => {
                self.direct(&command, &args, ctx).await
            }
            Classification::SimpleFolderCreation { name } => {
                self.create(OutcomeKind::SimpleFolderCreation, "mkdir", name, ctx)
                    .await
            }
            Classification::SimpleFileCreation { name } => {
                self.create(OutcomeKind::SimpleFileCreation, "touch", name, ctx)
                    .await
            }
            Classification::FileOperation => {
                self.resolve_and_run(OutcomeKind::FileOperation, input, ctx)
                    .await
            }
            Classification::SystemQuery => {
                self.resolve_and_run(OutcomeKind::SystemQuery, input, ctx)
                    .await
            }
            Classification::NaturalLanguage => {
                self.resolve_and_run(OutcomeKind::NaturalLanguage, input, ctx)
                    .await
            }
            Classification::Chat => self.chat(input, ctx).await,
            Classification::Unknown => self.unknown(input, ctx),
        };

        if let Err(e) = self.sessions.history().append(&ctx.session_id, input) {
            warn!(session = %ctx.session_id, error = %e, "Failed to record history");
        }
        if let Err(e) = self.sessions.touch(&ctx.session_id) {
            warn!(session = %ctx.session_id, error = %e, "Failed to refresh session access time");
        }
        outcome
    }

    fn toggle(&mut self) -> ProcessOutcome {
        let (mode, text, message) = match self.mode {
            ConversationMode::Command => (
                ConversationMode::Conversation,
                "Conversation mode enabled. I'm here to help!",
                "You can now have a natural conversation with me.",
            ),
            ConversationMode::Conversation => (
                ConversationMode::Command,
                "Conversation mode disabled.",
                "Back to command mode.",
            ),
        };
        self.mode = mode;
        info!(mode = ?mode, "Conversation mode toggled");
        ProcessOutcome::new(OutcomeKind::ConversationToggle, text).with_message(message)
    }

    /// Run one command. A change of `ctx.cwd` is written through to the
    /// session store.
    async fn run(&self, name: &str, args: &[String], ctx: &mut ExecContext) -> Result<String, CommandError> {
        if name == "history" {
            let entries = self
                .sessions
                .history()
                .recent(&ctx.session_id, HISTORY_WINDOW);
            return Ok(render_history(&entries));
        }

        let before = ctx.cwd.clone();
        let result = self.executor.execute(name, args, ctx).await;
        if ctx.cwd != before {
            self.record_cwd(ctx);
        }
        result
    }

    fn record_cwd(&self, ctx: &ExecContext) {
        if let Err(e) = self
            .sessions
            .update_working_directory(&ctx.session_id, &ctx.cwd)
        {
            warn!(session = %ctx.session_id, error = %e, "Failed to record working directory");
        }
        if self.sync_process_cwd {
            if let Err(e) = std::env::set_current_dir(&ctx.cwd) {
                warn!(dir = %ctx.cwd.display(), error = %e, "Failed to change process directory");
            }
        }
    }

    async fn direct(&self, command: &str, args: &[String], ctx: &mut ExecContext) -> ProcessOutcome {
        if SESSION_COMMANDS.contains(&command) {
            return ProcessOutcome::new(
                OutcomeKind::Help,
                format!("'{command}' is a session command; enter it at the terminal prompt"),
            );
        }

        let line = std::iter::once(command)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        match self.run(command, args, ctx).await {
            Ok(output) => ProcessOutcome::new(OutcomeKind::DirectCommand, output)
                .with_message(format!("Executed: {line}")),
            Err(e) => ProcessOutcome::error(&e),
        }
    }

    async fn create(
        &self,
        kind: OutcomeKind,
        command: &str,
        name: String,
        ctx: &mut ExecContext,
    ) -> ProcessOutcome {
        let interpreted = format!("{command} {}", shell_words(&name));
        match self.run(command, &[name], ctx).await {
            Ok(output) => ProcessOutcome::new(kind, output).with_interpreted(interpreted),
            Err(e) => ProcessOutcome::error(&e).with_interpreted(interpreted),
        }
    }

    /// Resolve `input` to command lines and run them in order, stopping at
    /// the first failure.
    async fn resolve_and_run(&self, kind: OutcomeKind, input: &str, ctx: &mut ExecContext) -> ProcessOutcome {
        let resolution = self.resolver.resolve(input).await;
        let interpreted = resolution.commands.join(" && ");
        info!(input = %input, resolved = %interpreted, source = ?resolution.source, "Resolved natural language");

        let mut outputs = Vec::new();
        for line in &resolution.commands {
            let mut parts = line.split_whitespace().map(str::to_string);
            let name = parts.next().unwrap_or_default();
            let args: Vec<String> = parts.collect();
            match self.run(&name, &args, ctx).await {
                Ok(output) if output.is_empty() => {}
                Ok(output) => outputs.push(output),
                Err(e) => {
                    let mut outcome = ProcessOutcome::error(&e).with_interpreted(interpreted);
                    if !outputs.is_empty() {
                        outcome = outcome.with_message(outputs.join("\n"));
                    }
                    return outcome;
                }
            }
        }

        ProcessOutcome::new(kind, outputs.join("\n"))
            .with_message(format!("{input} → {interpreted}"))
            .with_interpreted(interpreted)
    }

    async fn converse(&self, input: &str, ctx: &mut ExecContext) -> ProcessOutcome {
        let lower = input.to_lowercase();
        if mentions_any(&lower, ACTION_VERBS) {
            return self
                .resolve_and_run(OutcomeKind::NaturalLanguage, input, ctx)
                .await;
        }
        self.chat(input, ctx).await
    }

    async fn chat(&self, input: &str, ctx: &mut ExecContext) -> ProcessOutcome {
        let lower = input.to_lowercase();
        if mentions_any(&lower, HELP_KEYWORDS) {
            return ProcessOutcome::new(OutcomeKind::Help, help_response(&lower));
        }
        if SYSTEM_WORDS.iter().any(|w| lower.contains(w)) {
            return self
                .resolve_and_run(OutcomeKind::SystemQuery, input, ctx)
                .await;
        }
        if FILE_WORDS.iter().any(|w| lower.contains(w)) {
            return self
                .resolve_and_run(OutcomeKind::FileOperation, input, ctx)
                .await;
        }
        ProcessOutcome::new(OutcomeKind::Chat, chat_reply(&lower))
    }

    fn unknown(&self, input: &str, ctx: &ExecContext) -> ProcessOutcome {
        let path = ctx.resolve(input);
        if path.is_dir() {
            return ProcessOutcome::new(
                OutcomeKind::Suggestion,
                format!("'{input}' is a directory. Did you want to navigate to it?"),
            )
            .with_message(format!("Try 'cd {input}' to navigate to this directory"))
            .with_suggestions(vec![format!("cd {input}")]);
        }
        if path.exists() {
            return ProcessOutcome::new(
                OutcomeKind::Suggestion,
                format!("'{input}' is a file. What would you like to do with it?"),
            )
            .with_message(format!(
                "Try 'cat {input}' to view it, or 'edit {input}' to edit it"
            ))
            .with_suggestions(vec![format!("cat {input}"), format!("edit {input}")]);
        }
        if let Some(suggestion) = command_suggestion(input) {
            return ProcessOutcome::new(
                OutcomeKind::Suggestion,
                format!("I'm not sure how to handle: '{input}'"),
            )
            .with_message("Did you mean one of these commands?")
            .with_suggestions(vec![suggestion.to_string()]);
        }
        let recorded = history_suggestions(input, &self.sessions.history().all_commands());
        if !recorded.is_empty() {
            return ProcessOutcome::new(
                OutcomeKind::Suggestion,
                format!("I'm not sure how to handle: '{input}'"),
            )
            .with_message("You have run similar commands before")
            .with_suggestions(recorded);
        }
        ProcessOutcome::new(
            OutcomeKind::Unknown,
            format!("I'm not sure how to handle: '{input}'"),
        )
        .with_message("Try rephrasing or type 'help' for available commands")
    }
}
