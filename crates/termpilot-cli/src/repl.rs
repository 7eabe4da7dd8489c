//! The interactive loop: prompt, read, dispatch meta-commands or hand the
//! line to the processor, print the outcome.

use crate::config::TermpilotConfig;
use crate::help;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use termpilot_agent::{
    backend_for, render_history, MetaCommand, ModelResolver, OutcomeKind, ProcessOutcome,
    UnifiedProcessor,
};
use termpilot_builtins::{CommandExecutor, ShellFallback, StdinLineEditor, StdinPathPicker};
use termpilot_core::{ExecContext, TermResult};
use termpilot_security::{LockManager, SanitizeResult, Sanitizer};
use termpilot_session::{FileSessionStore, SessionStats};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const HISTORY_WINDOW: usize = termpilot_agent::processor::HISTORY_WINDOW;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Repl {
    processor: UnifiedProcessor,
    sessions: Arc<FileSessionStore>,
    sanitizer: Sanitizer,
    ctx: ExecContext,
    process_id: u32,
}

impl Repl {
    /// Wire the terminal-backed collaborators, the configured model and the
    /// shared stores for this process.
    pub fn from_config(config: &TermpilotConfig) -> anyhow::Result<Self> {
        let sessions = Arc::new(FileSessionStore::new(&config.data_dir)?);
        if config.sessions.cleanup_on_start {
            match sessions.cleanup_expired(config.sessions.max_age_days) {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Removed expired sessions at startup"),
                Err(e) => warn!(error = %e, "Session cleanup failed"),
            }
        }

        let locks = Arc::new(
            LockManager::in_data_dir(&config.data_dir)
                .with_expiry(config.lock_expiry())
                .with_policy(config.locks.persist_policy),
        );
        let executor = Arc::new(
            CommandExecutor::standard(
                locks,
                Arc::new(StdinPathPicker::default_timeout()),
                Arc::new(StdinLineEditor::default_timeout()),
            )
            .with_shell(ShellFallback::new(config.shell_timeout())),
        );

        let backend = backend_for(&config.model);
        match &backend {
            Some(b) => info!(backend = b.name(), model = %config.model.model_id, "Model backend configured"),
            None => info!("Model disabled, using local patterns"),
        }
        let resolver = Arc::new(ModelResolver::new(backend, config.model.timeout()));

        let processor = UnifiedProcessor::new(resolver, executor, sessions.clone());
        Self::new(
            processor,
            sessions,
            Sanitizer::new(config.input.max_length),
            std::process::id(),
        )
    }

    /// Bind `process_id` to its session and start in the session's directory.
    pub fn new(
        processor: UnifiedProcessor,
        sessions: Arc<FileSessionStore>,
        sanitizer: Sanitizer,
        process_id: u32,
    ) -> anyhow::Result<Self> {
        let id = sessions.get_current(process_id)?;
        let cwd = session_cwd(&sessions, &id)?;
        Ok(Self {
            processor,
            sessions,
            sanitizer,
            ctx: ExecContext::new(id, cwd),
            process_id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.ctx.session_id
    }

    pub fn banner(&self) -> String {
        let commands = self
            .sessions
            .get_details(&self.ctx.session_id)
            .ok()
            .flatten()
            .map_or(0, |d| d.command_count);
        format!(
            "termpilot: multi-session terminal\n\
             • Type anything: commands, natural language, or chat\n\
             • Examples: 'ls', 'create a folder', 'hello', 'what is my CPU usage?'\n\
             Session: {} | Commands: {} | Dir: {}",
            self.ctx.session_id,
            commands,
            self.ctx.cwd.display()
        )
    }

    pub fn prompt(&self) -> String {
        let mode = if self.processor.is_conversation_mode() {
            "💬"
        } else {
            "⚡"
        };
        format!("[{}] {mode} ", self.ctx.session_id)
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        println!("{}\n", self.banner());
        let mut input = StdinLines::default();

        loop {
            print!("{}", self.prompt());
            io::stdout().flush()?;

            match input.next().await {
                Input::Interrupted => println!("\nUse 'exit' to quit"),
                Input::Eof => {
                    println!("\nGoodbye!");
                    self.shutdown();
                    return Ok(());
                }
                Input::Line(line) => {
                    let flow = tokio::select! {
                        flow = self.handle_line(&line) => flow,
                        _ = tokio::signal::ctrl_c() => {
                            println!("\nCommand interrupted");
                            Flow::Continue
                        }
                    };
                    if flow == Flow::Exit {
                        self.shutdown();
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handle one raw input line and print what it produced.
    pub async fn handle_line(&mut self, raw: &str) -> Flow {
        let line = match self.sanitizer.sanitize(raw) {
            SanitizeResult::Rejected(reason) => {
                eprintln!("{reason}");
                return Flow::Continue;
            }
            SanitizeResult::Clean(line) | SanitizeResult::Cleaned(line) => line,
        };
        if line.is_empty() {
            return Flow::Continue;
        }

        if let Some(meta) = MetaCommand::parse(&line) {
            let (flow, text) = self.handle_meta(meta);
            println!("{text}");
            return flow;
        }

        let outcome = self.processor.process(&line, &mut self.ctx).await;
        let rendered = render_outcome(&outcome);
        if !rendered.is_empty() {
            println!("{rendered}");
        }
        Flow::Continue
    }

    pub fn handle_meta(&mut self, meta: MetaCommand) -> (Flow, String) {
        let text = match meta {
            MetaCommand::Exit => return (Flow::Exit, "Goodbye! 👋".to_string()),
            MetaCommand::NewSession => self
                .sessions
                .create_new()
                .and_then(|id| {
                    self.enter(id.clone())?;
                    Ok(format!("Created new session: {id}"))
                })
                .unwrap_or_else(|e| format!("Error: {e}")),
            MetaCommand::Sessions => session_table(&self.sessions, Some(&self.ctx.session_id))
                .unwrap_or_else(|e| format!("Error: {e}")),
            MetaCommand::Switch(id) => self.switch(&id),
            MetaCommand::History => {
                let entries = self
                    .sessions
                    .history()
                    .recent(&self.ctx.session_id, HISTORY_WINDOW);
                format!(
                    "Command history for {}:\n{}",
                    self.ctx.session_id,
                    render_history(&entries)
                )
            }
            MetaCommand::Stats => self
                .sessions
                .stats()
                .map(|s| render_stats(&s, &self.sessions.history().command_stats()))
                .unwrap_or_else(|e| format!("Error: {e}")),
            MetaCommand::Help(None) => help::general(),
            MetaCommand::Help(Some(topic)) => help::command(&topic).unwrap_or_else(|| {
                format!("Command '{topic}' not found. Type 'help' to see all available commands.")
            }),
        };
        (Flow::Continue, text)
    }

    fn switch(&mut self, id: &str) -> String {
        if let Err(e) = FileSessionStore::validate_id(id) {
            return e.to_string();
        }
        match self.sessions.switch(id) {
            Ok(true) => match self.enter(id.to_string()) {
                Ok(()) => format!("Switched to session: {id}"),
                Err(e) => format!("Error: {e}"),
            },
            Ok(false) => format!("Session '{id}' not found"),
            Err(e) => format!("Error: {e}"),
        }
    }

    fn enter(&mut self, id: String) -> TermResult<()> {
        let cwd = session_cwd(&self.sessions, &id)?;
        self.ctx = ExecContext::new(id, cwd);
        Ok(())
    }

    fn shutdown(&self) {
        self.sessions.cleanup_process_binding(self.process_id);
        info!(session = %self.session_id(), pid = self.process_id, "Terminal closed");
    }
}

fn session_cwd(sessions: &FileSessionStore, id: &str) -> TermResult<PathBuf> {
    match sessions.get_details(id)? {
        Some(details) => Ok(details.working_directory),
        None => Ok(std::env::current_dir()?),
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render_outcome(outcome: &ProcessOutcome) -> String {
    let mut lines: Vec<String> = Vec::new();
    let interpreted = outcome.interpreted.as_ref().map(|i| format!("→ {i}"));

    match outcome.kind {
        OutcomeKind::Empty => {}
        OutcomeKind::Error => {
            lines.extend(interpreted);
            lines.extend(outcome.message.clone());
            lines.push(format!("Error: {}", outcome.text));
        }
        OutcomeKind::ConversationToggle | OutcomeKind::Suggestion | OutcomeKind::Unknown => {
            lines.push(outcome.text.clone());
            lines.extend(outcome.message.clone());
            lines.extend(outcome.suggestions.iter().map(|s| format!("  • {s}")));
        }
        OutcomeKind::DirectCommand | OutcomeKind::Chat | OutcomeKind::Help => {
            lines.push(outcome.text.clone());
        }
        OutcomeKind::SimpleFolderCreation
        | OutcomeKind::SimpleFileCreation
        | OutcomeKind::FileOperation
        | OutcomeKind::SystemQuery
        | OutcomeKind::NaturalLanguage => {
            lines.extend(interpreted);
            lines.push(outcome.text.clone());
        }
    }

    lines.retain(|l| !l.is_empty());
    lines.join("\n")
}

/// Every session with its command count and directory; `current` is marked.
pub fn session_table(sessions: &FileSessionStore, current: Option<&str>) -> TermResult<String> {
    let ids = sessions.list()?;
    if ids.is_empty() {
        return Ok("No sessions found".to_string());
    }

    let width = ids.iter().map(String::len).max().unwrap_or(0).max(10);
    let mut out = format!("{:<width$}  {:>8}  {:<9}  Working Directory", "Session ID", "Commands", "Status");
    for id in &ids {
        let Some(details) = sessions.get_details(id)? else {
            continue;
        };
        let status = if current == Some(id.as_str()) {
            "current"
        } else {
            "available"
        };
        let dir = if details.working_directory_valid {
            details.working_directory.display().to_string()
        } else {
            format!("{} (missing)", details.working_directory.display())
        };
        out.push_str(&format!(
            "\n{id:<width$}  {:>8}  {status:<9}  {dir}",
            details.command_count
        ));
    }
    Ok(out)
}

/// Session totals, followed by the five base commands with the most
/// distinct invocations across every session.
pub fn render_stats(stats: &SessionStats, commands: &BTreeMap<String, usize>) -> String {
    let mut text = format!(
        "Sessions: {} ({} active in the last hour)\nCommands recorded: {}\nOldest session: {}\nNewest session: {}",
        stats.total,
        stats.active,
        stats.total_commands,
        stats.oldest.as_deref().unwrap_or("-"),
        stats.newest.as_deref().unwrap_or("-"),
    );

    let mut ranked: Vec<(&String, &usize)> = commands.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    if !ranked.is_empty() {
        let top: Vec<String> = ranked
            .iter()
            .take(5)
            .map(|(name, count)| format!("{name} ({count})"))
            .collect();
        text.push_str("\nMost used: ");
        text.push_str(&top.join(", "));
    }
    text
}

// ---------------------------------------------------------------------------
// Stdin
// ---------------------------------------------------------------------------

enum Input {
    Line(String),
    Eof,
    Interrupted,
}

/// Line reader that survives Ctrl-C: an interrupted read stays pending and
/// is resumed by the next call, so at most one thread reads stdin.
#[derive(Default)]
struct StdinLines {
    pending: Option<JoinHandle<io::Result<Option<String>>>>,
}

impl StdinLines {
    async fn next(&mut self) -> Input {
        let handle = self
            .pending
            .get_or_insert_with(|| tokio::task::spawn_blocking(read_stdin_line));

        let joined = tokio::select! {
            joined = handle => Some(joined),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(joined) = joined else {
            return Input::Interrupted;
        };
        self.pending = None;

        match joined {
            Ok(Ok(Some(line))) => Input::Line(line),
            Ok(Ok(None)) => Input::Eof,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read stdin");
                Input::Eof
            }
            Err(e) => {
                warn!(error = %e, "Stdin reader task failed");
                Input::Eof
            }
        }
    }
}

fn read_stdin_line() -> io::Result<Option<String>> {
    let mut line = String::new();
    match io::stdin().read_line(&mut line)? {
        0 => Ok(None),
        _ => Ok(Some(line)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use termpilot_builtins::{ScriptedEditor, ScriptedPicker};

    fn repl(data: &TempDir, pid: u32) -> Repl {
        let sessions = Arc::new(
            FileSessionStore::new(data.path())
                .unwrap()
                .without_process_chdir(),
        );
        let executor = Arc::new(CommandExecutor::standard(
            Arc::new(LockManager::in_data_dir(data.path())),
            Arc::new(ScriptedPicker::empty()),
            Arc::new(ScriptedEditor::aborting()),
        ));
        let processor = UnifiedProcessor::new(
            Arc::new(ModelResolver::offline()),
            executor,
            sessions.clone(),
        )
        .with_process_cwd_sync(false);
        Repl::new(processor, sessions, Sanitizer::default(), pid).unwrap()
    }

    #[test]
    fn test_process_bound_to_session() {
        let data = TempDir::new().unwrap();
        let r = repl(&data, 4242);
        assert!(r.session_id().starts_with("session_4242_"));
        assert!(r.prompt().starts_with(&format!("[{}] ⚡", r.session_id())));
        assert!(r.banner().contains("Commands: 0"));

        let again = repl(&data, 4242);
        assert_eq!(again.session_id(), r.session_id());
    }

    #[test]
    fn test_newterm_and_switch() {
        let data = TempDir::new().unwrap();
        let mut r = repl(&data, 1);
        let first = r.session_id().to_string();

        let (flow, text) = r.handle_meta(MetaCommand::NewSession);
        assert_eq!(flow, Flow::Continue);
        assert!(text.starts_with("Created new session: session_"), "{text}");
        assert_ne!(r.session_id(), first);

        let (_, text) = r.handle_meta(MetaCommand::Switch(first.clone()));
        assert_eq!(text, format!("Switched to session: {first}"));
        assert_eq!(r.session_id(), first);

        let (_, text) = r.handle_meta(MetaCommand::Switch("session_999".to_string()));
        assert_eq!(text, "Session 'session_999' not found");

        let (_, text) = r.handle_meta(MetaCommand::Switch("../etc".to_string()));
        assert!(text.contains("Invalid session id"));
    }

    #[tokio::test]
    async fn test_meta_lines_not_recorded() {
        let data = TempDir::new().unwrap();
        let mut r = repl(&data, 2);
        assert_eq!(r.handle_line("echo hi").await, Flow::Continue);
        assert_eq!(r.handle_line("history").await, Flow::Continue);
        assert_eq!(r.handle_line("stats").await, Flow::Continue);
        assert_eq!(r.handle_line("\x01\x02").await, Flow::Continue);

        let id = r.session_id().to_string();
        assert_eq!(r.sessions.history().load(&id), vec!["echo hi"]);

        let (_, text) = r.handle_meta(MetaCommand::History);
        assert_eq!(text, format!("Command history for {id}:\n 1: echo hi"));
    }

    #[tokio::test]
    async fn test_exit_removes_binding() {
        let data = TempDir::new().unwrap();
        let mut r = repl(&data, 3);
        let binding = data.path().join("process_3_session.txt");
        assert!(binding.exists());

        assert_eq!(r.handle_line("quit").await, Flow::Exit);
        r.shutdown();
        assert!(!binding.exists());
    }

    #[test]
    fn test_help_topics() {
        let data = TempDir::new().unwrap();
        let mut r = repl(&data, 5);
        let (_, text) = r.handle_meta(MetaCommand::Help(Some("cd".to_string())));
        assert!(text.starts_with("cd <dir>"));
        let (_, text) = r.handle_meta(MetaCommand::Help(Some("nope".to_string())));
        assert!(text.starts_with("Command 'nope' not found"));
    }

    #[test]
    fn test_session_table_marks_current() {
        let data = TempDir::new().unwrap();
        let store = FileSessionStore::new(data.path()).unwrap();
        assert_eq!(session_table(&store, None).unwrap(), "No sessions found");

        store.create_new().unwrap();
        store.create_new().unwrap();
        let table = session_table(&store, Some("session_2")).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("session_1") && lines[1].contains("available"));
        assert!(lines[2].starts_with("session_2") && lines[2].contains("current"));
    }

    #[test]
    fn test_render_outcomes() {
        let ok = ProcessOutcome::new(OutcomeKind::SystemQuery, "CPU Usage: 3.0%")
            .with_interpreted("cpu");
        assert_eq!(render_outcome(&ok), "→ cpu\nCPU Usage: 3.0%");

        let err = ProcessOutcome::new(OutcomeKind::Error, "nowhere does not exist")
            .with_interpreted("cd nowhere");
        assert_eq!(render_outcome(&err), "→ cd nowhere\nError: nowhere does not exist");

        let suggestion = ProcessOutcome::new(OutcomeKind::Suggestion, "'src' is a directory.")
            .with_suggestions(vec!["cd src".to_string()]);
        assert_eq!(render_outcome(&suggestion), "'src' is a directory.\n  • cd src");

        let direct = ProcessOutcome::new(OutcomeKind::DirectCommand, "")
            .with_message("Executed: cd src");
        assert_eq!(render_outcome(&direct), "");
    }

    #[test]
    fn test_render_stats() {
        let stats = SessionStats {
            total: 2,
            active: 1,
            total_commands: 7,
            oldest: Some("session_1".to_string()),
            newest: None,
        };
        let text = render_stats(&stats, &BTreeMap::new());
        assert!(text.starts_with("Sessions: 2 (1 active in the last hour)"));
        assert!(text.ends_with("Newest session: -"));

        let commands = BTreeMap::from([
            ("cd".to_string(), 3),
            ("ls".to_string(), 1),
            ("cat".to_string(), 3),
        ]);
        let text = render_stats(&stats, &commands);
        assert!(text.ends_with("Most used: cat (3), cd (3), ls (1)"));
    }
}
