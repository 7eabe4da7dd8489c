//! Session-level commands the REPL answers itself, before any input reaches
//! the [`UnifiedProcessor`](crate::UnifiedProcessor). None of them is
//! recorded in history.

use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaCommand {
    /// `exit`, `quit` or `bye`.
    Exit,
    /// `newterm`: create a session and switch to it.
    NewSession,
    Sessions,
    Switch(String),
    History,
    Stats,
    /// `help`, optionally about one command.
    Help(Option<String>),
}

impl MetaCommand {
    pub fn parse(input: &str) -> Option<Self> {
        let mut words = input.split_whitespace();
        let first = words.next()?.to_lowercase();
        let arg = words.next().map(str::to_string);
        let extra = words.next().is_some();

        let meta = match (first.as_str(), arg) {
            ("exit" | "quit" | "bye", None) => MetaCommand::Exit,
            ("newterm", None) => MetaCommand::NewSession,
            ("sessions", None) => MetaCommand::Sessions,
            ("history", None) => MetaCommand::History,
            ("stats", None) => MetaCommand::Stats,
            ("switch", Some(id)) if !extra => MetaCommand::Switch(id),
            ("switch", None) => MetaCommand::Help(Some("switch".to_string())),
            ("help" | "?", topic) if !extra => MetaCommand::Help(topic),
            _ => return None,
        };
        Some(meta)
    }
}

/// Numbered listing of history entries, numbering from 1.
pub fn render_history(entries: &[String]) -> String {
    if entries.is_empty() {
        return "No command history".to_string();
    }
    let mut out = String::new();
    for (i, command) in entries.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:2}: {command}", i + 1);
    }
    out
}
