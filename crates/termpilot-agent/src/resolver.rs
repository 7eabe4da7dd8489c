//! Natural language to concrete commands.
//!
//! The model is asked for JSON. Replies that are not JSON are mined for
//! command-looking text, and when the model cannot be reached at all a local
//! pattern table answers instead. Transport failures never reach the user.

use crate::backends::CompletionBackend;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};

pub const SYSTEM_PROMPT: &str = r#"You convert natural language requests into terminal commands.
Reply with JSON only, no explanation.

Available commands:
- pwd: print working directory
- ls [path]: list directory contents
- cd <directory>: change directory
- mkdir <directory>: create directory
- touch <file>: create empty file
- rm <file/folder>: remove file or directory
- cp <source> <destination>: copy file or directory
- mv <source> <destination>: move file or directory
- cat <file>: show file contents
- edit <file>: edit file contents
- grep <pattern> <file>: search for a pattern in a file
- find <path> <name>: find files by name
- ps: running processes
- cpu: CPU usage
- mem: memory usage
- df: disk usage
- date: current date and time
- whoami: current user
- uname: system information
- echo <text>: print text
- clear: clear the terminal
- history: command history

Examples:
- "create a new folder called test" -> {"command": "mkdir test"}
- "create a new file called main.py" -> {"command": "touch main.py"}
- "move file1.txt into the test folder" -> {"command": "mv file1.txt test/"}
- "copy file1.txt to backup.txt" -> {"command": "cp file1.txt backup.txt"}
- "show me the current directory" -> {"command": "pwd"}
- "list all files in the current directory" -> {"command": "ls"}
- "show running processes" -> {"command": "ps"}
- "delete file test.txt" -> {"command": "rm test.txt"}
- "what is the CPU usage?" -> {"command": "cpu"}
- "show memory usage" -> {"command": "mem"}
- "find all Python files" -> {"command": "find . .py"}
- "search for 'hello' in main.py" -> {"command": "grep hello main.py"}
- "show me the contents of readme.txt" -> {"command": "cat readme.txt"}
- "what time is it?" -> {"command": "date"}
- "who am I?" -> {"command": "whoami"}
- "how much disk space do I have?" -> {"command": "df"}

When several commands are needed, return a list:
- "create a folder called test and move file1.txt into it" -> {"commands": ["mkdir test", "mv file1.txt test/"]}

Output format: JSON with either "command" (string) or "commands" (array of strings)."#;

/// Where a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Well-formed JSON from the model.
    Model,
    /// Mined from a non-JSON model reply.
    Extracted,
    /// Local pattern table, model unavailable.
    Fallback,
    /// Creation request answered without the model.
    Creation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Command lines to run in order.
    pub commands: Vec<String>,
    pub source: ResolutionSource,
}

impl Resolution {
    fn new(commands: Vec<String>, source: ResolutionSource) -> Self {
        Self { commands, source }
    }

    fn single(command: impl Into<String>, source: ResolutionSource) -> Self {
        Self::new(vec![command.into()], source)
    }
}

/// Turns free text into command lines. Never fails: the worst case is the
/// input text itself, which the executor will then reject or forward.
#[async_trait]
pub trait NlResolver: Send + Sync {
    async fn resolve(&self, text: &str) -> Resolution;
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CommandReply {
    command: Option<String>,
    commands: Option<Vec<String>>,
}

fn parse_json_reply(reply: &str) -> Option<Vec<String>> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    let parsed: CommandReply = serde_json::from_str(&reply[start..=end]).ok()?;
    let commands: Vec<String> = match (parsed.commands, parsed.command) {
        (Some(list), _) => list,
        (None, Some(one)) => vec![one],
        (None, None) => return None,
    };
    let commands: Vec<String> = commands
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    (!commands.is_empty()).then_some(commands)
}

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern must compile")
}

static EXTRACTORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        compile(r"`([^`]+)`"),
        compile(r#""([^"]+)""#),
        compile(r"(\w+\s+[^\n]+)"),
    ]
});

/// Command-looking spans of a free-text reply: backtick spans, else quoted
/// spans, else `word rest-of-line` lines, else the whole text.
pub fn extract_commands(reply: &str) -> Vec<String> {
    for re in EXTRACTORS.iter() {
        let found: Vec<String> = re
            .captures_iter(reply)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    vec![reply.trim().to_string()]
}

// ---------------------------------------------------------------------------
// Local fallback table
// ---------------------------------------------------------------------------

struct Rule {
    pattern: Regex,
    template: &'static str,
}

fn rules(table: &[(&str, &'static str)]) -> Vec<Rule> {
    table
        .iter()
        .map(|(pattern, template)| Rule {
            pattern: compile(&format!("(?i){pattern}")),
            template,
        })
        .collect()
}

const CREATION_TABLE: &[(&str, &str)] = &[
    (r"create.*folder.*called (\w[\w.\-]*)", "mkdir {}"),
    (r"make.*directory.*called (\w[\w.\-]*)", "mkdir {}"),
    (r"create.*directory.*called (\w[\w.\-]*)", "mkdir {}"),
    (r"new folder (\w[\w.\-]*)", "mkdir {}"),
    (r"create.*file.*called (\w[\w.\-]*)", "touch {}"),
    (r"make.*file.*called (\w[\w.\-]*)", "touch {}"),
    (r"new file (\w[\w.\-]*)", "touch {}"),
];

const GENERAL_TABLE: &[(&str, &str)] = &[
    (r"list.*files", "ls"),
    (r"list.*folders", "ls"),
    (r"show.*directory", "ls"),
    (r"what.*files.*do.*i.*have", "ls"),
    (r"what.*files.*have", "ls"),
    (r"what.*files.*are.*here", "ls"),
    (r"show.*me.*files", "ls"),
    (r"current.*directory", "pwd"),
    (r"where.*am.*i", "pwd"),
    (r"what.*directory.*am.*i.*using", "pwd"),
    (r"go to (\S+)", "cd {}"),
    (r"change.*to (\S+)", "cd {}"),
    (r"navigate.*to (\S+)", "cd {}"),
    (r"show.*processes", "ps"),
    (r"running.*processes", "ps"),
    (r"cpu.*usage", "cpu"),
    (r"memory.*usage", "mem"),
    (r"what.*is.*my.*memory.*usage", "mem"),
    (r"what.*is.*my.*cpu.*usage", "cpu"),
    (r"disk.*usage", "df"),
    (r"disk.*space", "df"),
    (r"clear.*screen", "clear"),
    (r"command.*history", "history"),
    (r"move.*file (\S+).* to (\S+)", "mv {} {}"),
    (r"copy.*file (\S+).* to (\S+)", "cp {} {}"),
    (r"delete.*file (\S+)", "rm {}"),
    (r"remove.*file (\S+)", "rm {}"),
    (r"delete.*folder (\S+)", "rm {}"),
    (r"remove.*folder (\S+)", "rm {}"),
    (r"display.*file (\S+)", "cat {}"),
    (r"show.*file (\S+)", "cat {}"),
    (r"show.*contents.*of (\S+)", "cat {}"),
    (r"edit.*file (\S+)", "edit {}"),
    (r"find.*file (\S+)", "find . {}"),
    (r"search.*for (\S+) in (\S+)", "grep {} {}"),
    (r"grep (\S+) in (\S+)", "grep {} {}"),
    (r"search.*for (\S+)", "find . {}"),
    (r"what.*time", "date"),
    (r"current.*time", "date"),
    (r"who.*am.*i", "whoami"),
    (r"current.*user", "whoami"),
    (r"what.*system", "uname"),
    (r"system.*info", "uname"),
    (r"how.*many.*files", "ls"),
    (r"count.*files", "ls"),
];

static CREATION_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| rules(CREATION_TABLE));
static GENERAL_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| rules(GENERAL_TABLE));

fn apply(rules: &[Rule], text: &str) -> Option<String> {
    rules.iter().find_map(|rule| {
        let caps = rule.pattern.captures(text)?;
        let mut command = rule.template.to_string();
        for group in caps.iter().skip(1).flatten() {
            let value = group
                .as_str()
                .trim_matches(|c: char| matches!(c, '?' | '!' | ',' | '\'' | '"'));
            command = command.replacen("{}", value, 1);
        }
        Some(command)
    })
}

/// The local table's answer for `text`; the lowercased text itself when no
/// rule applies.
pub fn fallback_command(text: &str) -> String {
    apply(&CREATION_RULES, text)
        .or_else(|| apply(&GENERAL_RULES, text))
        .unwrap_or_else(|| text.trim().to_lowercase())
}

const CREATION_WORDS: &[&str] = &["create", "make", "new", "build", "add"];
const CREATION_NOUNS: &[&str] = &["file", "folder", "directory", "document"];

pub fn is_creation_request(text: &str) -> bool {
    let lower = text.to_lowercase();
    CREATION_WORDS.iter().any(|w| lower.contains(w))
        && CREATION_NOUNS.iter().any(|n| lower.contains(n))
}

/// A named creation when the text carries a name, else a bare `mkdir` or
/// `touch`, which asks the user for the path.
pub fn creation_command(text: &str) -> String {
    if let Some(command) = apply(&CREATION_RULES, text) {
        return command;
    }
    let lower = text.to_lowercase();
    if lower.contains("folder") || lower.contains("directory") {
        "mkdir".to_string()
    } else {
        "touch".to_string()
    }
}

// ---------------------------------------------------------------------------
// ModelResolver
// ---------------------------------------------------------------------------

/// [`NlResolver`] backed by an optional [`CompletionBackend`].
pub struct ModelResolver {
    backend: Option<Arc<dyn CompletionBackend>>,
    timeout: Duration,
}

impl ModelResolver {
    pub fn new(backend: Option<Arc<dyn CompletionBackend>>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Resolver that only ever uses the local table.
    pub fn offline() -> Self {
        Self::new(None, Duration::from_secs(30))
    }

    async fn ask_model(&self, backend: &dyn CompletionBackend, text: &str) -> Option<Resolution> {
        let prompt = format!("Convert this to terminal command(s): {text}");
        let reply = match tokio::time::timeout(self.timeout, backend.complete(SYSTEM_PROMPT, &prompt))
            .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(backend = backend.name(), error = %e, "Completion failed, using local patterns");
                return None;
            }
            Err(_) => {
                warn!(backend = backend.name(), timeout = self.timeout.as_secs(), "Completion timed out, using local patterns");
                return None;
            }
        };

        debug!(backend = backend.name(), reply = %reply, "Model reply");
        if let Some(commands) = parse_json_reply(&reply) {
            return Some(Resolution::new(commands, ResolutionSource::Model));
        }
        if reply.trim().is_empty() {
            return None;
        }
        Some(Resolution::new(
            extract_commands(&reply),
            ResolutionSource::Extracted,
        ))
    }
}

#[async_trait]
impl NlResolver for ModelResolver {
    async fn resolve(&self, text: &str) -> Resolution {
        if is_creation_request(text) {
            return Resolution::single(creation_command(text), ResolutionSource::Creation);
        }

        if let Some(backend) = &self.backend {
            if let Some(resolution) = self.ask_model(backend.as_ref(), text).await {
                return resolution;
            }
        }

        Resolution::single(fallback_command(text), ResolutionSource::Fallback)
    }
}
