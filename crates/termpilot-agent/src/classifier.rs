//! Deterministic input classification.
//!
//! Stages run in a fixed order and the first match wins; later stages rely on
//! earlier ones having rejected the input. Reordering them changes behavior.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

const TOGGLE_WORDS: &[&str] = &["chat", "conversation", "talk", "converse"];

const BARE_COMMANDS: &[&str] = &[
    "ls", "pwd", "ps", "cpu", "mem", "df", "date", "whoami", "uname", "clear", "exit", "history",
    "stats", "newterm", "sessions",
];

const SYSTEM_KEYWORDS: &[&str] = &[
    "cpu",
    "memory",
    "disk",
    "process",
    "system",
    "info",
    "usage",
    "performance",
    "status",
    "running",
    "active",
    "what time",
    "current time",
    "date",
    "who am i",
    "user",
    "files",
    "directory",
    "folder",
    "list",
    "show me",
    "what files",
    "what is my",
    "how much",
    "how many",
];

const FILE_KEYWORDS: &[&str] = &[
    "create", "make", "new", "file", "folder", "directory", "delete", "remove", "copy", "move",
    "rename", "edit", "open", "read", "write", "save", "find", "search",
];

const ACTION_WORDS: &[&str] = &[
    "create", "make", "show", "list", "find", "search", "move", "copy", "delete", "remove", "open",
    "read", "write", "save", "edit", "change", "update", "modify", "what", "how", "where", "when",
    "why", "which", "who",
];

const CHAT_KEYWORDS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "thanks",
    "thank you",
    "please",
    "help me",
    "can you",
    "could you",
    "would you",
    "what is",
    "how do",
    "why",
    "explain",
    "tell me",
    "show me",
    "i need",
    "i want",
    "i am",
    "my name is",
    "i am working on",
    "i have a problem",
    "i need help",
];

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern must compile")
}

static DIRECT_WITH_ARGS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(cd|mkdir|touch|rm|cp|mv|cat|edit|find|grep|echo|switch)\s+"));

static DIRECT_OPTIONAL_ARGS: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"^(ls|pwd|exit|help|clear|ps|cpu|mem|df|date|whoami|uname|history|stats|newterm|sessions)(\s|$)",
    )
});

const CREATION_NAME: &str = r#"(?:"([^"]+)"|'([^']+)'|([\w.\-]+))"#;

static SIMPLE_FOLDER: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)^(?:create|make|new)\s+(?:folder|directory)\s+(?:called\s+)?{CREATION_NAME}$"
    ))
});

static SIMPLE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)^(?:create|make|new)\s+file\s+(?:called\s+)?{CREATION_NAME}$"
    ))
});

/// Label of one input line. Produced per line, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    Empty,
    ConversationToggle,
    DirectCommand { command: String, args: Vec<String> },
    SimpleFolderCreation { name: String },
    SimpleFileCreation { name: String },
    FileOperation,
    SystemQuery,
    NaturalLanguage,
    Chat,
    Unknown,
}

impl Classification {
    pub fn kind(&self) -> &'static str {
        match self {
            Classification::Empty => "empty",
            Classification::ConversationToggle => "conversation_toggle",
            Classification::DirectCommand { .. } => "direct_command",
            Classification::SimpleFolderCreation { .. } => "simple_folder_creation",
            Classification::SimpleFileCreation { .. } => "simple_file_creation",
            Classification::FileOperation => "file_operation",
            Classification::SystemQuery => "system_query",
            Classification::NaturalLanguage => "natural_language",
            Classification::Chat => "chat",
            Classification::Unknown => "unknown",
        }
    }
}

/// Whether `text` (already lowercased) mentions `keyword`.
///
/// Phrases match as substrings; single words must match a whole word, so
/// `hi` does not fire on `this`.
pub(crate) fn mentions(text: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        text.contains(keyword)
    } else {
        text.split(|c: char| !c.is_alphanumeric() && c != '\'')
            .any(|word| word == keyword)
    }
}

pub(crate) fn mentions_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| mentions(text, k))
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

fn creation_name(re: &Regex, input: &str) -> Option<String> {
    let caps = re.captures(input)?;
    (1..=3)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InputClassifier;

impl InputClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, input: &str) -> Classification {
        let input = input.trim();
        if input.is_empty() {
            return Classification::Empty;
        }

        let lower = input.to_lowercase();
        if TOGGLE_WORDS.contains(&lower.as_str()) {
            return Classification::ConversationToggle;
        }

        let mut words = input.split_whitespace();
        let first = words.next().unwrap_or_default();
        let rest: Vec<String> = words.map(str::to_string).collect();

        if rest.is_empty() && BARE_COMMANDS.contains(&first) {
            return Classification::DirectCommand {
                command: first.to_string(),
                args: Vec::new(),
            };
        }
        if DIRECT_WITH_ARGS.is_match(input) || DIRECT_OPTIONAL_ARGS.is_match(input) {
            return Classification::DirectCommand {
                command: first.to_string(),
                args: rest,
            };
        }

        if let Some(name) = creation_name(&SIMPLE_FOLDER, input) {
            return Classification::SimpleFolderCreation { name };
        }
        if let Some(name) = creation_name(&SIMPLE_FILE, input) {
            return Classification::SimpleFileCreation { name };
        }

        if contains_any(&lower, SYSTEM_KEYWORDS) {
            return Classification::SystemQuery;
        }
        if contains_any(&lower, FILE_KEYWORDS) {
            return Classification::FileOperation;
        }
        if lower.split_whitespace().count() > 1 && contains_any(&lower, ACTION_WORDS) {
            return Classification::NaturalLanguage;
        }
        if mentions_any(&lower, CHAT_KEYWORDS) {
            return Classification::Chat;
        }
        Classification::Unknown
    }
}
