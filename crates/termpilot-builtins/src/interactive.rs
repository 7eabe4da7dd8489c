use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;
use std::time::Duration;
use termpilot_core::picker::{LineEditor, PathPicker, PickOutcome, PickRequest};

/// Line that ends an edit session and saves.
pub const SAVE_MARKER: &str = "SAVE";
/// Line that ends an edit session without saving.
pub const CANCEL_MARKER: &str = "CANCEL";

// ---------------------------------------------------------------------------
// Terminal implementations
// ---------------------------------------------------------------------------

/// Path picker that asks for a path on stderr and reads one line of stdin.
///
/// Relative answers are taken relative to the session's working directory.
/// An empty answer cancels.
pub struct StdinPathPicker {
    timeout: Duration,
}

impl StdinPathPicker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Create with the default 5-minute timeout.
    pub fn default_timeout() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

/// Prompt shown for a pick request.
pub fn pick_prompt(request: &PickRequest, cwd: &Path) -> String {
    let question = match request {
        PickRequest::Create { is_dir: true } => "Folder to create".to_string(),
        PickRequest::Create { is_dir: false } => "File to create".to_string(),
        PickRequest::Select { prompt } => prompt.clone(),
        PickRequest::Destination { source, operation } => {
            format!("Destination to {operation} '{}' to", source.display())
        }
    };
    format!(
        "{question} (relative to {}, empty to cancel): ",
        cwd.display()
    )
}

/// Message returned when the user cancels a pick request.
pub fn cancel_message(request: &PickRequest) -> String {
    match request {
        PickRequest::Create { is_dir: true } => "Folder creation cancelled".to_string(),
        PickRequest::Create { is_dir: false } => "File creation cancelled".to_string(),
        PickRequest::Select { .. } => "Selection cancelled".to_string(),
        PickRequest::Destination { operation, .. } => {
            let mut chars = operation.chars();
            let capitalized: String = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            format!("{capitalized} cancelled")
        }
    }
}

#[async_trait]
impl PathPicker for StdinPathPicker {
    async fn pick(&self, request: PickRequest, cwd: &Path) -> PickOutcome {
        eprint!("{}", pick_prompt(&request, cwd));

        let result = tokio::time::timeout(
            self.timeout,
            tokio::task::spawn_blocking(|| {
                let mut input = String::new();
                std::io::stdin().read_line(&mut input).map(|_| input)
            }),
        )
        .await;

        match result {
            Ok(Ok(Ok(input))) => {
                let answer = input.trim();
                if answer.is_empty() {
                    return PickOutcome::cancelled(cancel_message(&request));
                }
                let path = cwd.join(answer);
                let message = format!("Selected: {}", path.display());
                PickOutcome::picked(path, message)
            }
            Ok(_) => PickOutcome::cancelled("stdin read error"),
            Err(_) => PickOutcome::cancelled(format!(
                "Timed out after {}s",
                self.timeout.as_secs()
            )),
        }
    }
}

/// Line editor that shows the current contents on stderr and reads
/// replacement lines from stdin until `SAVE`. `CANCEL` or end of input aborts.
pub struct StdinLineEditor {
    timeout: Duration,
}

impl StdinLineEditor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Create with the default 30-minute timeout.
    pub fn default_timeout() -> Self {
        Self::new(Duration::from_secs(1800))
    }
}

/// Read lines until the save marker. `None` on cancel marker, EOF or error.
pub fn collect_lines(mut input: impl BufRead) -> Option<Vec<String>> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        let line = line.trim_end_matches(['\n', '\r']);
        match line.trim() {
            SAVE_MARKER => return Some(lines),
            CANCEL_MARKER => return None,
            _ => lines.push(line.to_string()),
        }
    }
}

#[async_trait]
impl LineEditor for StdinLineEditor {
    async fn edit(&self, path: &Path, current: &str) -> Option<Vec<String>> {
        let rule = "-".repeat(50);
        eprintln!(
            "Editing {} (type '{SAVE_MARKER}' on a new line to save, '{CANCEL_MARKER}' to abort):",
            path.display()
        );
        eprintln!("{rule}\n{current}\n{rule}");

        let result = tokio::time::timeout(
            self.timeout,
            tokio::task::spawn_blocking(|| collect_lines(std::io::stdin().lock())),
        )
        .await;

        match result {
            Ok(Ok(lines)) => lines,
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Scripted implementations
// ---------------------------------------------------------------------------

/// Picker that answers from a fixed queue and records every request.
/// Once the queue is empty every pick is cancelled.
pub struct ScriptedPicker {
    answers: Mutex<VecDeque<PickOutcome>>,
    requests: Mutex<Vec<PickRequest>>,
}

impl ScriptedPicker {
    pub fn new(answers: impl IntoIterator<Item = PickOutcome>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new([])
    }

    pub fn requests(&self) -> Vec<PickRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PathPicker for ScriptedPicker {
    async fn pick(&self, request: PickRequest, _cwd: &Path) -> PickOutcome {
        self.requests.lock().push(request);
        self.answers
            .lock()
            .pop_front()
            .unwrap_or_else(|| PickOutcome::cancelled("No selection made"))
    }
}

/// Editor that always returns the same answer and records what it was shown.
pub struct ScriptedEditor {
    answer: Option<Vec<String>>,
    shown: Mutex<Vec<String>>,
}

impl ScriptedEditor {
    pub fn saving<S: Into<String>>(lines: impl IntoIterator<Item = S>) -> Self {
        Self {
            answer: Some(lines.into_iter().map(Into::into).collect()),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn aborting() -> Self {
        Self {
            answer: None,
            shown: Mutex::new(Vec::new()),
        }
    }

    /// Contents presented to the editor, one entry per call.
    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().clone()
    }
}

#[async_trait]
impl LineEditor for ScriptedEditor {
    async fn edit(&self, _path: &Path, current: &str) -> Option<Vec<String>> {
        self.shown.lock().push(current.to_string());
        self.answer.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    #[test]
    fn test_collect_lines_until_save() {
        let input = Cursor::new("first\n  indented\r\nSAVE\nignored\n");
        assert_eq!(
            collect_lines(input),
            Some(vec!["first".to_string(), "  indented".to_string()])
        );
    }

    #[test]
    fn test_collect_lines_cancel_and_eof() {
        assert_eq!(collect_lines(Cursor::new("a\nCANCEL\n")), None);
        assert_eq!(collect_lines(Cursor::new("a\nb\n")), None);
        assert_eq!(collect_lines(Cursor::new("SAVE\n")), Some(vec![]));
    }

    #[test]
    fn test_cancel_messages() {
        assert_eq!(
            cancel_message(&PickRequest::Create { is_dir: true }),
            "Folder creation cancelled"
        );
        assert_eq!(
            cancel_message(&PickRequest::Destination {
                source: PathBuf::from("/tmp/a"),
                operation: "move".to_string(),
            }),
            "Move cancelled"
        );
    }

    #[test]
    fn test_prompt_mentions_cwd() {
        let prompt = pick_prompt(
            &PickRequest::Select {
                prompt: "Select file/folder to copy".to_string(),
            },
            Path::new("/work"),
        );
        assert!(prompt.starts_with("Select file/folder to copy"));
        assert!(prompt.contains("/work"));
    }

    #[tokio::test]
    async fn test_scripted_picker_queue() {
        let picker = ScriptedPicker::new([PickOutcome::picked("/tmp/a", "ok")]);
        let cwd = Path::new("/");
        let first = picker
            .pick(PickRequest::Create { is_dir: false }, cwd)
            .await;
        assert_eq!(first.resolved(), Some(Path::new("/tmp/a")));

        let second = picker
            .pick(PickRequest::Create { is_dir: false }, cwd)
            .await;
        assert!(!second.success);
        assert_eq!(picker.requests().len(), 2);
    }
}
