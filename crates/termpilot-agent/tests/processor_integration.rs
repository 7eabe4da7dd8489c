//! The unified processor wired to real builtins, session store and locks.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use tempfile::TempDir;
use termpilot_agent::{ModelResolver, OutcomeKind, UnifiedProcessor};
use termpilot_builtins::{CommandExecutor, ScriptedEditor, ScriptedPicker};
use termpilot_core::picker::PickOutcome;
use termpilot_core::ExecContext;
use termpilot_security::{resolve_resource, LockManager};
use termpilot_session::FileSessionStore;

/// One terminal process: its own processor over a shared data directory.
struct Terminal {
    locks: Arc<LockManager>,
    sessions: Arc<FileSessionStore>,
    processor: UnifiedProcessor,
    ctx: ExecContext,
}

fn terminal(data: &TempDir, work: &TempDir, picker: ScriptedPicker) -> Terminal {
    let locks = Arc::new(LockManager::in_data_dir(data.path()));
    let sessions = Arc::new(
        FileSessionStore::new(data.path())
            .unwrap()
            .without_process_chdir(),
    );
    let executor = Arc::new(CommandExecutor::standard(
        locks.clone(),
        Arc::new(picker),
        Arc::new(ScriptedEditor::aborting()),
    ));
    let id = sessions.create_new().unwrap();
    let processor = UnifiedProcessor::new(
        Arc::new(ModelResolver::offline()),
        executor,
        sessions.clone(),
    )
    .with_process_cwd_sync(false);
    let ctx = ExecContext::new(id, work.path().canonicalize().unwrap());
    Terminal {
        locks,
        sessions,
        processor,
        ctx,
    }
}

impl Terminal {
    async fn run(&mut self, line: &str) -> termpilot_agent::ProcessOutcome {
        self.processor.process(line, &mut self.ctx).await
    }
}

#[tokio::test]
async fn test_two_terminals_get_distinct_sessions() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let a = terminal(&data, &work, ScriptedPicker::empty());
    let b = terminal(&data, &work, ScriptedPicker::empty());
    assert_eq!(a.ctx.session_id, "session_1");
    assert_eq!(b.ctx.session_id, "session_2");
}

#[tokio::test]
async fn test_mutation_blocked_by_other_session() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let a = terminal(&data, &work, ScriptedPicker::empty());
    let mut b = terminal(&data, &work, ScriptedPicker::empty());

    std::fs::write(work.path().join("report.txt"), "draft").unwrap();
    let resource = resolve_resource(&a.ctx.cwd, "report.txt");
    assert!(a.locks.acquire(&a.ctx.session_id, &resource));

    let out = b.run("rm report.txt").await;
    assert_eq!(out.kind, OutcomeKind::Error);
    assert!(out.text.contains("being used by another session"), "{}", out.text);
    assert!(work.path().join("report.txt").exists());

    a.locks.release(&a.ctx.session_id, &resource);
    let out = b.run("rm report.txt").await;
    assert_eq!(out.text, "File 'report.txt' removed");

    // The retry repeats the last entry, so history keeps one copy.
    assert_eq!(
        b.sessions.history().load(&b.ctx.session_id),
        vec!["rm report.txt"]
    );
}

#[tokio::test]
async fn test_natural_language_resolves_offline() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let mut t = terminal(&data, &work, ScriptedPicker::empty());

    let out = t.run("what is my memory usage?").await;
    assert_eq!(out.kind, OutcomeKind::SystemQuery);
    assert_eq!(out.interpreted.as_deref(), Some("mem"));
    assert!(out.text.starts_with("Memory Usage:"), "{}", out.text);

    let out = t.run("what time is it").await;
    assert_eq!(out.interpreted.as_deref(), Some("date"));
}

#[tokio::test]
async fn test_named_creation_skips_picker() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let mut t = terminal(&data, &work, ScriptedPicker::empty());

    let out = t.run("please make me a new file called notes.txt").await;
    assert_eq!(out.interpreted.as_deref(), Some("touch notes.txt"));
    assert!(work.path().join("notes.txt").is_file());
}

#[tokio::test]
async fn test_unnamed_creation_uses_picker() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let target = work.path().canonicalize().unwrap().join("picked");
    let mut t = terminal(
        &data,
        &work,
        ScriptedPicker::new([PickOutcome::picked(target.clone(), "Selected")]),
    );

    let out = t.run("could you make a folder for me").await;
    assert_eq!(out.interpreted.as_deref(), Some("mkdir"));
    assert!(target.is_dir(), "{}", out.text);
}

#[tokio::test]
async fn test_cd_persists_for_next_lookup() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    std::fs::create_dir(work.path().join("src")).unwrap();
    let mut t = terminal(&data, &work, ScriptedPicker::empty());

    t.run("cd src").await;
    let details = t
        .sessions
        .get_details(&t.ctx.session_id)
        .unwrap()
        .unwrap();
    assert!(details.working_directory.ends_with("src"));
    assert!(details.working_directory_valid);
    assert_eq!(details.command_count, 1);

    let out = t.run("touch main.rs").await;
    assert_eq!(out.kind, OutcomeKind::DirectCommand);
    assert!(work.path().join("src/main.rs").is_file());
}

#[tokio::test]
async fn test_resolved_sequence_stops_on_error() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let mut t = terminal(&data, &work, ScriptedPicker::empty());

    let out = t.run("go to nowhere").await;
    assert_eq!(out.kind, OutcomeKind::Error);
    assert_eq!(out.interpreted.as_deref(), Some("cd nowhere"));
    assert_eq!(t.ctx.cwd, work.path().canonicalize().unwrap());
}
