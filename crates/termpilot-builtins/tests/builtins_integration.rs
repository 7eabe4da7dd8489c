#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use termpilot_builtins::{CommandExecutor, ScriptedEditor, ScriptedPicker};
use termpilot_core::ExecContext;
use termpilot_security::{resolve_resource, LockManager};

/// Two executors over the same data directory behave like two terminal
/// processes sharing one lock table.
fn executor(data: &TempDir) -> (Arc<LockManager>, CommandExecutor) {
    let locks = Arc::new(LockManager::in_data_dir(data.path()));
    let exec = CommandExecutor::standard(
        locks.clone(),
        Arc::new(ScriptedPicker::empty()),
        Arc::new(ScriptedEditor::saving(["edited"])),
    );
    (locks, exec)
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Cross-session contention
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_busy_until_holder_releases() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let cwd = work.path().canonicalize().unwrap();

    let (locks_a, _exec_a) = executor(&data);
    let (_locks_b, exec_b) = executor(&data);
    let mut ctx_b = ExecContext::new("session_b", &cwd);

    let resource = resolve_resource(&cwd, "x");
    assert!(locks_a.acquire("session_a", &resource));

    let err = exec_b
        .execute("mkdir", &args(&["x"]), &mut ctx_b)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("being used by another session"));
    assert!(!cwd.join("x").exists());

    locks_a.release("session_a", &resource);
    let out = exec_b
        .execute("mkdir", &args(&["x"]), &mut ctx_b)
        .await
        .unwrap();
    assert_eq!(out, "Directory 'x' created");
}

#[tokio::test]
async fn test_expired_lock_does_not_block() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let cwd = work.path().canonicalize().unwrap();

    let stale = LockManager::in_data_dir(data.path());
    let resource = resolve_resource(&cwd, "notes.txt");
    // Taken long enough ago to be past the five-minute expiry.
    let long_ago = chrono::Utc::now().timestamp_millis() as f64 / 1000.0 - 3600.0;
    assert!(stale.acquire_at("session_a", &resource, long_ago));

    let (_locks, exec) = executor(&data);
    let mut ctx = ExecContext::new("session_b", &cwd);
    let out = exec
        .execute("touch", &args(&["notes.txt"]), &mut ctx)
        .await
        .unwrap();
    assert_eq!(out, "File 'notes.txt' created");
}

#[tokio::test]
async fn test_same_session_never_blocks_itself() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let cwd = work.path().canonicalize().unwrap();
    let (locks, exec) = executor(&data);
    let mut ctx = ExecContext::new("session_a", &cwd);

    let resource = resolve_resource(&cwd, "doc.txt");
    assert!(locks.acquire("session_a", &resource));
    exec.execute("touch", &args(&["doc.txt"]), &mut ctx)
        .await
        .unwrap();
    exec.execute("edit", &args(&["doc.txt"]), &mut ctx)
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(cwd.join("doc.txt")).unwrap(),
        "edited"
    );
}

// ---------------------------------------------------------------------------
// Session-relative paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cd_then_relative_operations() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let cwd = work.path().canonicalize().unwrap();
    let (_locks, exec) = executor(&data);
    let mut ctx = ExecContext::new("s1", &cwd);

    exec.execute("mkdir", &args(&["project"]), &mut ctx)
        .await
        .unwrap();
    exec.execute("cd", &args(&["project"]), &mut ctx)
        .await
        .unwrap();
    assert_eq!(
        exec.execute("pwd", &[], &mut ctx).await.unwrap(),
        cwd.join("project").display().to_string()
    );

    exec.execute("touch", &args(&["readme.md"]), &mut ctx)
        .await
        .unwrap();
    exec.execute("cp", &args(&["readme.md", "copy.md"]), &mut ctx)
        .await
        .unwrap();
    let listing = exec.execute("ls", &[], &mut ctx).await.unwrap();
    assert_eq!(listing, "copy.md\nreadme.md");
    assert!(cwd.join("project/copy.md").is_file());
}

#[cfg(unix)]
#[tokio::test]
async fn test_host_fallback_runs_in_session_directory() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let cwd = work.path().canonicalize().unwrap();
    std::fs::write(cwd.join("marker"), "").unwrap();

    let (_locks, exec) = executor(&data);
    let exec = exec.with_shell(termpilot_builtins::ShellFallback::new(Duration::from_secs(5)));
    let mut ctx = ExecContext::new("s1", &cwd);

    let out = exec.execute("ls", &[], &mut ctx).await.unwrap();
    assert_eq!(out, "marker");
    let out = exec
        .execute("sh", &args(&["-c", "ls"]), &mut ctx)
        .await
        .unwrap();
    assert_eq!(out, "marker");
}
