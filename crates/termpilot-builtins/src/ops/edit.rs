use super::usage;
use crate::builtin::{Builtin, BuiltinDescriptor};
use async_trait::async_trait;
use std::sync::Arc;
use termpilot_core::picker::LineEditor;
use termpilot_core::{CommandError, CommandResult, ExecContext};
use termpilot_security::{resolve_resource, LockManager};
use tracing::info;

/// Replaces a file's contents with lines collected by a [`LineEditor`].
///
/// The file's lock is held for the whole interaction, so another session
/// cannot write it while the user is typing.
pub struct EditCommand {
    descriptor: BuiltinDescriptor,
    locks: Arc<LockManager>,
    editor: Arc<dyn LineEditor>,
}

impl EditCommand {
    pub fn new(locks: Arc<LockManager>, editor: Arc<dyn LineEditor>) -> Self {
        Self {
            descriptor: BuiltinDescriptor::new("edit", "edit <file>", "Edit file contents")
                .mutating(),
            locks,
            editor,
        }
    }
}

#[async_trait]
impl Builtin for EditCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: &[String], ctx: &mut ExecContext) -> CommandResult {
        let raw = args.first().ok_or_else(|| usage(&self.descriptor))?;
        let path = resolve_resource(&ctx.cwd, raw);

        let _guard = self
            .locks
            .guard(&ctx.session_id, std::slice::from_ref(&path))?;

        if path.is_dir() {
            return Err(CommandError::NotAFile(raw.clone()));
        }
        let current = match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(CommandError::from_io(e, raw)),
        };

        let Some(lines) = self.editor.edit(&path, &current).await else {
            return Err(CommandError::Cancelled(format!(
                "Edit of '{raw}' cancelled, file unchanged"
            )));
        };

        tokio::fs::write(&path, lines.join("\n"))
            .await
            .map_err(|e| CommandError::from_io(e, raw))?;
        info!(session = %ctx.session_id, path = %path.display(), lines = lines.len(), "File saved");
        Ok(format!("File '{raw}' saved"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::interactive::ScriptedEditor;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TempDir, Arc<LockManager>, ExecContext) {
        let data = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let locks = Arc::new(LockManager::in_data_dir(data.path()));
        let ctx = ExecContext::new("s1", work.path().canonicalize().unwrap());
        (data, work, locks, ctx)
    }

    #[tokio::test]
    async fn test_edit_saves_lines_and_shows_current() {
        let (_data, work, locks, mut ctx) = setup();
        std::fs::write(work.path().join("notes.txt"), "old").unwrap();
        let editor = Arc::new(ScriptedEditor::saving(["first", "second"]));
        let cmd = EditCommand::new(locks, editor.clone());

        let out = cmd
            .execute(&["notes.txt".to_string()], &mut ctx)
            .await
            .unwrap();
        assert_eq!(out, "File 'notes.txt' saved");
        assert_eq!(
            std::fs::read_to_string(work.path().join("notes.txt")).unwrap(),
            "first\nsecond"
        );
        assert_eq!(editor.shown(), vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn test_edit_creates_missing_file() {
        let (_data, work, locks, mut ctx) = setup();
        let cmd = EditCommand::new(locks, Arc::new(ScriptedEditor::saving(["hello"])));
        cmd.execute(&["new.txt".to_string()], &mut ctx)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(work.path().join("new.txt")).unwrap(),
            "hello"
        );
    }

    #[tokio::test]
    async fn test_edit_abort_leaves_file() {
        let (_data, work, locks, mut ctx) = setup();
        std::fs::write(work.path().join("notes.txt"), "old").unwrap();
        let cmd = EditCommand::new(locks.clone(), Arc::new(ScriptedEditor::aborting()));

        let err = cmd
            .execute(&["notes.txt".to_string()], &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Cancelled(_)));
        assert_eq!(
            std::fs::read_to_string(work.path().join("notes.txt")).unwrap(),
            "old"
        );
        let resource = resolve_resource(&ctx.cwd, "notes.txt");
        assert!(locks.check("s2", &resource).is_none());
    }

    #[tokio::test]
    async fn test_edit_busy() {
        let (_data, _work, locks, mut ctx) = setup();
        let resource = resolve_resource(&ctx.cwd, "notes.txt");
        assert!(locks.acquire("other", &resource));
        let editor = Arc::new(ScriptedEditor::saving(["x"]));
        let cmd = EditCommand::new(locks, editor.clone());

        let err = cmd
            .execute(&["notes.txt".to_string()], &mut ctx)
            .await
            .unwrap_err();
        assert!(err.is_busy());
        assert!(editor.shown().is_empty());
    }

    #[tokio::test]
    async fn test_edit_requires_argument() {
        let (_data, _work, locks, mut ctx) = setup();
        let cmd = EditCommand::new(locks, Arc::new(ScriptedEditor::aborting()));
        let err = cmd.execute(&[], &mut ctx).await.unwrap_err();
        assert_eq!(err, CommandError::Usage("edit <file>".to_string()));
    }
}
