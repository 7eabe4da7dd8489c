use super::{blocking, usage};
use crate::builtin::{Builtin, BuiltinDescriptor};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use termpilot_core::picker::{PathPicker, PickRequest};
use termpilot_core::{CommandError, CommandResult, ExecContext};
use termpilot_security::{resolve_resource, LockManager};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Either the user-visible name and absolute path of the target, or the
/// message of a cancelled pick (returned to the user as normal output).
enum Target {
    Chosen { shown: String, path: PathBuf },
    Cancelled(String),
}

async fn pick_created(picker: &dyn PathPicker, is_dir: bool, ctx: &ExecContext) -> Target {
    let outcome = picker.pick(PickRequest::Create { is_dir }, &ctx.cwd).await;
    match outcome.resolved() {
        Some(path) => Target::Chosen {
            shown: path.display().to_string(),
            path: resolve_resource(&ctx.cwd, path),
        },
        None => Target::Cancelled(outcome.message),
    }
}

fn named(raw: &str, ctx: &ExecContext) -> Target {
    Target::Chosen {
        shown: raw.to_string(),
        path: resolve_resource(&ctx.cwd, raw),
    }
}

/// Source and destination as `(shown, path)` pairs, asking the picker for
/// both when fewer than two arguments were given.
async fn source_and_destination(
    picker: &dyn PathPicker,
    operation: &str,
    args: &[String],
    ctx: &ExecContext,
) -> Result<((String, PathBuf), (String, PathBuf)), String> {
    if let [src, dest, ..] = args {
        return Ok((
            (src.clone(), resolve_resource(&ctx.cwd, src)),
            (dest.clone(), resolve_resource(&ctx.cwd, dest)),
        ));
    }

    let prompt = format!("Select file/folder to {operation}");
    let outcome = picker.pick(PickRequest::Select { prompt }, &ctx.cwd).await;
    let Some(source) = outcome.resolved().map(|p| resolve_resource(&ctx.cwd, p)) else {
        return Err(outcome.message);
    };

    let outcome = picker
        .pick(
            PickRequest::Destination {
                source: source.clone(),
                operation: operation.to_string(),
            },
            &ctx.cwd,
        )
        .await;
    let Some(dest) = outcome.resolved().map(|p| resolve_resource(&ctx.cwd, p)) else {
        return Err(outcome.message);
    };

    Ok((
        (source.display().to_string(), source),
        (dest.display().to_string(), dest),
    ))
}

/// `dest` itself, or `dest/<source name>` when `dest` is an existing directory.
fn final_destination(source: &Path, dest: &Path) -> PathBuf {
    match (dest.is_dir(), source.file_name()) {
        (true, Some(name)) => dest.join(name),
        _ => dest.to_path_buf(),
    }
}

fn refuse_into_itself(source: &Path, dest: &Path, shown: &str) -> Result<(), CommandError> {
    if source.is_dir() && dest.starts_with(source) {
        return Err(CommandError::Io(format!(
            "cannot place directory '{shown}' inside itself"
        )));
    }
    Ok(())
}

/// Refuse `cp`/`mv` when both ends name the same file, which would
/// otherwise truncate it.
fn refuse_same_file(
    source: &Path,
    target: &Path,
    src_shown: &str,
    dest_shown: &str,
) -> Result<(), CommandError> {
    let same = source == target
        || matches!(
            (source.canonicalize(), target.canonicalize()),
            (Ok(a), Ok(b)) if a == b
        );
    if same {
        return Err(CommandError::Io(format!(
            "'{src_shown}' and '{dest_shown}' are the same file"
        )));
    }
    Ok(())
}

fn copy_tree(source: &Path, dest: &Path) -> Result<usize, CommandError> {
    let mut copied = 0;
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| CommandError::Io(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| CommandError::Io(e.to_string()))?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| CommandError::from_io(e, &target))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| CommandError::from_io(e, entry.path()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

// ---------------------------------------------------------------------------
// mkdir
// ---------------------------------------------------------------------------

/// Creates a directory (and missing parents) under the target's lock.
pub struct MkdirCommand {
    descriptor: BuiltinDescriptor,
    locks: Arc<LockManager>,
    picker: Arc<dyn PathPicker>,
}

impl MkdirCommand {
    pub fn new(locks: Arc<LockManager>, picker: Arc<dyn PathPicker>) -> Self {
        Self {
            descriptor: BuiltinDescriptor::new("mkdir", "mkdir [directory]", "Create directory")
                .mutating(),
            locks,
            picker,
        }
    }
}

#[async_trait]
impl Builtin for MkdirCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: &[String], ctx: &mut ExecContext) -> CommandResult {
        let target = match args.first() {
            Some(raw) => named(raw, ctx),
            None => pick_created(self.picker.as_ref(), true, ctx).await,
        };
        let (shown, path) = match target {
            Target::Chosen { shown, path } => (shown, path),
            Target::Cancelled(message) => return Ok(message),
        };

        let _guard = self
            .locks
            .guard(&ctx.session_id, std::slice::from_ref(&path))?;

        if path.is_dir() {
            return Ok(format!("Directory '{shown}' already exists"));
        }
        if path.exists() {
            return Err(CommandError::NotADirectory(shown));
        }
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| CommandError::from_io(e, &shown))?;

        info!(session = %ctx.session_id, path = %path.display(), "Directory created");
        Ok(format!("Directory '{shown}' created"))
    }
}

// ---------------------------------------------------------------------------
// touch
// ---------------------------------------------------------------------------

/// Creates an empty file, or bumps the modification time of an existing one.
pub struct TouchCommand {
    descriptor: BuiltinDescriptor,
    locks: Arc<LockManager>,
    picker: Arc<dyn PathPicker>,
}

impl TouchCommand {
    pub fn new(locks: Arc<LockManager>, picker: Arc<dyn PathPicker>) -> Self {
        Self {
            descriptor: BuiltinDescriptor::new("touch", "touch [file]", "Create empty file")
                .mutating(),
            locks,
            picker,
        }
    }
}

#[async_trait]
impl Builtin for TouchCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: &[String], ctx: &mut ExecContext) -> CommandResult {
        let target = match args.first() {
            Some(raw) => named(raw, ctx),
            None => pick_created(self.picker.as_ref(), false, ctx).await,
        };
        let (shown, path) = match target {
            Target::Chosen { shown, path } => (shown, path),
            Target::Cancelled(message) => return Ok(message),
        };

        let _guard = self
            .locks
            .guard(&ctx.session_id, std::slice::from_ref(&path))?;

        if path.is_dir() {
            return Err(CommandError::NotAFile(shown));
        }

        let existed = path.exists();
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CommandError::from_io(e, &shown))?;

        if existed {
            file.set_modified(SystemTime::now())
                .map_err(|e| CommandError::from_io(e, &shown))?;
            Ok(format!("File '{shown}' already exists"))
        } else {
            info!(session = %ctx.session_id, path = %path.display(), "File created");
            Ok(format!("File '{shown}' created"))
        }
    }
}

// ---------------------------------------------------------------------------
// rm
// ---------------------------------------------------------------------------

/// Removes a file, or a directory recursively.
pub struct RmCommand {
    descriptor: BuiltinDescriptor,
    locks: Arc<LockManager>,
}

impl RmCommand {
    pub fn new(locks: Arc<LockManager>) -> Self {
        Self {
            descriptor: BuiltinDescriptor::new(
                "rm",
                "rm <file/folder>",
                "Remove file or directory",
            )
            .mutating(),
            locks,
        }
    }
}

#[async_trait]
impl Builtin for RmCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: &[String], ctx: &mut ExecContext) -> CommandResult {
        let raw = args.first().ok_or_else(|| usage(&self.descriptor))?;
        let path = resolve_resource(&ctx.cwd, raw);

        let Ok(meta) = fs::symlink_metadata(&path) else {
            return Err(CommandError::NotFound(raw.clone()));
        };

        let _guard = self
            .locks
            .guard(&ctx.session_id, std::slice::from_ref(&path))?;

        // A symlink is removed as a link, never through its target.
        let message = if meta.is_dir() {
            tokio::fs::remove_dir_all(&path)
                .await
                .map_err(|e| CommandError::from_io(e, raw))?;
            format!("Directory '{raw}' removed")
        } else {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| CommandError::from_io(e, raw))?;
            format!("File '{raw}' removed")
        };
        info!(session = %ctx.session_id, path = %path.display(), "Removed");
        Ok(message)
    }
}

// ---------------------------------------------------------------------------
// cp
// ---------------------------------------------------------------------------

/// Copies a file, or a directory tree, holding locks on both ends.
pub struct CopyCommand {
    descriptor: BuiltinDescriptor,
    locks: Arc<LockManager>,
    picker: Arc<dyn PathPicker>,
}

impl CopyCommand {
    pub fn new(locks: Arc<LockManager>, picker: Arc<dyn PathPicker>) -> Self {
        Self {
            descriptor: BuiltinDescriptor::new("cp", "cp <source> <destination>", "Copy file or directory")
                .mutating(),
            locks,
            picker,
        }
    }
}

#[async_trait]
impl Builtin for CopyCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: &[String], ctx: &mut ExecContext) -> CommandResult {
        let ((src_shown, source), (dest_shown, dest)) =
            match source_and_destination(self.picker.as_ref(), "copy", args, ctx).await {
                Ok(pair) => pair,
                Err(message) => return Ok(message),
            };

        if !source.exists() {
            return Err(CommandError::NotFound(src_shown));
        }
        let target = final_destination(&source, &dest);
        refuse_same_file(&source, &target, &src_shown, &dest_shown)?;
        refuse_into_itself(&source, &target, &src_shown)?;

        let _guard = self
            .locks
            .guard(&ctx.session_id, &[source.clone(), target.clone()])?;

        let is_dir = source.is_dir();
        let count = {
            let (source, target) = (source.clone(), target.clone());
            blocking(move || {
                if is_dir {
                    copy_tree(&source, &target)
                } else {
                    fs::copy(&source, &target)
                        .map(|_| 1)
                        .map_err(|e| CommandError::from_io(e, &target))
                }
            })
            .await?
        };
        debug!(session = %ctx.session_id, from = %source.display(), to = %target.display(), files = count, "Copied");

        if is_dir {
            Ok(format!("Directory '{src_shown}' copied to '{dest_shown}'"))
        } else {
            Ok(format!("File '{src_shown}' copied to '{dest_shown}'"))
        }
    }
}

// ---------------------------------------------------------------------------
// mv
// ---------------------------------------------------------------------------

/// Moves or renames, copying then removing when a plain rename fails.
pub struct MoveCommand {
    descriptor: BuiltinDescriptor,
    locks: Arc<LockManager>,
    picker: Arc<dyn PathPicker>,
}

impl MoveCommand {
    pub fn new(locks: Arc<LockManager>, picker: Arc<dyn PathPicker>) -> Self {
        Self {
            descriptor: BuiltinDescriptor::new("mv", "mv <source> <destination>", "Move or rename")
                .mutating(),
            locks,
            picker,
        }
    }
}

fn move_path(source: &Path, target: &Path) -> Result<(), CommandError> {
    let renamed = match fs::rename(source, target) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    if matches!(
        renamed.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
    ) {
        return Err(CommandError::from_io(renamed, source));
    }

    // Different filesystems: copy, then remove the original.
    debug!(error = %renamed, "rename failed, copying instead");
    let is_dir = fs::symlink_metadata(source)
        .map(|m| m.is_dir())
        .map_err(|e| CommandError::from_io(e, source))?;
    if is_dir {
        copy_tree(source, target)?;
        fs::remove_dir_all(source).map_err(|e| CommandError::from_io(e, source))
    } else {
        fs::copy(source, target).map_err(|e| CommandError::from_io(e, target))?;
        fs::remove_file(source).map_err(|e| CommandError::from_io(e, source))
    }
}

#[async_trait]
impl Builtin for MoveCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: &[String], ctx: &mut ExecContext) -> CommandResult {
        let ((src_shown, source), (dest_shown, dest)) =
            match source_and_destination(self.picker.as_ref(), "move", args, ctx).await {
                Ok(pair) => pair,
                Err(message) => return Ok(message),
            };

        if fs::symlink_metadata(&source).is_err() {
            return Err(CommandError::NotFound(src_shown));
        }
        let target = final_destination(&source, &dest);
        refuse_same_file(&source, &target, &src_shown, &dest_shown)?;
        refuse_into_itself(&source, &target, &src_shown)?;

        let _guard = self
            .locks
            .guard(&ctx.session_id, &[source.clone(), target.clone()])?;

        {
            let (source, target) = (source.clone(), target.clone());
            blocking(move || move_path(&source, &target)).await?;
        }
        info!(session = %ctx.session_id, from = %source.display(), to = %target.display(), "Moved");
        Ok(format!("Moved '{src_shown}' to '{dest_shown}'"))
    }
}
