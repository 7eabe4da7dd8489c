use super::{blocking, usage};
use crate::builtin::{Builtin, BuiltinDescriptor};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use termpilot_core::{CommandError, CommandResult, ExecContext};
use walkdir::WalkDir;

/// Existing regular file at `raw`, or the matching typed error.
fn existing_file(ctx: &ExecContext, raw: &str) -> Result<PathBuf, CommandError> {
    let path = ctx.resolve(raw);
    if !path.exists() {
        return Err(CommandError::NotFound(raw.to_string()));
    }
    if !path.is_file() {
        return Err(CommandError::NotAFile(raw.to_string()));
    }
    Ok(path)
}

/// UTF-8 when valid, otherwise each byte as its Latin-1 code point.
fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}

async fn read_text(path: &Path, raw: &str) -> Result<String, CommandError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CommandError::from_io(e, raw))?;
    Ok(decode(bytes))
}

// ---------------------------------------------------------------------------
// cat
// ---------------------------------------------------------------------------

pub struct CatCommand {
    descriptor: BuiltinDescriptor,
}

impl CatCommand {
    pub fn new() -> Self {
        Self {
            descriptor: BuiltinDescriptor::new("cat", "cat <file>", "Show file contents"),
        }
    }
}

impl Default for CatCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Builtin for CatCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: &[String], ctx: &mut ExecContext) -> CommandResult {
        let raw = args.first().ok_or_else(|| usage(&self.descriptor))?;
        let path = existing_file(ctx, raw)?;
        read_text(&path, raw).await
    }
}

// ---------------------------------------------------------------------------
// find
// ---------------------------------------------------------------------------

/// Walks a tree and lists entries whose name contains a pattern.
/// With a single argument, that argument is the pattern and the walk starts
/// at the working directory.
pub struct FindCommand {
    descriptor: BuiltinDescriptor,
}

impl FindCommand {
    pub fn new() -> Self {
        Self {
            descriptor: BuiltinDescriptor::new(
                "find",
                "find <path> <name_pattern>",
                "Find files by name",
            ),
        }
    }
}

impl Default for FindCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Builtin for FindCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: &[String], ctx: &mut ExecContext) -> CommandResult {
        let (raw_root, pattern) = match args {
            [root, pattern, ..] => (root.clone(), pattern.clone()),
            [pattern] => (".".to_string(), pattern.clone()),
            [] => return Err(usage(&self.descriptor)),
        };

        let root = ctx.resolve(&raw_root);
        if !root.exists() {
            return Err(CommandError::NotFound(raw_root));
        }

        let shown_root = PathBuf::from(&raw_root);
        let needle = pattern.clone();
        let matches = blocking(move || {
            let mut found = Vec::new();
            for entry in WalkDir::new(&root).min_depth(1).sort_by_file_name() {
                let Ok(entry) = entry else { continue };
                if entry.file_name().to_string_lossy().contains(needle.as_str()) {
                    let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                    found.push(shown_root.join(relative).display().to_string());
                }
            }
            Ok(found)
        })
        .await?;

        if matches.is_empty() {
            Ok(format!(
                "No files or directories matching '{pattern}' found"
            ))
        } else {
            Ok(matches.join("\n"))
        }
    }
}

// ---------------------------------------------------------------------------
// grep
// ---------------------------------------------------------------------------

pub struct GrepCommand {
    descriptor: BuiltinDescriptor,
}

impl GrepCommand {
    pub fn new() -> Self {
        Self {
            descriptor: BuiltinDescriptor::new(
                "grep",
                "grep <pattern> <file>",
                "Search text in a file",
            ),
        }
    }
}

impl Default for GrepCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Builtin for GrepCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: &[String], ctx: &mut ExecContext) -> CommandResult {
        let [pattern, raw, ..] = args else {
            return Err(usage(&self.descriptor));
        };
        let path = existing_file(ctx, raw)?;
        let text = read_text(&path, raw).await?;

        let matches: Vec<String> = text
            .lines()
            .enumerate()
            .filter(|(_, line)| line.contains(pattern.as_str()))
            .map(|(i, line)| format!("{raw}:{}: {}", i + 1, line.trim()))
            .collect();

        if matches.is_empty() {
            Ok(format!("Pattern '{pattern}' not found in {raw}"))
        } else {
            Ok(matches.join("\n"))
        }
    }
}
