use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Map a user-supplied path to the key used in the lock table.
///
/// The path is joined onto `cwd`, normalized lexically (`.` dropped, `..`
/// popped), and then the longest existing prefix of its parent is
/// canonicalized, so `./a/../b.txt`, `b.txt` and a symlinked parent all
/// produce the same key even when `b.txt` does not exist yet. The final
/// component is never resolved: a symlink names the link, not its target.
pub fn resolve_resource(cwd: &Path, raw: impl AsRef<Path>) -> PathBuf {
    let raw = raw.as_ref();
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        cwd.join(raw)
    };
    let normalized = normalize_lexically(&joined);
    match (normalized.parent(), normalized.file_name()) {
        (Some(parent), Some(name)) => {
            let mut out = canonicalize_existing_prefix(parent);
            out.push(name);
            out
        }
        _ => canonicalize_existing_prefix(&normalized),
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail: Vec<OsString> = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut out = canonical;
            for part in tail.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}
