use std::path::{Path, PathBuf};

/// Resolves `path` against the process's current working directory and any
/// symbolic links, producing the canonical absolute form that is this
/// shim's notion of virtual identity (§3). `/proc`-prefixed paths are never
/// virtualized (§3, §8 scenario 6) and are reported as such up front so
/// callers can short-circuit without touching the path cache.
///
/// The file named by `path` need not exist locally — the controller may be
/// the only place its image lives (§8 scenario 3 opens a path that has no
/// local file at all). `std::fs::canonicalize` alone can't be used directly
/// since it requires every component, including the last, to exist; instead
/// the longest existing prefix is resolved through it (picking up symlink
/// resolution for whatever is actually on disk) and any trailing
/// nonexistent components are appended lexically.
pub fn canonicalize(path: &str) -> Option<PathBuf> {
    if is_proc_path(path) {
        return None;
    }
    let p = Path::new(path);
    let absolute = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(p)
    };
    resolve_longest_existing_prefix(&absolute)
}

fn resolve_longest_existing_prefix(path: &Path) -> Option<PathBuf> {
    if let Ok(canon) = std::fs::canonicalize(path) {
        return Some(canon);
    }
    let file_name = path.file_name()?;
    let parent = path.parent()?;
    if parent == path {
        return None;
    }
    let canon_parent = resolve_longest_existing_prefix(parent)?;
    Some(canon_parent.join(file_name))
}

/// Cheap, allocation-free check usable before any filesystem call: a path
/// is excluded from virtualization if it begins with `/proc`, whether or
/// not it can be canonicalized (a nonexistent `/proc/...` path must still
/// never reach the controller).
pub fn is_proc_path(path: &str) -> bool {
    path.as_bytes().starts_with(b"/proc")
}
