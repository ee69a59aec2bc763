//! Relative/absolute path rewriting for stored file references.
//!
//! Paths inside a database file are stored relative to the file itself, so a
//! saved scene can be moved or copied together with its assets. Conversion is
//! purely lexical: no filesystem access, no symlink resolution.

use std::path::{Component, Path, PathBuf};

/// Lexically normalizes a path, resolving `.` and `..` components.
///
/// Leading `..` components of a relative path are kept; `..` never pops past
/// a root.
pub fn normalize(path: &Path) -> PathBuf {
    enum Last {
        Normal,
        Root,
        Other,
    }

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last = match out.components().next_back() {
                    Some(Component::Normal(_)) => Last::Normal,
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => Last::Root,
                    _ => Last::Other,
                };
                match last {
                    Last::Normal => {
                        out.pop();
                    }
                    // `..` never pops past a root
                    Last::Root => {}
                    Last::Other => out.push(Component::ParentDir),
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Rewrites `target` relative to the directory `base`.
///
/// Both paths are normalized first. If `target` is already relative it is
/// returned unchanged. If the two paths do not share a filesystem root (for
/// example different drive prefixes), the absolute path is kept as-is.
pub fn relativize(base: &Path, target: &Path) -> PathBuf {
    if target.is_relative() {
        return normalize(target);
    }

    let base = normalize(base);
    let target = normalize(target);

    let mut base_parts = base.components();
    let mut target_parts = target.components();
    let mut base_rest = Vec::new();
    let mut target_rest = Vec::new();

    loop {
        match (base_parts.next(), target_parts.next()) {
            (Some(b), Some(t)) if b == t && base_rest.is_empty() => {}
            (Some(b), Some(t)) => {
                base_rest.push(b);
                target_rest.push(t);
            }
            (Some(b), None) => base_rest.push(b),
            (None, Some(t)) => target_rest.push(t),
            (None, None) => break,
        }
    }

    // No shared root at all: keep the absolute path.
    if base_rest
        .first()
        .is_some_and(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
    {
        return target;
    }

    let mut out = PathBuf::new();
    for _ in &base_rest {
        out.push(Component::ParentDir);
    }
    for part in target_rest {
        out.push(part);
    }
    out
}

/// Resolves a stored path against the directory `base`.
///
/// Absolute stored paths are returned unchanged; relative ones are joined
/// onto `base` and normalized.
pub fn resolve(base: &Path, stored: &Path) -> PathBuf {
    if stored.is_absolute() {
        normalize(stored)
    } else {
        normalize(&base.join(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_removes_dots() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn relativize_sibling() {
        let rel = relativize(Path::new("/proj/scenes"), Path::new("/proj/scenes/tex/wood.png"));
        assert_eq!(rel, PathBuf::from("tex/wood.png"));
    }

    #[test]
    fn relativize_walks_up() {
        let rel = relativize(Path::new("/proj/scenes"), Path::new("/proj/assets/mesh.obj"));
        assert_eq!(rel, PathBuf::from("../assets/mesh.obj"));
    }

    #[test]
    fn relativize_keeps_relative_input() {
        let rel = relativize(Path::new("/proj"), Path::new("tex/wood.png"));
        assert_eq!(rel, PathBuf::from("tex/wood.png"));
    }

    #[test]
    fn resolve_joins_and_normalizes() {
        let abs = resolve(Path::new("/proj/scenes"), Path::new("../assets/mesh.obj"));
        assert_eq!(abs, PathBuf::from("/proj/assets/mesh.obj"));
    }

    #[test]
    fn resolve_keeps_absolute() {
        let abs = resolve(Path::new("/proj"), Path::new("/elsewhere/a.png"));
        assert_eq!(abs, PathBuf::from("/elsewhere/a.png"));
    }

    #[test]
    fn roundtrip_through_relative_form() {
        let base = Path::new("/proj/scenes");
        let original = PathBuf::from("/proj/assets/textures/noise.exr");
        let rel = relativize(base, &original);
        assert!(rel.is_relative());
        assert_eq!(resolve(base, &rel), original);
    }
}
