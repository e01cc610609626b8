//! Maps virtual sandbox paths to real filesystem paths, rejecting escape
//! attempts including via symlinks.

use std::path::{Component, Path, PathBuf};

use crate::error::AccessDenied;

const ROOTS: &[&str] = &["workspace", "memories", "blocks", "skills"];

/// Resolves a virtual path like `/workspace/notes.md` to
/// `{agent_root}/workspace/notes.md`, rejecting anything that escapes.
pub fn resolve(agent_root: &Path, virtual_path: &str) -> Result<PathBuf, AccessDenied> {
    let (root_sub, tail) = split_root(virtual_path)?;

    // Step 1: lexical normalization. Any `..` component that would climb
    // above the root subdirectory is rejected without touching the filesystem.
    let mut normalized = PathBuf::new();
    for component in Path::new(tail).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(deny(agent_root, "path escapes the sandbox root"));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(deny(agent_root, "absolute paths are not permitted"));
            }
        }
    }

    let candidate = agent_root.join(root_sub).join(&normalized);

    // Step 2: the lexical candidate must still lie under the expected root.
    let expected_prefix = agent_root.join(root_sub);
    if !candidate.starts_with(&expected_prefix) {
        return Err(deny(agent_root, "path escapes the expected sandbox area"));
    }

    // Step 3: walk upward to the nearest existing ancestor and canonicalize
    // it, so that a symlink anywhere in the existing prefix is resolved.
    let (existing_ancestor, suffix) = nearest_existing_ancestor(&candidate);
    let canonical_ancestor = existing_ancestor
        .canonicalize()
        .map_err(|_| deny(agent_root, "failed to resolve sandbox path"))?;
    let canonical_candidate = canonical_ancestor.join(&suffix);

    // Step 4: the canonical form must still resolve under the canonical
    // agent root's expected root subdirectory.
    let canonical_agent_root = agent_root
        .canonicalize()
        .map_err(|_| deny(agent_root, "failed to resolve sandbox root"))?;
    let canonical_expected_prefix = canonical_agent_root.join(root_sub);

    if !canonical_candidate.starts_with(&canonical_expected_prefix) {
        return Err(deny(
            agent_root,
            &format!("path escapes the {root_sub} sandbox area"),
        ));
    }

    Ok(canonical_candidate)
}

/// Splits `/workspace/foo/bar` into `("workspace", "foo/bar")`, rejecting any
/// other prefix.
fn split_root(virtual_path: &str) -> Result<(&'static str, &str), AccessDenied> {
    for root in ROOTS {
        let prefix = format!("/{root}/");
        if let Some(tail) = virtual_path.strip_prefix(&prefix) {
            return Ok((root, tail));
        }
        // Also accept the bare root with no trailing content, e.g. "/workspace".
        if virtual_path == format!("/{root}") {
            return Ok((root, ""));
        }
    }
    Err(AccessDenied(format!(
        "path '{virtual_path}' is not under /workspace, /memories, /blocks, or /skills"
    )))
}

/// Walks from `path` upward until an existing component is found, returning
/// `(existing_ancestor, remaining_suffix)`.
fn nearest_existing_ancestor(path: &Path) -> (PathBuf, PathBuf) {
    let mut ancestor = path.to_path_buf();
    let mut suffix = PathBuf::new();
    loop {
        if ancestor.exists() {
            return (ancestor, suffix);
        }
        match ancestor.file_name() {
            Some(name) => {
                let mut rebuilt = PathBuf::from(name);
                rebuilt.push(&suffix);
                suffix = rebuilt;
                ancestor.pop();
            }
            None => return (ancestor, suffix),
        }
    }
}

fn deny(agent_root: &Path, reason: &str) -> AccessDenied {
    AccessDenied(format!("{reason} (<sandbox>)").replace(
        &agent_root.display().to_string(),
        "<sandbox>",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    fn make_agent_root() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        for root in ROOTS {
            std::fs::create_dir_all(dir.path().join(root)).unwrap();
        }
        dir
    }

    #[test]
    fn resolves_plain_path() {
        let dir = make_agent_root();
        std::fs::write(dir.path().join("workspace/note.md"), "hi").unwrap();
        let resolved = resolve(dir.path(), "/workspace/note.md").unwrap();
        assert_eq!(
            resolved.canonicalize().unwrap(),
            dir.path().join("workspace/note.md").canonicalize().unwrap()
        );
    }

    #[test]
    fn rejects_unknown_root() {
        let dir = make_agent_root();
        let err = resolve(dir.path(), "/etc/passwd").unwrap_err();
        assert!(!err.0.contains(&dir.path().display().to_string()));
    }

    #[test]
    fn rejects_dotdot_escape() {
        let dir = make_agent_root();
        let err = resolve(dir.path(), "/workspace/../../../etc/passwd");
        assert!(err.is_err());
    }

    #[test]
    fn rejects_symlink_escape() {
        let dir = make_agent_root();
        symlink("/etc", dir.path().join("workspace/link")).unwrap();
        let err = resolve(dir.path(), "/workspace/link/passwd").unwrap_err();
        assert!(err.0.contains("workspace"));
        assert!(!err.0.contains("/etc"));
    }

    #[test]
    fn accepts_bare_root() {
        let dir = make_agent_root();
        let resolved = resolve(dir.path(), "/workspace").unwrap();
        assert_eq!(
            resolved,
            dir.path().join("workspace").canonicalize().unwrap()
        );
    }

    #[test]
    fn rejects_nested_dotdot_via_subdir() {
        let dir = make_agent_root();
        std::fs::create_dir_all(dir.path().join("workspace/sub")).unwrap();
        let err = resolve(dir.path(), "/workspace/sub/../../../etc/passwd");
        assert!(err.is_err());
    }

    #[test]
    fn sanitizes_agent_root_prefix_from_error() {
        let dir = make_agent_root();
        symlink("/etc", dir.path().join("workspace/link")).unwrap();
        let err = resolve(dir.path(), "/workspace/link/shadow").unwrap_err();
        assert!(!err.0.contains(&dir.path().display().to_string()));
    }
}
