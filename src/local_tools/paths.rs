use std::path::{Component, Path, PathBuf};

/// Join `user_path` onto `base_dir` (absolute paths replace it) and fold `.`
/// and `..` without touching the filesystem.
pub fn absolutize(user_path: &str, base_dir: &Path) -> PathBuf {
    let joined = base_dir.join(user_path);
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Resolve a user-provided path and require it to stay inside `base_dir`.
///
/// The lexical check runs first so that paths which do not exist are still
/// classified; the canonical check then catches symlinks pointing outside.
pub fn resolve_within(user_path: &str, base_dir: &Path) -> Result<PathBuf, PathError> {
    if user_path.is_empty() || user_path.len() > 4096 {
        return Err(PathError::Invalid);
    }

    let lexical = absolutize(user_path, base_dir);
    if !lexical.starts_with(base_dir) {
        return Err(PathError::OutsideBase);
    }

    match (lexical.canonicalize(), base_dir.canonicalize()) {
        (Ok(resolved), Ok(base_canonical)) => {
            if resolved.starts_with(&base_canonical) {
                Ok(resolved)
            } else {
                Err(PathError::OutsideBase)
            }
        }
        // Let the caller's read report not-found with its own wording.
        _ => Ok(lexical),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    Invalid,
    OutsideBase,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::Invalid => {
                write!(f, "invalid path: path must be non-empty and under 4096 characters")
            }
            PathError::OutsideBase => write!(f, "cannot read files outside the project directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolutize_folds_parent_dirs() {
        let base = Path::new("/work/project");
        assert_eq!(absolutize("a/../b/./c", base), PathBuf::from("/work/project/b/c"));
        assert_eq!(absolutize("../../etc", base), PathBuf::from("/etc"));
        assert_eq!(absolutize("/tmp/x", base), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_sibling_with_shared_prefix_is_outside() {
        let base = Path::new("/work/project");
        assert_eq!(
            resolve_within("../project-other/secret", base),
            Err(PathError::OutsideBase)
        );
    }
}
