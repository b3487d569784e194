use std::path::{Component, Path, PathBuf};

/// Renders a path for error messages and logs.
///
/// Existing paths are canonicalized. An entry that vanished mid-walk usually
/// still has existing ancestors (at least the walk root), so the deepest one
/// is canonicalized and the missing tail is appended to it. That keeps the
/// rendering of a vanished entry consistent with its surviving siblings even
/// when the root sits behind a symlink.
pub fn best_effort_path_display(path: &Path) -> String {
    match path.canonicalize() {
        Ok(canonical_path) => canonical_path.display().to_string(),
        Err(_) => {
            let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
            let lexical = normalize_lexically(&absolute);
            canonical_ancestor_join(&lexical)
                .unwrap_or(lexical)
                .display()
                .to_string()
        }
    }
}

/// Canonicalizes the deepest existing ancestor of `path` and re-appends the
/// components below it.
fn canonical_ancestor_join(path: &Path) -> Option<PathBuf> {
    let mut missing = Vec::new();
    let mut ancestor = path;
    loop {
        if let Ok(canonical) = ancestor.canonicalize() {
            return Some(missing.iter().rev().fold(canonical, |joined, name| joined.join(name)));
        }
        missing.push(ancestor.file_name()?);
        ancestor = ancestor.parent()?;
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if normalized.file_name().is_some() {
                    normalized.pop();
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

pub trait BestEffortPathExt {
    fn best_effort_path_display(&self) -> String;
}

impl BestEffortPathExt for Path {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn canonical(path: &Path) -> PathBuf {
        path.canonicalize().expect("Failed to canonicalize")
    }

    #[test]
    fn existing_path_is_canonicalized() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::create_dir(temp_dir.path().join("a")).expect("Failed to create dir");
        let nested = temp_dir.path().join("a").join("..").join("a");

        let expected = canonical(&temp_dir.path().join("a"));
        assert_eq!(nested.best_effort_path_display(), expected.display().to_string());
    }

    #[test]
    fn vanished_entry_keeps_its_canonical_ancestor() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let vanished = temp_dir.path().join("gone").join(".").join("deeper").join("..");

        let expected = canonical(temp_dir.path()).join("gone");
        assert_eq!(vanished.best_effort_path_display(), expected.display().to_string());
    }

    #[test]
    fn relative_vanished_entry_is_made_absolute() {
        let path = Path::new("no-such-entry-below-the-cwd");

        let expected = canonical(&std::env::current_dir().expect("Failed to read cwd"))
            .join("no-such-entry-below-the-cwd");
        assert_eq!(path.best_effort_path_display(), expected.display().to_string());
    }

    #[test]
    fn parent_dir_never_pops_the_root() {
        assert_eq!(normalize_lexically(Path::new("/../../gone")), Path::new("/gone"));
        assert_eq!(
            normalize_lexically(Path::new("/does/not/./exist/../anymore")),
            Path::new("/does/not/anymore")
        );
    }
}
