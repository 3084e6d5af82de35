//! Git operations for the gate
//!
//! Status and commit go through libgit2; the revert path shells out to git
//! because `checkout .` + `clean -fd` is the one blunt, always-correct
//! recovery action and the CLI semantics are exactly what we want.

use anyhow::{Context, Result};
use git2::{Repository, Signature, StatusOptions};
use std::path::Path;
use std::process::Command;

/// Paths with uncommitted changes relative to the last commit: staged,
/// modified, deleted, and untracked files alike.
pub fn changed_files(repo_path: &Path) -> Result<Vec<String>> {
    let repo = Repository::open(repo_path).context("failed to open repository")?;

    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);

    let statuses = repo.statuses(Some(&mut options))?;
    let mut changed = Vec::new();
    for entry in statuses.iter() {
        let status = entry.status();
        let dirty = status.is_index_new()
            || status.is_index_modified()
            || status.is_index_deleted()
            || status.is_wt_new()
            || status.is_wt_modified()
            || status.is_wt_deleted();
        if dirty {
            if let Some(path) = entry.path() {
                changed.push(path.to_string());
            }
        }
    }
    Ok(changed)
}

/// Revert ALL uncommitted changes: working tree back to the last commit,
/// newly created untracked files removed. Untracked paths named in `keep`
/// survive the clean (the journal and config are never collateral damage).
/// Safe to invoke repeatedly.
pub fn revert_all(repo_path: &Path, keep: &[&str]) -> Result<()> {
    Command::new("git")
        .current_dir(repo_path)
        .args(["checkout", "."])
        .output()
        .context("failed to execute git checkout")?;

    let mut clean = Command::new("git");
    clean.current_dir(repo_path).args(["clean", "-fd"]);
    for pattern in keep {
        clean.arg("-e").arg(pattern);
    }
    clean.output().context("failed to execute git clean")?;
    Ok(())
}

/// Stage exactly one file and commit it.
pub fn commit_file(repo_path: &Path, file_path: &str, message: &str) -> Result<String> {
    let repo = Repository::open(repo_path).context("failed to open repository")?;

    let mut index = repo.index()?;
    index
        .add_path(Path::new(file_path))
        .with_context(|| format!("failed to stage '{}'", file_path))?;
    index.write()?;

    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let parent = repo.head()?.peel_to_commit()?;

    let config = repo.config()?;
    let name = config
        .get_string("user.name")
        .unwrap_or_else(|_| "gardener".to_string());
    let email = config
        .get_string("user.email")
        .unwrap_or_else(|_| "gardener@local".to_string());
    let sig = Signature::now(&name, &email)?;

    let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?;
    Ok(oid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn init_test_repo(tmp: &TempDir) -> Repository {
        let repo = Repository::init(tmp.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "test").unwrap();
            config.set_str("user.email", "test@local").unwrap();
        }
        fs::write(tmp.path().join("lib.py"), "def f():\n    return 1\n").unwrap();
        {
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("lib.py")).unwrap();
            index.write().unwrap();
            let tree_id = index.write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let sig = Signature::now("test", "test@local").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap();
        }
        repo
    }

    #[test]
    fn test_changed_files_sees_modified_and_untracked() {
        let tmp = TempDir::new().unwrap();
        init_test_repo(&tmp);

        assert!(changed_files(tmp.path()).unwrap().is_empty());

        fs::write(tmp.path().join("lib.py"), "def f():\n    return 2\n").unwrap();
        fs::write(tmp.path().join("new.py"), "pass\n").unwrap();

        let changed = changed_files(tmp.path()).unwrap();
        assert!(changed.contains(&"lib.py".to_string()));
        assert!(changed.contains(&"new.py".to_string()));
    }

    #[test]
    fn test_revert_all_restores_clean_tree() {
        let tmp = TempDir::new().unwrap();
        init_test_repo(&tmp);

        fs::write(tmp.path().join("lib.py"), "broken\n").unwrap();
        fs::write(tmp.path().join("junk.py"), "junk\n").unwrap();

        revert_all(tmp.path(), &[]).unwrap();

        let content = fs::read_to_string(tmp.path().join("lib.py")).unwrap();
        assert_eq!(content, "def f():\n    return 1\n");
        assert!(!tmp.path().join("junk.py").exists());
        assert!(changed_files(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_revert_all_keeps_named_untracked_files() {
        let tmp = TempDir::new().unwrap();
        init_test_repo(&tmp);

        fs::write(tmp.path().join("lib.py"), "broken\n").unwrap();
        fs::write(tmp.path().join("journal.md"), "# Gardener Journal\n").unwrap();
        fs::write(tmp.path().join("junk.py"), "junk\n").unwrap();

        revert_all(tmp.path(), &["journal.md"]).unwrap();

        let content = fs::read_to_string(tmp.path().join("journal.md")).unwrap();
        assert_eq!(content, "# Gardener Journal\n");
        assert!(!tmp.path().join("junk.py").exists());
        let content = fs::read_to_string(tmp.path().join("lib.py")).unwrap();
        assert_eq!(content, "def f():\n    return 1\n");
    }

    #[test]
    fn test_revert_all_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        init_test_repo(&tmp);
        fs::write(tmp.path().join("lib.py"), "broken\n").unwrap();

        revert_all(tmp.path(), &[]).unwrap();
        revert_all(tmp.path(), &[]).unwrap();

        assert!(changed_files(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_commit_file_stages_only_the_named_file() {
        let tmp = TempDir::new().unwrap();
        init_test_repo(&tmp);

        fs::write(tmp.path().join("lib.py"), "def f():\n    return 2\n").unwrap();
        fs::write(tmp.path().join("other.py"), "pass\n").unwrap();

        let sha = commit_file(tmp.path(), "lib.py", "refactor: test").unwrap();
        assert!(!sha.is_empty());

        // The other file is still uncommitted
        let changed = changed_files(tmp.path()).unwrap();
        assert_eq!(changed, vec!["other.py".to_string()]);
    }
}
