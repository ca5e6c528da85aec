//! Source-control collaborator: head revision and changed files.

use std::path::Path;

use docscope_core::errors::RepositoryError;
use git2::{Delta, DiffFindOptions, Repository, StatusOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileChange {
    /// Repository-relative, `/`-separated.
    pub path: String,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadInfo {
    pub commit_id: String,
    pub branch: Option<String>,
    pub tag: Option<String>,
    /// No tracked file differs from the head commit.
    pub is_clean: bool,
}

pub trait SourceControl: Send + Sync {
    fn head(&self, root: &Path) -> Result<HeadInfo, RepositoryError>;

    /// Files changed between two commits. Renames are reported as a
    /// deletion of the old path plus an addition of the new one.
    fn changed_files(&self, root: &Path, from: &str, to: &str) -> Result<Vec<FileChange>, RepositoryError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GitSourceControl;

fn git_error(root: &Path, e: git2::Error) -> RepositoryError {
    RepositoryError::SourceControl {
        repository: root.display().to_string(),
        message: e.message().to_string(),
    }
}

fn path_string(path: Option<&Path>) -> Option<String> {
    path.map(|p| {
        p.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    })
}

impl SourceControl for GitSourceControl {
    fn head(&self, root: &Path) -> Result<HeadInfo, RepositoryError> {
        let err = |e| git_error(root, e);
        let repo = Repository::open(root).map_err(err)?;
        let head = repo.head().map_err(err)?;
        let commit = head.peel_to_commit().map_err(err)?;
        let branch = if head.is_branch() {
            head.shorthand().map(str::to_string)
        } else {
            None
        };

        let mut tag = None;
        if let Ok(names) = repo.tag_names(None) {
            for name in names.iter().flatten() {
                let target = repo
                    .revparse_single(&format!("refs/tags/{name}"))
                    .and_then(|o| o.peel_to_commit());
                if target.is_ok_and(|c| c.id() == commit.id()) {
                    tag = Some(name.to_string());
                    break;
                }
            }
        }

        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let is_clean = repo.statuses(Some(&mut options)).map_err(err)?.is_empty();

        Ok(HeadInfo {
            commit_id: commit.id().to_string(),
            branch,
            tag,
            is_clean,
        })
    }

    fn changed_files(&self, root: &Path, from: &str, to: &str) -> Result<Vec<FileChange>, RepositoryError> {
        let err = |e| git_error(root, e);
        let repo = Repository::open(root).map_err(err)?;
        let old = repo.revparse_single(from).and_then(|o| o.peel_to_tree()).map_err(err)?;
        let new = repo.revparse_single(to).and_then(|o| o.peel_to_tree()).map_err(err)?;
        let mut diff = repo.diff_tree_to_tree(Some(&old), Some(&new), None).map_err(err)?;
        diff.find_similar(Some(DiffFindOptions::new().renames(true))).map_err(err)?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let old_path = path_string(delta.old_file().path());
            let new_path = path_string(delta.new_file().path());
            match delta.status() {
                Delta::Added | Delta::Copied => changes.extend(new_path.map(|p| FileChange::new(p, ChangeKind::Added))),
                Delta::Deleted => changes.extend(old_path.map(|p| FileChange::new(p, ChangeKind::Deleted))),
                Delta::Modified | Delta::Typechange => {
                    changes.extend(new_path.map(|p| FileChange::new(p, ChangeKind::Modified)))
                }
                Delta::Renamed => {
                    changes.extend(old_path.map(|p| FileChange::new(p, ChangeKind::Deleted)));
                    changes.extend(new_path.map(|p| FileChange::new(p, ChangeKind::Added)));
                }
                _ => {}
            }
        }
        tracing::debug!(from, to, changes = changes.len(), "diffed revisions");
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Signature, Time};
    use std::fs;

    fn commit_all(repo: &Repository, message: &str) -> git2::Oid {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::new("dev", "dev@example.com", &Time::new(1_700_000_000, 0)).unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    #[test]
    fn head_and_changed_files_split_renames() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let body = "namespace Shop { public class Order { public string Id { get; set; } public decimal Total { get; set; } } }";
        fs::write(dir.path().join("Order.cs"), body).unwrap();
        fs::write(dir.path().join("Customer.cs"), "class Customer { public string Id { get; set; } }").unwrap();
        fs::write(dir.path().join("Gone.cs"), "class Gone { public string Id { get; set; } }").unwrap();
        let first = commit_all(&repo, "initial");

        fs::rename(dir.path().join("Order.cs"), dir.path().join("PurchaseOrder.cs")).unwrap();
        fs::write(dir.path().join("Customer.cs"), "class Customer { public string Id { get; set; } public string Email { get; set; } }").unwrap();
        fs::remove_file(dir.path().join("Gone.cs")).unwrap();
        let second = commit_all(&repo, "rename");

        let git = GitSourceControl;
        let head = git.head(dir.path()).unwrap();
        assert_eq!(head.commit_id, second.to_string());
        assert!(head.is_clean);

        let mut changes = git
            .changed_files(dir.path(), &first.to_string(), &second.to_string())
            .unwrap();
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(
            changes,
            vec![
                FileChange::new("Customer.cs", ChangeKind::Modified),
                FileChange::new("Gone.cs", ChangeKind::Deleted),
                FileChange::new("Order.cs", ChangeKind::Deleted),
                FileChange::new("PurchaseOrder.cs", ChangeKind::Added),
            ]
        );
    }

    #[test]
    fn not_a_repository_is_a_source_control_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitSourceControl.head(dir.path()).unwrap_err();
        assert!(matches!(err, RepositoryError::SourceControl { .. }));
    }
}
