//! Git plumbing for per-job worktrees.
//!
//! Every reviewed project is materialised the same way: init an empty repo,
//! add a single `origin` remote, fetch exactly the requested revision
//! (shallow when `depth` is set) and check it out detached. Network fetches
//! are wrapped in the bounded backoff from [`crate::backoff`].

use std::path::Path;
use std::time::Duration;

use git2::build::CheckoutBuilder;
use git2::{AutotagOption, FetchOptions, Repository};
use thiserror::Error;
use tracing::debug;

use crate::backoff::{DEFAULT_TRIES, DEFAULT_UNIT, retry_sync};

pub type GitResult<T> = Result<T, GitError>;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Materialises `revision` from `url` into `dir`.
///
/// `revision` may be a branch name or a commit sha; the remote must allow
/// fetching it directly. `depth = Some(1)` produces a shallow worktree.
pub fn fetch_checkout(dir: &Path, url: &str, revision: &str, depth: Option<i32>) -> GitResult<()> {
    fetch_checkout_with_backoff(dir, url, revision, depth, DEFAULT_TRIES, DEFAULT_UNIT)
}

/// Same as [`fetch_checkout`] with explicit retry parameters.
pub fn fetch_checkout_with_backoff(
    dir: &Path,
    url: &str,
    revision: &str,
    depth: Option<i32>,
    tries: u32,
    unit: Duration,
) -> GitResult<()> {
    std::fs::create_dir_all(dir)?;
    let repo = Repository::init(dir)?;

    retry_sync("git fetch", tries, unit, || fetch(&repo, url, revision, depth))?;

    let fetched = repo.revparse_single("FETCH_HEAD")?;
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(&fetched, Some(&mut checkout))?;
    repo.set_head_detached(fetched.id())?;

    debug!("checked out {} at {}", url, fetched.id());

    Ok(())
}

/// Returns the sha of HEAD in `dir`.
pub fn head_revision(dir: &Path) -> GitResult<String> {
    let repo = Repository::open(dir)?;
    let head = repo.head()?.peel_to_commit()?;
    Ok(head.id().to_string())
}

fn fetch(repo: &Repository, url: &str, revision: &str, depth: Option<i32>) -> GitResult<()> {
    let mut remote = match repo.find_remote("origin") {
        Ok(remote) => remote,
        Err(_) => repo.remote("origin", url)?,
    };

    let mut opts = FetchOptions::new();
    opts.download_tags(AutotagOption::None);
    if let Some(depth) = depth {
        opts.depth(depth);
    }

    remote.fetch(&[revision], Some(&mut opts), None)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;

    fn seed_repo(dir: &Path) -> (Repository, String) {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join("file.txt"), "content").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("file.txt")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let branch = {
            let tree = repo.find_tree(tree_id).unwrap();
            let sig = Signature::now("test", "test@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "seed", &tree, &[])
                .unwrap();
            repo.head().unwrap().shorthand().unwrap().to_string()
        };
        (Repository::open(dir).unwrap(), branch)
    }

    #[test]
    fn fetch_checkout_materialises_remote_revision() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let (_, branch) = seed_repo(src.path());

        fetch_checkout_with_backoff(
            dst.path(),
            src.path().to_str().unwrap(),
            &branch,
            None,
            1,
            Duration::ZERO,
        )
        .unwrap();

        assert!(dst.path().join("file.txt").exists());
        assert_eq!(
            head_revision(dst.path()).unwrap(),
            head_revision(src.path()).unwrap()
        );
    }

    #[test]
    fn fetch_checkout_fails_for_unknown_revision() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        seed_repo(src.path());

        let res = fetch_checkout_with_backoff(
            dst.path(),
            src.path().to_str().unwrap(),
            "no-such-branch",
            None,
            1,
            Duration::ZERO,
        );
        assert!(res.is_err());
    }

    #[test]
    fn head_revision_fails_outside_a_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(head_revision(dir.path()).is_err());
    }
}
