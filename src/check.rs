//! Per-repository status protocol.
//!
//! A check walks `Start → RemotesChecked → Fetched → DivergenceComputed →
//! TreeChecked` and stops at the first failing step, which becomes the
//! repository's error.

use crate::domain::{
    Divergence, HeadState, RepoError, RepoVerdict, RepositoryPath, StaleReason,
};
use crate::error::ErrorKind;
use crate::ports::GitPort;
use tracing::debug;

/// Run the status protocol for one repository
pub fn check_repository(port: &dyn GitPort, repo: &RepositoryPath) -> RepoVerdict {
    match run_protocol(port, repo) {
        Ok(verdict) => verdict,
        Err(err) => {
            debug!("{}: {} ({})", repo, err.kind, err.message);
            RepoVerdict::Error(err)
        }
    }
}

fn run_protocol(port: &dyn GitPort, repo: &RepositoryPath) -> Result<RepoVerdict, RepoError> {
    let path = repo.as_path();
    let fail = move |kind: ErrorKind| {
        move |err: anyhow::Error| RepoError {
            path: repo.clone(),
            kind,
            message: format!("{:#}", err),
        }
    };

    let remotes = port
        .list_remotes(path)
        .map_err(fail(ErrorKind::RemoteQueryFailed))?;
    if remotes.is_empty() {
        return Err(RepoError {
            path: repo.clone(),
            kind: ErrorKind::NoRemotes,
            message: "repository has no remotes configured".to_string(),
        });
    }
    debug!("{}: remotes checked ({} configured)", repo, remotes.len());

    port.refresh_remotes(path, &remotes)
        .map_err(fail(ErrorKind::FetchFailed))?;
    debug!("{}: fetched", repo);

    let divergence = match port
        .current_branch(path)
        .map_err(fail(ErrorKind::BranchQueryFailed))?
    {
        HeadState::Branch(branch) => port
            .divergence(path, &branch, &remotes)
            .map_err(fail(ErrorKind::BranchQueryFailed))?,
        HeadState::Detached | HeadState::Unborn(_) => Divergence::NoRemoteCounterpart,
    };
    debug!("{}: divergence computed: {:?}", repo, divergence);

    let tree = port
        .tree_cleanliness(path)
        .map_err(fail(ErrorKind::TreeStatusQueryFailed))?;
    debug!("{}: tree checked: {:?}", repo, tree);

    if !divergence.has_local_only_commits() && tree.is_clean() {
        Ok(RepoVerdict::UpToDate)
    } else {
        Ok(RepoVerdict::Stale(StaleReason {
            local_only_commits: divergence.local_only_commits(),
            dirty: !tree.is_clean(),
        }))
    }
}
