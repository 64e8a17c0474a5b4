use crate::domain::{Divergence, HeadState, RemoteSet, TreeCleanliness};
use crate::ports::GitPort;
use anyhow::{Context, Result, bail};
use crossbeam_channel::RecvTimeoutError;
use git2::{
    Cred, ErrorCode, FetchOptions, RemoteCallbacks, Repository as GitRepository, StatusOptions,
};
use std::cell::Cell;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// libgit2 asks again after a rejected credential; give up after this many tries
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

/// Apply `timeout` to libgit2's socket connect and read operations.
///
/// These are process-wide libgit2 settings, so this must run once at startup
/// before any thread that uses libgit2 is spawned.
pub fn set_network_timeouts(timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Ok(());
    }
    let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    // SAFETY: libgit2 reads these globals without synchronization; callers
    // guarantee no other thread is using libgit2 yet.
    unsafe {
        git2::opts::set_server_connect_timeout_in_milliseconds(millis)
            .context("Failed to set libgit2 connect timeout")?;
        git2::opts::set_server_timeout_in_milliseconds(millis)
            .context("Failed to set libgit2 server timeout")?;
    }
    Ok(())
}

/// Git adapter that implements GitPort using git2
#[derive(Debug, Clone)]
pub struct Libgit2Backend {
    fetch_timeout: Duration,
}

impl Libgit2Backend {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self { fetch_timeout }
    }

    fn open_repo(&self, path: &Path) -> Result<GitRepository> {
        GitRepository::open(path)
            .with_context(|| format!("Failed to open git repository at {}", path.display()))
    }

    /// Fetch every remote in order, stopping at the first failure
    fn fetch_all(&self, repo: &Path, remotes: &[String], deadline: Instant) -> Result<()> {
        let git_repo = self.open_repo(repo)?;
        for name in remotes {
            debug!("Fetching '{}' in {}", name, repo.display());
            self.fetch_remote(&git_repo, name, deadline)?;
        }
        Ok(())
    }

    fn fetch_remote(&self, git_repo: &GitRepository, name: &str, deadline: Instant) -> Result<()> {
        if Instant::now() >= deadline {
            bail!(
                "fetch timed out after {}s before reaching remote '{}'",
                self.fetch_timeout.as_secs(),
                name
            );
        }

        let mut remote = git_repo
            .find_remote(name)
            .with_context(|| format!("Remote '{}' not found", name))?;

        let config = git_repo.config().ok();
        let expired = Cell::new(false);
        let mut attempts = 0;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(|url, username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("no usable credentials"));
            }
            if allowed.is_ssh_key()
                && let Some(user) = username_from_url
            {
                return Cred::ssh_key_from_agent(user);
            }
            if allowed.is_user_pass_plaintext()
                && let Some(cfg) = config.as_ref()
                && let Ok(cred) = Cred::credential_helper(cfg, url, username_from_url)
            {
                return Ok(cred);
            }
            Cred::default()
        });
        callbacks.transfer_progress(|stats| {
            if Instant::now() >= deadline {
                expired.set(true);
                return false;
            }
            if stats.total_objects() > 0 {
                debug!(
                    "Received {}/{} objects",
                    stats.received_objects(),
                    stats.total_objects()
                );
            }
            true
        });
        callbacks.sideband_progress(|_| {
            if Instant::now() >= deadline {
                expired.set(true);
                return false;
            }
            true
        });

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);

        match remote.fetch(&[] as &[&str], Some(&mut fetch_options), None) {
            Ok(()) => Ok(()),
            Err(_) if expired.get() => bail!(
                "fetch from '{}' timed out after {}s",
                name,
                self.fetch_timeout.as_secs()
            ),
            Err(e) => Err(e).with_context(|| format!("Failed to fetch from remote '{}'", name)),
        }
    }
}

impl GitPort for Libgit2Backend {
    fn list_remotes(&self, repo: &Path) -> Result<RemoteSet> {
        let git_repo = self.open_repo(repo)?;
        let remotes = git_repo.remotes().context("Failed to list remotes")?;
        Ok(remotes.iter().flatten().map(str::to_string).collect())
    }

    fn refresh_remotes(&self, repo: &Path, remotes: &RemoteSet) -> Result<()> {
        let deadline = Instant::now() + self.fetch_timeout;

        // libgit2 can block in a socket read where no callback fires; the fetch
        // thread is abandoned at the deadline.
        let worker = self.clone();
        let path = repo.to_path_buf();
        let names: Vec<String> = remotes.iter().map(str::to_string).collect();
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::Builder::new()
            .name("rck-fetch".to_string())
            .spawn(move || {
                let _ = tx.send(worker.fetch_all(&path, &names, deadline));
            })
            .context("Failed to start fetch thread")?;

        match rx.recv_deadline(deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                debug!(
                    "Fetch in {} still running after {}s, abandoning it",
                    repo.display(),
                    self.fetch_timeout.as_secs()
                );
                bail!("fetch timed out after {}s", self.fetch_timeout.as_secs())
            }
            Err(RecvTimeoutError::Disconnected) => bail!("fetch thread exited without a result"),
        }
    }

    fn current_branch(&self, repo: &Path) -> Result<HeadState> {
        let git_repo = self.open_repo(repo)?;

        match git_repo.head() {
            Ok(reference) => {
                if reference.is_branch() {
                    let name = reference
                        .shorthand()
                        .context("Branch name is not valid UTF-8")?;
                    Ok(HeadState::Branch(name.to_string()))
                } else {
                    Ok(HeadState::Detached)
                }
            }
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                let head = git_repo
                    .find_reference("HEAD")
                    .context("Failed to read HEAD")?;
                let target = head.symbolic_target().unwrap_or("HEAD");
                let name = target.strip_prefix("refs/heads/").unwrap_or(target);
                Ok(HeadState::Unborn(name.to_string()))
            }
            Err(e) => Err(e).context("Failed to resolve HEAD"),
        }
    }

    fn divergence(&self, repo: &Path, branch: &str, remotes: &RemoteSet) -> Result<Divergence> {
        let git_repo = self.open_repo(repo)?;

        let local_ref = format!("refs/heads/{}", branch);
        let local_oid = git_repo
            .refname_to_id(&local_ref)
            .with_context(|| format!("Failed to resolve {}", local_ref))?;

        let upstream_remote = git_repo
            .branch_upstream_remote(&local_ref)
            .ok()
            .and_then(|buf| buf.as_str().map(str::to_string));

        for remote in remotes.lookup_order(upstream_remote.as_deref()) {
            let tracking_ref = format!("refs/remotes/{}/{}", remote, branch);
            match git_repo.refname_to_id(&tracking_ref) {
                Ok(remote_oid) => {
                    let (ahead, behind) = git_repo
                        .graph_ahead_behind(local_oid, remote_oid)
                        .context("Failed to calculate ahead/behind counts")?;
                    debug!(
                        "{} vs {}: ahead {}, behind {}",
                        local_ref, tracking_ref, ahead, behind
                    );
                    return Ok(Divergence::from_counts(ahead, behind));
                }
                Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => {
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to resolve {}", tracking_ref));
                }
            }
        }

        Ok(Divergence::NoRemoteCounterpart)
    }

    fn tree_cleanliness(&self, repo: &Path) -> Result<TreeCleanliness> {
        let git_repo = self.open_repo(repo)?;

        let mut status_options = StatusOptions::new();
        status_options.include_untracked(true);
        status_options.include_ignored(false);

        let statuses = git_repo
            .statuses(Some(&mut status_options))
            .context("Failed to get git status")?;

        if statuses.is_empty() {
            Ok(TreeCleanliness::Clean)
        } else {
            Ok(TreeCleanliness::Dirty)
        }
    }
}
