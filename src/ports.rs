use crate::domain::{Divergence, HeadState, RemoteSet, TreeCleanliness};
use anyhow::Result;
use std::path::Path;

/// Port for the version-control queries the status check depends on.
///
/// Every call receives the repository root explicitly, so implementations must
/// not rely on (or change) the process working directory.
pub trait GitPort: Send + Sync {
    /// List the remotes configured for the repository
    fn list_remotes(&self, repo: &Path) -> Result<RemoteSet>;

    /// Refresh remote-tracking refs from every remote
    fn refresh_remotes(&self, repo: &Path, remotes: &RemoteSet) -> Result<()>;

    /// Resolve what HEAD currently points at
    fn current_branch(&self, repo: &Path) -> Result<HeadState>;

    /// Compare a local branch with its remote-tracking counterpart.
    /// Candidate remotes are tried in [`RemoteSet::lookup_order`].
    fn divergence(&self, repo: &Path, branch: &str, remotes: &RemoteSet) -> Result<Divergence>;

    /// Report whether the working tree and index have pending changes
    fn tree_cleanliness(&self, repo: &Path) -> Result<TreeCleanliness>;
}
