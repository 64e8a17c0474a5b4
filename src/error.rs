use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole scan
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to traverse {}: {source}", path.display())]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scan root {}: {source}", path.display())]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Classification of a failure scoped to a single repository
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    #[error("failed to list remotes")]
    RemoteQueryFailed,

    #[error("no remotes")]
    NoRemotes,

    #[error("fetch failed")]
    FetchFailed,

    #[error("branch query failed")]
    BranchQueryFailed,

    #[error("tree status query failed")]
    TreeStatusQueryFailed,
}

pub type Result<T> = std::result::Result<T, ScanError>;
