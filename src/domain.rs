use crate::error::ErrorKind;
use std::fmt;
use std::path::{Path, PathBuf};

/// Absolute path of a directory that holds a `.git` directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryPath(PathBuf);

impl RepositoryPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for RepositoryPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RepositoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Names of the remotes configured for a repository, in configuration order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteSet(Vec<String>);

impl RemoteSet {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Remotes in the order a branch's remote-tracking counterpart is searched:
    /// the configured upstream remote, then `origin`, then everything else.
    pub fn lookup_order<'a>(&'a self, upstream: Option<&'a str>) -> Vec<&'a str> {
        let mut order: Vec<&str> = Vec::with_capacity(self.0.len());
        if let Some(up) = upstream.filter(|u| self.contains(u)) {
            order.push(up);
        }
        if self.contains("origin") && !order.contains(&"origin") {
            order.push("origin");
        }
        for name in self.iter() {
            if !order.contains(&name) {
                order.push(name);
            }
        }
        order
    }
}

impl FromIterator<String> for RemoteSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What HEAD points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    Branch(String),
    /// Branch exists in HEAD but has no commits yet
    Unborn(String),
    Detached,
}

/// Relationship between the current branch and its remote-tracking counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    NoRemoteCounterpart,
    InSync,
    LocalAhead { ahead: usize },
    Behind { behind: usize },
    Diverged { ahead: usize, behind: usize },
}

impl Divergence {
    pub fn from_counts(ahead: usize, behind: usize) -> Self {
        match (ahead, behind) {
            (0, 0) => Divergence::InSync,
            (ahead, 0) => Divergence::LocalAhead { ahead },
            (0, behind) => Divergence::Behind { behind },
            (ahead, behind) => Divergence::Diverged { ahead, behind },
        }
    }

    pub fn has_local_only_commits(&self) -> bool {
        matches!(self, Divergence::LocalAhead { .. } | Divergence::Diverged { .. })
    }

    pub fn local_only_commits(&self) -> usize {
        match self {
            Divergence::LocalAhead { ahead } | Divergence::Diverged { ahead, .. } => *ahead,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeCleanliness {
    Clean,
    Dirty,
}

impl TreeCleanliness {
    pub fn is_clean(&self) -> bool {
        matches!(self, TreeCleanliness::Clean)
    }
}

/// Why a repository was judged stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleReason {
    pub local_only_commits: usize,
    pub dirty: bool,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.local_only_commits, self.dirty) {
            (0, true) => write!(f, "uncommitted changes"),
            (n, false) => write!(f, "{} unpushed commit(s)", n),
            (n, true) => write!(f, "{} unpushed commit(s), uncommitted changes", n),
        }
    }
}

/// A failure scoped to one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoError {
    pub path: RepositoryPath,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.path, self.kind, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoVerdict {
    UpToDate,
    Stale(StaleReason),
    Error(RepoError),
}

impl RepoVerdict {
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, RepoVerdict::UpToDate)
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, RepoVerdict::Stale(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            RepoVerdict::Error(e) => Some(e.kind),
            _ => None,
        }
    }
}
