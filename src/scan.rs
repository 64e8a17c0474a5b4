use crate::domain::RepositoryPath;
use crate::error::{Result, ScanError};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Name of the metadata directory that marks a repository root
pub const METADATA_DIR: &str = ".git";

/// Check whether `dir` directly contains a `.git` directory.
///
/// A probe target that vanished or is not reachable because of permissions
/// counts as "not a repository"; anything else is returned as an error.
pub fn is_repository_root(dir: &Path) -> io::Result<bool> {
    match fs::metadata(dir.join(METADATA_DIR)) {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if is_benign_probe_error(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_benign_probe_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory | io::ErrorKind::PermissionDenied
    )
}

/// Resolve the scan root to an absolute path without touching the filesystem.
///
/// `.` and `..` components are collapsed lexically; symlinks are kept as given.
pub fn resolve_root(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|source| ScanError::InvalidRoot {
        path: path.to_path_buf(),
        source,
    })?;

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            // `pop` is a no-op at the root, matching `/..` == `/`
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    Ok(resolved)
}

/// Walk `base_path` depth-first in lexical order and return every repository root.
///
/// Discovered repositories are not descended into. Unreadable directories are
/// skipped; any other I/O failure aborts the scan.
pub fn find_repositories<P: AsRef<Path>>(base_path: P) -> Result<Vec<RepositoryPath>> {
    let base_path = base_path.as_ref();
    let mut repositories = Vec::new();

    let mut walker = WalkDir::new(base_path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| base_path.to_path_buf());
                let depth = err.depth();
                match err.into_io_error() {
                    Some(io_err) if io_err.kind() == io::ErrorKind::PermissionDenied => {
                        debug!("Skipping unreadable directory {}", path.display());
                        continue;
                    }
                    // Removed while we were walking; the root itself must exist
                    Some(io_err) if io_err.kind() == io::ErrorKind::NotFound && depth > 0 => {
                        debug!("Skipping vanished path {}", path.display());
                        continue;
                    }
                    Some(io_err) => return Err(ScanError::Traversal { path, source: io_err }),
                    None => {
                        return Err(ScanError::Traversal {
                            path,
                            source: io::Error::other("filesystem loop detected"),
                        });
                    }
                }
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        let is_repo = is_repository_root(entry.path()).map_err(|source| ScanError::Traversal {
            path: entry.path().join(METADATA_DIR),
            source,
        })?;

        if is_repo {
            debug!("Found repository at {}", entry.path().display());
            repositories.push(RepositoryPath::new(entry.path()));
            walker.skip_current_dir();
        }
    }

    info!(
        "Discovered {} repositories under {}",
        repositories.len(),
        base_path.display()
    );
    Ok(repositories)
}
