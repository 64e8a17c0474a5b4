//! Implementations of [`GitPort`](crate::ports::GitPort)

pub mod git;
pub mod git_cli;

pub use git::Libgit2Backend;
pub use git_cli::GitCliBackend;
