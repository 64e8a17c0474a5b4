use crate::domain::{RepoError, RepositoryPath, StaleReason};
use std::io::{self, Write};

/// Header that separates stale repositories from the error block
pub const ERRORS_HEADER: &str = "=========ERRORS========";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleEntry {
    pub path: RepositoryPath,
    pub reason: StaleReason,
}

/// Outcome of a whole run, ordered by discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub checked: usize,
    pub up_to_date: usize,
    pub stale: Vec<StaleEntry>,
    pub errors: Vec<RepoError>,
}

impl Report {
    pub fn is_all_up_to_date(&self) -> bool {
        self.stale.is_empty() && self.errors.is_empty()
    }

    pub fn stale_paths(&self) -> Vec<&RepositoryPath> {
        self.stale.iter().map(|s| &s.path).collect()
    }
}

/// Write one stale repository line
pub fn write_stale<W: Write>(out: &mut W, entry: &StaleEntry, verbose: bool) -> io::Result<()> {
    if verbose {
        writeln!(out, "{} ({})", entry.path, entry.reason)
    } else {
        writeln!(out, "{}", entry.path)
    }
}

/// Write the end-of-run error block
pub fn write_errors<W: Write>(
    out: &mut W,
    errors: &[RepoError],
    skip_if_empty: bool,
) -> io::Result<()> {
    if errors.is_empty() && skip_if_empty {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "{}", ERRORS_HEADER)?;
    for err in errors {
        writeln!(out, "{}", err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn render<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_write_stale() {
        let entry = StaleEntry {
            path: RepositoryPath::new("/repos/b"),
            reason: StaleReason { local_only_commits: 0, dirty: true },
        };
        assert_eq!(render(|out| write_stale(out, &entry, false)), "/repos/b\n");
        assert_eq!(
            render(|out| write_stale(out, &entry, true)),
            "/repos/b (uncommitted changes)\n"
        );
    }

    #[test]
    fn test_write_errors_block() {
        let errors = vec![RepoError {
            path: RepositoryPath::new("/repos/c"),
            kind: ErrorKind::NoRemotes,
            message: "repository has no remotes configured".to_string(),
        }];
        assert_eq!(
            render(|out| write_errors(out, &errors, false)),
            format!(
                "\n{}\n/repos/c: no remotes: repository has no remotes configured\n",
                ERRORS_HEADER
            )
        );
    }

    #[test]
    fn test_empty_error_block() {
        assert_eq!(
            render(|out| write_errors(out, &[], false)),
            "\n=========ERRORS========\n"
        );
        assert_eq!(render(|out| write_errors(out, &[], true)), "");
    }

    #[test]
    fn test_report_all_up_to_date() {
        let report = Report {
            checked: 2,
            up_to_date: 2,
            ..Report::default()
        };
        assert!(report.is_all_up_to_date());
        assert!(report.stale_paths().is_empty());
    }
}
