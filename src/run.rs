use crate::check::check_repository;
use crate::domain::{RepoError, RepoVerdict, RepositoryPath};
use crate::error::Result;
use crate::ports::GitPort;
use crate::report::{Report, StaleEntry};
use crate::scan::find_repositories;
use std::path::Path;
use tracing::{info, warn};

/// Accumulates verdicts from any completion order into a deterministic report
#[derive(Default)]
struct Collector {
    up_to_date: usize,
    stale: Vec<(usize, StaleEntry)>,
    errors: Vec<(usize, RepoError)>,
}

impl Collector {
    fn record<F>(
        &mut self,
        index: usize,
        repo: &RepositoryPath,
        verdict: RepoVerdict,
        on_stale: &mut F,
    ) where
        F: FnMut(&StaleEntry),
    {
        match verdict {
            RepoVerdict::UpToDate => self.up_to_date += 1,
            RepoVerdict::Stale(reason) => {
                let entry = StaleEntry {
                    path: repo.clone(),
                    reason,
                };
                on_stale(&entry);
                self.stale.push((index, entry));
            }
            RepoVerdict::Error(err) => self.errors.push((index, err)),
        }
    }

    fn finish(mut self, checked: usize) -> Report {
        self.stale.sort_by_key(|(index, _)| *index);
        self.errors.sort_by_key(|(index, _)| *index);
        Report {
            checked,
            up_to_date: self.up_to_date,
            stale: self.stale.into_iter().map(|(_, e)| e).collect(),
            errors: self.errors.into_iter().map(|(_, e)| e).collect(),
        }
    }
}

/// Discover every repository under `root` and check each one.
///
/// `on_stale` is called on the calling thread as soon as a stale repository is
/// known. Only a failed directory walk is returned as an error; per-repository
/// failures end up in [`Report::errors`].
pub fn run<F>(root: &Path, port: &dyn GitPort, jobs: usize, mut on_stale: F) -> Result<Report>
where
    F: FnMut(&StaleEntry),
{
    let repos = find_repositories(root)?;
    let mut collector = Collector::default();

    if jobs > 1 && repos.len() > 1 {
        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => {
                info!("Checking {} repositories with {} workers", repos.len(), jobs);
                let (sender, receiver) = crossbeam_channel::unbounded();
                pool.in_place_scope(|scope| {
                    for (index, repo) in repos.iter().enumerate() {
                        let sender = sender.clone();
                        scope.spawn(move |_| {
                            let verdict = check_repository(port, repo);
                            // Receiver outlives the scope, so this cannot fail
                            let _ = sender.send((index, verdict));
                        });
                    }
                    drop(sender);

                    for (index, verdict) in receiver.iter() {
                        collector.record(index, &repos[index], verdict, &mut on_stale);
                    }
                });
                return Ok(collector.finish(repos.len()));
            }
            Err(e) => warn!("Failed to start worker pool, checking sequentially: {}", e),
        }
    }

    for (index, repo) in repos.iter().enumerate() {
        info!("Checking {}", repo);
        let verdict = check_repository(port, repo);
        collector.record(index, repo, verdict, &mut on_stale);
    }
    Ok(collector.finish(repos.len()))
}
