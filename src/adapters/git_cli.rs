use crate::domain::{Divergence, HeadState, RemoteSet, TreeCleanliness};
use crate::ports::GitPort;
use anyhow::{Context, Result, bail};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// Git adapter that runs the `git` executable.
///
/// Only machine-readable output forms are used (`--porcelain`, `--count`,
/// `--verify`), and every command runs with the repository as an explicit
/// working directory and a hard timeout.
#[derive(Debug, Clone)]
pub struct GitCliBackend {
    program: PathBuf,
    timeout: Duration,
}

impl GitCliBackend {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("git"),
            timeout,
        }
    }

    /// Use a specific git executable instead of the one on `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Check that the configured executable can be run at all
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn command(&self, repo: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(repo)
            // Never block on an interactive credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C");
        // Own process group, so helpers like ssh or git-remote-https die with git
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    /// Run a git command, killing it if it outlives the timeout
    fn run(&self, repo: &Path, args: &[&str]) -> Result<Output> {
        debug!("git {} (in {})", args.join(" "), repo.display());

        let mut child = self
            .command(repo, args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program.display()))?;

        // Drain pipes on separate threads so a chatty child can't fill a buffer and stall
        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();
        let stdout_thread = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(ref mut handle) = stdout_handle {
                let _ = handle.read_to_end(&mut buf);
            }
            buf
        });
        let stderr_thread = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(ref mut handle) = stderr_handle {
                let _ = handle.read_to_end(&mut buf);
            }
            buf
        });

        let status = match child
            .wait_timeout(self.timeout)
            .context("Failed to wait for git")?
        {
            Some(status) => status,
            None => {
                kill_process_tree(&mut child);
                // Readers are detached; a surviving descendant may still hold the pipes
                drop(stdout_thread);
                drop(stderr_thread);
                bail!(
                    "git {} timed out after {}s",
                    args.join(" "),
                    self.timeout.as_secs()
                );
            }
        };

        Ok(Output {
            status,
            stdout: stdout_thread.join().unwrap_or_default(),
            stderr: stderr_thread.join().unwrap_or_default(),
        })
    }

    /// Run a git command that must succeed and return its trimmed stdout
    fn run_ok(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let output = self.run(repo, args)?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Whether a fully-qualified ref exists
    fn ref_exists(&self, repo: &Path, refname: &str) -> Result<bool> {
        let output = self.run(repo, &["rev-parse", "--verify", "--quiet", refname])?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => bail!(
                "git rev-parse --verify {} failed: {}",
                refname,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }
}

/// Kill a timed-out child together with everything it spawned
fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Ok(pgid) = i32::try_from(child.id())
            && let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL)
        {
            debug!("killpg({}) failed: {}", pgid, e);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Parse the `<left>\t<right>` output of `git rev-list --left-right --count`
fn parse_left_right_count(output: &str) -> Result<(usize, usize)> {
    let mut parts = output.split_whitespace();
    let (Some(left), Some(right), None) = (parts.next(), parts.next(), parts.next()) else {
        bail!("unexpected rev-list output: {:?}", output);
    };
    let ahead = left
        .parse()
        .with_context(|| format!("invalid ahead count {:?}", left))?;
    let behind = right
        .parse()
        .with_context(|| format!("invalid behind count {:?}", right))?;
    Ok((ahead, behind))
}

impl GitPort for GitCliBackend {
    fn list_remotes(&self, repo: &Path) -> Result<RemoteSet> {
        let stdout = self.run_ok(repo, &["remote"])?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn refresh_remotes(&self, repo: &Path, remotes: &RemoteSet) -> Result<()> {
        let mut args = vec!["fetch", "--quiet", "--multiple"];
        args.extend(remotes.iter());
        self.run_ok(repo, &args)?;
        Ok(())
    }

    fn current_branch(&self, repo: &Path) -> Result<HeadState> {
        let output = self.run(repo, &["symbolic-ref", "--quiet", "HEAD"])?;
        match output.status.code() {
            Some(0) => {}
            // HEAD is not a symbolic ref
            Some(1) => return Ok(HeadState::Detached),
            _ => bail!(
                "git symbolic-ref HEAD failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }

        let target = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let name = target
            .strip_prefix("refs/heads/")
            .unwrap_or(&target)
            .to_string();

        if self.ref_exists(repo, &target)? {
            Ok(HeadState::Branch(name))
        } else {
            Ok(HeadState::Unborn(name))
        }
    }

    fn divergence(&self, repo: &Path, branch: &str, remotes: &RemoteSet) -> Result<Divergence> {
        let local_ref = format!("refs/heads/{}", branch);

        let upstream_key = format!("branch.{}.remote", branch);
        let upstream_output = self.run(repo, &["config", "--get", &upstream_key])?;
        let upstream_remote = upstream_output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&upstream_output.stdout).trim().to_string());

        for remote in remotes.lookup_order(upstream_remote.as_deref()) {
            let tracking_ref = format!("refs/remotes/{}/{}", remote, branch);
            if !self.ref_exists(repo, &tracking_ref)? {
                continue;
            }

            let range = format!("{}...{}", local_ref, tracking_ref);
            let counts = self.run_ok(repo, &["rev-list", "--left-right", "--count", &range])?;
            let (ahead, behind) = parse_left_right_count(&counts)?;
            return Ok(Divergence::from_counts(ahead, behind));
        }

        Ok(Divergence::NoRemoteCounterpart)
    }

    fn tree_cleanliness(&self, repo: &Path) -> Result<TreeCleanliness> {
        let stdout = self.run_ok(repo, &["status", "--porcelain=v1", "--untracked-files=normal"])?;
        if stdout.is_empty() {
            Ok(TreeCleanliness::Clean)
        } else {
            Ok(TreeCleanliness::Dirty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Instant;
    use tempfile::TempDir;

    fn backend() -> Option<GitCliBackend> {
        let backend = GitCliBackend::new(Duration::from_secs(30));
        backend.is_available().then_some(backend)
    }

    fn commit_file(git_repo: &git2::Repository, name: &str) -> Result<()> {
        let workdir = git_repo.workdir().context("bare repository")?;
        fs::write(workdir.join(name), name)?;

        let mut index = git_repo.index()?;
        index.add_path(Path::new(name))?;
        index.write()?;
        let tree = git_repo.find_tree(index.write_tree()?)?;

        let signature = git2::Signature::now("Test User", "test@example.com")?;
        let parent = git_repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        git_repo.commit(Some("HEAD"), &signature, &signature, name, &tree, &parents)?;
        Ok(())
    }

    #[test]
    fn test_parse_left_right_count() -> Result<()> {
        assert_eq!(parse_left_right_count("3\t1")?, (3, 1));
        assert_eq!(parse_left_right_count("0\t0\n")?, (0, 0));
        assert!(parse_left_right_count("").is_err());
        assert!(parse_left_right_count("1 2 3").is_err());
        assert!(parse_left_right_count("x\t1").is_err());
        Ok(())
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let backend = GitCliBackend::new(Duration::from_secs(1))
            .with_program("/definitely/not/git-for-rck");
        assert!(!backend.is_available());
    }

    #[test]
    fn test_cli_queries_against_clone() -> Result<()> {
        let Some(backend) = backend() else {
            return Ok(());
        };

        let temp_dir = TempDir::new()?;
        let upstream_path = temp_dir.path().join("upstream");
        let upstream = git2::Repository::init(&upstream_path)?;
        commit_file(&upstream, "README.md")?;

        let clone_path = temp_dir.path().join("clone");
        let url = upstream_path.to_str().context("non UTF-8 temp path")?;
        let clone = git2::Repository::clone(url, &clone_path)?;

        let remotes = backend.list_remotes(&clone_path)?;
        assert_eq!(remotes, RemoteSet::new(vec!["origin".to_string()]));

        let branch = match backend.current_branch(&clone_path)? {
            HeadState::Branch(name) => name,
            other => panic!("unexpected head state {:?}", other),
        };
        assert_eq!(
            backend.divergence(&clone_path, &branch, &remotes)?,
            Divergence::InSync
        );
        assert_eq!(backend.tree_cleanliness(&clone_path)?, TreeCleanliness::Clean);

        commit_file(&clone, "local.txt")?;
        commit_file(&upstream, "remote.txt")?;
        backend.refresh_remotes(&clone_path, &remotes)?;
        assert_eq!(
            backend.divergence(&clone_path, &branch, &remotes)?,
            Divergence::Diverged { ahead: 1, behind: 1 }
        );

        fs::write(clone_path.join("scratch.txt"), "notes")?;
        assert_eq!(backend.tree_cleanliness(&clone_path)?, TreeCleanliness::Dirty);
        Ok(())
    }

    #[test]
    fn test_cli_no_remotes_and_detached() -> Result<()> {
        let Some(backend) = backend() else {
            return Ok(());
        };

        let temp_dir = TempDir::new()?;
        let git_repo = git2::Repository::init(temp_dir.path())?;
        assert!(backend.list_remotes(temp_dir.path())?.is_empty());

        commit_file(&git_repo, "README.md")?;
        let head = git_repo.head()?.peel_to_commit()?;
        git_repo.set_head_detached(head.id())?;
        assert_eq!(backend.current_branch(temp_dir.path())?, HeadState::Detached);
        Ok(())
    }

    #[test]
    fn test_cli_fetch_failure_is_an_error() -> Result<()> {
        let Some(backend) = backend() else {
            return Ok(());
        };

        let temp_dir = TempDir::new()?;
        let git_repo = git2::Repository::init(temp_dir.path())?;
        git_repo.remote("origin", "/nowhere/at/all.git")?;

        let remotes = backend.list_remotes(temp_dir.path())?;
        assert!(backend.refresh_remotes(temp_dir.path(), &remotes).is_err());
        Ok(())
    }

    /// Stand-in `git` that lists one remote and hangs on everything else.
    /// `sh` forks `sleep`, which inherits the output pipes.
    #[cfg(unix)]
    fn hanging_git(dir: &Path) -> Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("slow-git");
        fs::write(
            &script,
            concat!(
                "#!/bin/sh\n",
                "if [ \"$1\" = remote ]; then echo origin; exit 0; fi\n",
                "sleep 8\n",
                "echo done\n",
            ),
        )?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
        Ok(script)
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_forked_helpers() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let backend = GitCliBackend::new(Duration::from_secs(1))
            .with_program(hanging_git(temp_dir.path())?);
        let remotes = RemoteSet::new(vec!["origin".to_string()]);

        let started = Instant::now();
        let err = backend
            .refresh_remotes(temp_dir.path(), &remotes)
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(format!("{:#}", err).contains("timed out after 1s"));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_fetch_is_reported_as_fetch_failure() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let repo_dir = temp_dir.path().join("repo");
        fs::create_dir_all(&repo_dir)?;
        let backend = GitCliBackend::new(Duration::from_secs(1))
            .with_program(hanging_git(temp_dir.path())?);

        let started = Instant::now();
        let repo = crate::domain::RepositoryPath::new(repo_dir);
        let verdict = crate::check::check_repository(&backend, &repo);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(verdict.error_kind(), Some(crate::error::ErrorKind::FetchFailed));
        Ok(())
    }
}
