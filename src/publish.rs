//! Publishing the output directory to a git branch.
//!
//! Works in a scratch repository so the project's own checkout is never
//! touched: the target branch is fetched (keeping its history), its tree is
//! replaced by the output directory, and a commit is pushed only when
//! something changed. Uses the `git` command line, so the user's
//! credentials and transport configuration apply unchanged.

use crate::config::BuildConfig;
use crate::files;
use crate::task::{Task, TaskError};
use crate::types::DirectoryRole;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("nothing to publish: {} is empty or missing", .0.display())]
    EmptyOutput(PathBuf),
    #[error("`git {args}` failed: {message}")]
    Git { args: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<PublishError> for TaskError {
    fn from(e: PublishError) -> Self {
        TaskError::Network(e.to_string())
    }
}

/// Runs git in one working directory.
struct Git<'a> {
    dir: &'a Path,
}

impl Git<'_> {
    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new("git");
        command
            .args(args)
            .current_dir(self.dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null());
        command
    }

    /// Run and return trimmed stdout; a non-zero exit is an error.
    fn run(&self, args: &[&str]) -> Result<String, PublishError> {
        debug!(args = %args.join(" "), "git");
        let output = self.command(args).output()?;
        if !output.status.success() {
            return Err(PublishError::Git {
                args: args.join(" "),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run for the exit status only.
    fn succeeds(&self, args: &[&str]) -> Result<bool, PublishError> {
        let status = self
            .command(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        Ok(status.success())
    }
}

/// Whether `remote` is a URL or path rather than a remote name.
fn is_location(remote: &str) -> bool {
    remote.contains("://")
        || remote.contains(':')
        || remote.starts_with('/')
        || remote.starts_with('.')
}

/// The `publish` task.
pub struct Publisher {
    config: Arc<BuildConfig>,
}

impl Publisher {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self { config }
    }

    /// Remote URL for `[deploy] remote`: names are looked up in the project
    /// repository, relative paths are taken from the project root.
    pub fn remote_url(&self) -> Result<String, PublishError> {
        let remote = &self.config.settings().deploy.remote;
        let root = self.config.root();
        if is_location(remote) {
            let local = root.join(remote);
            if !remote.contains("://") && Path::new(remote).is_relative() && local.exists() {
                return Ok(local.to_string_lossy().into_owned());
            }
            return Ok(remote.clone());
        }
        Git { dir: root }.run(&["remote", "get-url", remote])
    }

    /// Publish the output directory. Returns the new commit, or `None`
    /// when the branch already matched.
    pub fn publish(&self) -> Result<Option<String>, PublishError> {
        let deploy = &self.config.settings().deploy;
        let dist = self.config.dir(DirectoryRole::Output);
        if files::collect_all(&dist)?.is_empty() {
            return Err(PublishError::EmptyOutput(dist));
        }
        let url = self.remote_url()?;
        let branch = deploy.branch.as_str();

        let scratch = TempDir::new()?;
        let git = Git { dir: scratch.path() };
        git.run(&["init", "-q"])?;
        if !git.succeeds(&["config", "user.email"])? {
            git.run(&["config", "user.name", "sitepipe"])?;
            git.run(&["config", "user.email", "sitepipe@localhost"])?;
        }
        git.run(&["remote", "add", "origin", &url])?;

        let head_ref = format!("refs/heads/{branch}");
        let heads = git.run(&["ls-remote", "origin", &head_ref])?;
        if heads.is_empty() {
            debug!(branch, "creating branch");
            git.run(&["symbolic-ref", "HEAD", &head_ref])?;
        } else {
            git.run(&["fetch", "-q", "origin", &head_ref])?;
            git.run(&["checkout", "-q", "-B", branch, "FETCH_HEAD"])?;
        }

        git.run(&["rm", "-r", "-q", "-f", "--ignore-unmatch", "."])?;
        let copied = files::copy_tree(&dist, scratch.path())?;
        git.run(&["add", "-A"])?;
        if git.succeeds(&["diff", "--cached", "--quiet"])? {
            info!(branch, "published site is already up to date");
            return Ok(None);
        }

        git.run(&["commit", "-q", "-m", &deploy.message])?;
        let commit = git.run(&["rev-parse", "HEAD"])?;
        let refspec = format!("HEAD:refs/heads/{branch}");
        git.run(&["push", "-q", "origin", &refspec])?;
        info!(branch, files = copied, commit = %commit, "published");
        Ok(Some(commit))
    }
}

impl Task for Publisher {
    fn name(&self) -> &str {
        "publish"
    }

    fn run(&self) -> Result<(), TaskError> {
        self.publish()?;
        Ok(())
    }
}
