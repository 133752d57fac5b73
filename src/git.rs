//! Git operations against a target's own working directory.
//!
//! Every function shells out to the system `git` binary and passes the
//! directory explicitly with `git -C <dir>`; the process working directory is
//! never read or changed, so several targets can be processed at once.
//!
//! Credentials are injected into `http(s)` remote URLs as basic-auth userinfo
//! and scrubbed from everything that ends up in an error or a log line.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use log::debug;
use url::Url;

use crate::config::{Credentials, TargetRepository};
use crate::error::{Error, Result};

/// Transport options shared by clone and push.
#[derive(Debug, Clone, Copy)]
pub struct Transport<'a> {
    pub credentials: &'a Credentials,
    /// Passed to git as `http.proxy`.
    pub proxy: Option<&'a str>,
}

/// One line of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Status in the index (`X`).
    pub index: char,
    /// Status in the working tree (`Y`).
    pub worktree: char,
    pub path: String,
}

impl StatusEntry {
    /// The path is tracked but gone from the working tree.
    pub fn is_removed(&self) -> bool {
        self.worktree == 'D'
    }

    /// The working tree differs from the index (including untracked files).
    pub fn has_worktree_changes(&self) -> bool {
        self.worktree != ' ' && !self.is_removed()
    }
}

/// Paths staged by [`stage_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl StagedChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Builds the URL git talks to, with credentials for `http(s)` remotes.
///
/// Other schemes (`file://`, `ssh://`) are returned unchanged.
pub fn authenticated_url(url: &str, credentials: &Credentials) -> Result<String> {
    let mut parsed = Url::parse(url)?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Ok(url.to_string());
    }

    let invalid = |what: &str| Error::Config {
        message: format!("cannot set {} on {}", what, redact_url(url)),
        hint: None,
    };
    parsed
        .set_username(credentials.username())
        .map_err(|_| invalid("username"))?;
    parsed
        .set_password(Some(credentials.token()))
        .map_err(|_| invalid("password"))?;

    Ok(parsed.to_string())
}

/// Masks the password of a URL so it can be logged.
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}

/// Replaces every occurrence of `secret` in `text`.
pub fn scrub(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        text.to_string()
    } else {
        text.replace(secret, "***")
    }
}

/// Shallow, single-branch clone of `target.url` at `target.ref` into the
/// target's clone directory.
///
/// The clone directory must be absent or empty.
pub fn clone_shallow(target: &TargetRepository, transport: &Transport<'_>) -> Result<()> {
    let dir = target.clone_dir();
    let clone_error = |message: String, hint: Option<String>| Error::Clone {
        target: target.identifier.clone(),
        url: redact_url(&target.url),
        r#ref: target.r#ref.clone(),
        message,
        hint,
    };

    if dir.exists() && !is_empty_dir(&dir) {
        return Err(clone_error(
            format!("destination {} already exists and is not empty", dir.display()),
            Some("Every run needs a fresh working directory".to_string()),
        ));
    }

    fs::create_dir_all(&dir).map_err(|e| {
        clone_error(
            format!("cannot create {}: {}", dir.display(), e),
            None,
        )
    })?;

    let url = authenticated_url(&target.url, transport.credentials)
        .map_err(|e| clone_error(format!("invalid remote URL: {}", e), None))?;

    let mut cmd = git_command(None, transport.proxy);
    cmd.args([
        "clone",
        "--depth=1",
        "--single-branch",
        "--no-tags",
        "--branch",
        target.r#ref.as_str(),
    ])
    .arg(&url)
    .arg(&dir);

    debug!(
        "git clone --depth=1 --branch {} {} {}",
        target.r#ref,
        redact_url(&url),
        dir.display()
    );

    run(cmd, transport.credentials.token()).map_err(|stderr| {
        let hint = clone_hint(&stderr, &target.r#ref);
        clone_error(stderr, hint)
    })?;

    // The clone must not keep the token in .git/config.
    set_origin_url(&dir, &target.url).map_err(|message| clone_error(message, None))?;

    Ok(())
}

/// Points `origin` of the repository in `dir` at `url`.
pub fn set_origin_url(dir: &Path, url: &str) -> std::result::Result<(), String> {
    let mut cmd = git_command(Some(dir), None);
    cmd.args(["remote", "set-url", "origin", url]);
    run(cmd, "").map(|_| ())
}

/// Lists working-tree status for every tracked and untracked path.
pub fn status(dir: &Path) -> std::result::Result<Vec<StatusEntry>, String> {
    let mut cmd = git_command(Some(dir), None);
    cmd.args(["status", "--porcelain=v1", "-z", "--untracked-files=all"]);
    let stdout = run(cmd, "")?;
    Ok(parse_porcelain(&stdout))
}

/// Parses NUL-separated `git status --porcelain=v1 -z` output.
pub fn parse_porcelain(output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    let mut fields = output.split('\0').filter(|f| !f.is_empty());

    while let Some(field) = fields.next() {
        let mut chars = field.chars();
        let (Some(index), Some(worktree)) = (chars.next(), chars.next()) else {
            continue;
        };
        let path = field.get(3..).unwrap_or_default().to_string();

        // Renames and copies are followed by the original path.
        if matches!(index, 'R' | 'C') {
            fields.next();
        }

        if !path.is_empty() {
            entries.push(StatusEntry {
                index,
                worktree,
                path,
            });
        }
    }

    entries
}

/// Stages every working-tree change so the index mirrors the working tree.
///
/// Changed and untracked paths are added; paths that disappeared from the
/// working tree are removed from the index.
pub fn stage_all(target: &TargetRepository) -> Result<StagedChanges> {
    let dir = target.clone_dir();
    let commit_error = |message: String| Error::Commit {
        target: target.identifier.clone(),
        message,
    };

    let entries = status(&dir).map_err(commit_error)?;

    let mut changes = StagedChanges::default();
    for entry in entries {
        if entry.is_removed() {
            changes.removed.push(entry.path);
        } else if entry.has_worktree_changes() {
            changes.added.push(entry.path);
        }
    }

    if !changes.added.is_empty() {
        let mut cmd = git_command(Some(&dir), None);
        cmd.args(["add", "--"]).args(&changes.added);
        run(cmd, "").map_err(commit_error)?;
    }

    if !changes.removed.is_empty() {
        let mut cmd = git_command(Some(&dir), None);
        cmd.args(["rm", "--cached", "--quiet", "--"])
            .args(&changes.removed);
        run(cmd, "").map_err(commit_error)?;
    }

    debug!(
        "{}: staged {} added, {} removed",
        target.identifier,
        changes.added.len(),
        changes.removed.len()
    );

    Ok(changes)
}

/// Records the staged tree as a commit and returns its id.
pub fn commit(
    target: &TargetRepository,
    author_name: &str,
    author_email: &str,
    message: &str,
) -> Result<String> {
    let dir = target.clone_dir();
    let commit_error = |message: String| Error::Commit {
        target: target.identifier.clone(),
        message,
    };

    let mut cmd = git_command(Some(&dir), None);
    cmd.arg("-c")
        .arg(format!("user.name={}", author_name))
        .arg("-c")
        .arg(format!("user.email={}", author_email))
        .args(["-c", "commit.gpgsign=false"])
        .args(["commit", "--quiet", "--no-verify", "-m", message]);
    run(cmd, "").map_err(commit_error)?;

    head(&dir).map_err(commit_error)
}

/// Pushes `HEAD` to `target.ref` on the origin URL.
///
/// The credentials are passed on the command line only, since the stored
/// `origin` carries none. There is no rebase or retry; a rejected push is
/// reported as is.
pub fn push(target: &TargetRepository, transport: &Transport<'_>) -> Result<()> {
    let dir = target.clone_dir();
    let refspec = format!("HEAD:refs/heads/{}", target.r#ref);
    let push_error = |message: String| Error::Push {
        target: target.identifier.clone(),
        url: redact_url(&target.url),
        r#ref: target.r#ref.clone(),
        message,
    };

    let url = authenticated_url(&target.url, transport.credentials)
        .map_err(|e| push_error(format!("invalid remote URL: {}", e)))?;

    let mut cmd = git_command(Some(&dir), transport.proxy);
    cmd.args(["push", "--porcelain"])
        .arg(&url)
        .arg(&refspec);

    debug!("git push {} {} ({})", redact_url(&url), refspec, dir.display());

    run(cmd, transport.credentials.token()).map_err(push_error)?;

    Ok(())
}

/// Id of the current `HEAD` commit.
pub fn head(dir: &Path) -> std::result::Result<String, String> {
    let mut cmd = git_command(Some(dir), None);
    cmd.args(["rev-parse", "HEAD"]);
    run(cmd, "").map(|out| out.trim().to_string())
}

fn git_command(dir: Option<&Path>, proxy: Option<&str>) -> Command {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.arg("-C").arg(dir);
    }
    if let Some(proxy) = proxy {
        cmd.arg("-c").arg(format!("http.proxy={}", proxy));
    }
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd.stdin(Stdio::null());
    cmd
}

/// Runs a git command, returning stdout or the scrubbed stderr.
fn run(mut cmd: Command, secret: &str) -> std::result::Result<String, String> {
    let output = cmd
        .output()
        .map_err(|e| format!("failed to run git: {}", e))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        Err(scrub(
            &format!("git exited with {}: {}", output.status, message),
            secret,
        ))
    }
}

fn clone_hint(stderr: &str, ref_name: &str) -> Option<String> {
    if stderr.contains("Authentication failed")
        || stderr.contains("could not read Username")
        || stderr.contains("Permission denied")
    {
        Some("Check that USERNAME and ACCESS_TOKEN grant access to the repository".to_string())
    } else if stderr.contains("Remote branch") && stderr.contains("not found") {
        Some(format!("Branch '{}' does not exist on the remote", ref_name))
    } else {
        None
    }
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
