//! Shared test utilities for integration and E2E tests.
//!
//! This module provides fixtures for local git remotes and a fake package
//! registry, so the whole pipeline can run without network access.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let remotes = RemoteFixture::new();
//! remotes.add_target("lx-api-server", &fixtures::manifests("lx-api-server", "2.1.0"));
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use assert_fs::prelude::*;
use serde_json::{json, Value};

use bump_translations::config::{Credentials, Settings};
use bump_translations::defaults::{PACKAGE_FILE, PACKAGE_LOCK_FILE, TRANSLATIONS_PACKAGE};
use bump_translations::error::Result;
use bump_translations::registry::{InstallRequest, RegistryOperations};
use bump_translations::resolver::VersionSelector;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::fixtures;
    #[allow(unused_imports)]
    pub use super::{bump_cmd, settings, FakeRegistry, RemoteFixture};
}

/// Manifest documents as a target repository would carry them.
#[allow(dead_code)]
pub mod fixtures {
    use super::*;

    /// Renders JSON the way npm writes it: two spaces, trailing newline.
    pub fn pretty(value: &Value) -> String {
        let mut text = serde_json::to_string_pretty(value).expect("fixture JSON");
        text.push('\n');
        text
    }

    pub fn resolved_url(version: &str) -> String {
        format!(
            "https://registry.npmjs.org/@surikat/lx-translations/-/lx-translations-{}.tgz",
            version
        )
    }

    pub fn integrity(version: &str) -> String {
        format!("sha512-{}", version.replace('.', ""))
    }

    pub fn package_json(name: &str, version: &str) -> String {
        pretty(&json!({
            "name": name,
            "version": "1.0.0",
            "private": true,
            "dependencies": {
                TRANSLATIONS_PACKAGE: format!("^{}", version),
                "express": "^4.18.2"
            }
        }))
    }

    pub fn package_lock(name: &str, version: &str) -> String {
        pretty(&json!({
            "name": name,
            "version": "1.0.0",
            "lockfileVersion": 2,
            "requires": true,
            "packages": {
                "": {
                    "name": name,
                    "version": "1.0.0",
                    "dependencies": {
                        TRANSLATIONS_PACKAGE: format!("^{}", version),
                        "express": "^4.18.2"
                    }
                },
                "node_modules/@surikat/lx-translations": {
                    "version": version,
                    "resolved": resolved_url(version),
                    "integrity": integrity(version)
                },
                "node_modules/express": {
                    "version": "4.18.2",
                    "resolved": "https://registry.npmjs.org/express/-/express-4.18.2.tgz",
                    "integrity": "sha512-express"
                }
            },
            "dependencies": {
                TRANSLATIONS_PACKAGE: {
                    "version": version,
                    "resolved": resolved_url(version),
                    "integrity": integrity(version)
                },
                "express": {
                    "version": "4.18.2",
                    "resolved": "https://registry.npmjs.org/express/-/express-4.18.2.tgz",
                    "integrity": "sha512-express"
                }
            }
        }))
    }

    /// `package.json`, `package-lock.json` and an unrelated README.
    pub fn manifests(name: &str, version: &str) -> Vec<(&'static str, String)> {
        vec![
            (PACKAGE_FILE, package_json(name, version)),
            (PACKAGE_LOCK_FILE, package_lock(name, version)),
            ("README.md", format!("# {}\n", name)),
        ]
    }
}

/// Whether a usable `git` binary is on the PATH.
#[allow(dead_code)]
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=Test User"])
        .args(["-c", "user.email=test@example.com"])
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// A directory of bare repositories reachable through a `file://` origin.
pub struct RemoteFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl RemoteFixture {
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        fs::create_dir_all(temp_dir.path().join("remotes")).expect("Failed to create remotes");
        Self { temp_dir }
    }

    /// Origin URL the target identifiers are appended to.
    pub fn origin(&self) -> String {
        url::Url::from_file_path(self.temp_dir.path().join("remotes"))
            .expect("absolute path")
            .to_string()
    }

    /// Fresh work dir for one run.
    pub fn work_dir(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join("work").join(name)
    }

    pub fn remote_path(&self, target: &str) -> PathBuf {
        self.temp_dir.path().join("remotes").join(target)
    }

    /// Creates a bare remote for `target` whose `main` branch holds `files`.
    pub fn add_target(&self, target: &str, files: &[(&str, String)]) {
        let seed = self.temp_dir.child("seed").child(target);
        seed.create_dir_all().expect("Failed to create seed dir");

        git(seed.path(), &["init", "-q"]);
        git(seed.path(), &["checkout", "-q", "-b", "main"]);
        for (path, content) in files {
            seed.child(path).write_str(content).expect("Failed to write file");
        }
        git(seed.path(), &["add", "."]);
        git(seed.path(), &["commit", "-q", "-m", "Initial commit"]);

        let remote = self.remote_path(target);
        git(
            self.temp_dir.path(),
            &[
                "clone",
                "-q",
                "--bare",
                &seed.path().to_string_lossy(),
                &remote.to_string_lossy(),
            ],
        );
    }

    /// Makes the remote refuse every push.
    #[cfg(unix)]
    pub fn reject_pushes(&self, target: &str) {
        use std::os::unix::fs::PermissionsExt;

        let hook = self.remote_path(target).join("hooks").join("pre-receive");
        fs::write(&hook, "#!/bin/sh\necho 'pushes are frozen' >&2\nexit 1\n")
            .expect("Failed to write hook");
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755))
            .expect("Failed to make hook executable");
    }

    /// Commit id of `branch` on the remote.
    pub fn head(&self, target: &str, branch: &str) -> String {
        git(
            &self.remote_path(target),
            &["rev-parse", &format!("refs/heads/{}", branch)],
        )
        .trim()
        .to_string()
    }

    /// Paths touched by the tip commit of `main`, sorted.
    pub fn changed_files(&self, target: &str) -> Vec<String> {
        let out = git(
            &self.remote_path(target),
            &["diff-tree", "--no-commit-id", "--name-only", "-r", "main"],
        );
        let mut files: Vec<String> = out.lines().map(str::to_string).collect();
        files.sort();
        files
    }

    /// `<author name>|<subject>` of the tip commit of `main`.
    pub fn tip_summary(&self, target: &str) -> String {
        git(
            &self.remote_path(target),
            &["log", "-1", "--format=%an|%s", "main"],
        )
        .trim()
        .to_string()
    }

    /// Contents of `path` at the tip of `main`.
    pub fn show(&self, target: &str, path: &str) -> String {
        git(&self.remote_path(target), &["show", &format!("main:{}", path)])
    }

    pub fn commit_count(&self, target: &str) -> usize {
        git(&self.remote_path(target), &["rev-list", "--count", "main"])
            .trim()
            .parse()
            .expect("commit count")
    }
}

impl Default for RemoteFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings for a run against the fixture's origin.
#[allow(dead_code)]
pub fn settings(remotes: &RemoteFixture, targets: &[&str], work_dir: PathBuf) -> Settings {
    let credentials = Credentials::new("bot", "t0ken").expect("credentials");
    let mut settings = Settings::new(credentials, "main", work_dir).expect("settings");
    settings.origin = remotes.origin();
    settings.targets = targets.iter().map(|t| t.to_string()).collect();
    settings
}

/// Registry double that "publishes" a fixed set of versions.
///
/// `install` writes the scratch manifests npm would produce for the
/// selected version, or fails like npm's `ETARGET` for unknown versions.
#[allow(dead_code)]
pub struct FakeRegistry {
    latest: String,
    published: Vec<String>,
    pub installs: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeRegistry {
    pub fn new(latest: &str) -> Self {
        Self {
            latest: latest.to_string(),
            published: vec![latest.to_string()],
            installs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.published.push(version.to_string());
        self
    }

    pub fn install_count(&self) -> usize {
        self.installs.lock().expect("installs").len()
    }
}

impl RegistryOperations for FakeRegistry {
    fn install(&self, request: &InstallRequest<'_>) -> Result<()> {
        self.installs
            .lock()
            .expect("installs")
            .push(request.spec());

        let version = match request.selector {
            VersionSelector::Latest => self.latest.clone(),
            VersionSelector::Exact(v) => v.to_string(),
        };
        if !self.published.contains(&version) {
            return Err(request.error(format!(
                "npm ERR! code ETARGET\nnpm ERR! notarget No matching version found for {}",
                request.spec()
            )));
        }

        let descriptor = fixtures::pretty(&json!({
            "name": "bump-translations-scratch",
            "version": "1.0.0",
            "private": true,
            "dependencies": { request.package: format!("^{}", version) }
        }));
        let lock = fixtures::pretty(&json!({
            "name": "bump-translations-scratch",
            "version": "1.0.0",
            "lockfileVersion": 2,
            "requires": true,
            "packages": {
                "": { "dependencies": { request.package: format!("^{}", version) } },
                format!("node_modules/{}", request.package): {
                    "version": version,
                    "resolved": fixtures::resolved_url(&version),
                    "integrity": fixtures::integrity(&version)
                }
            },
            "dependencies": {
                request.package: {
                    "version": version,
                    "resolved": fixtures::resolved_url(&version),
                    "integrity": fixtures::integrity(&version)
                }
            }
        }));

        fs::write(request.scratch_dir.join(PACKAGE_FILE), descriptor)?;
        fs::write(request.scratch_dir.join(PACKAGE_LOCK_FILE), lock)?;
        Ok(())
    }
}

/// The binary with every variable it reads cleared.
#[allow(dead_code)]
pub fn bump_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bump-translations");
    for var in [
        "USERNAME",
        "ACCESS_TOKEN",
        "NPM_TOKEN",
        "REF",
        "BUMP_TARGETS",
        "BUMP_ORIGIN",
        "BUMP_PACKAGE",
        "BUMP_VERSION",
        "BUMP_WORK_DIR",
        "BUMP_PROXY",
        "NPM_REGISTRY",
        "BUMP_TRANSLATIONS_LOG",
        "RUST_LOG",
        "http_proxy",
        "https_proxy",
        "HTTP_PROXY",
        "HTTPS_PROXY",
        "ALL_PROXY",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_manifests_parse() {
        for (_, content) in fixtures::manifests("lx-api-server", "2.1.0") {
            if content.starts_with('{') {
                serde_json::from_str::<Value>(&content).expect("fixture should be JSON");
            }
        }
    }

    #[test]
    fn test_origin_is_file_url() {
        let remotes = RemoteFixture::new();
        assert!(remotes.origin().starts_with("file://"));
    }
}
