//! Package registry access.
//!
//! Resolution itself is delegated to the package manager: the resolver asks
//! a [`RegistryOperations`] implementation to install the translations
//! package into a scratch project and reads the written manifests back.
//! [`NpmRegistry`] is the real implementation; tests substitute their own.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::git::scrub;
use crate::resolver::VersionSelector;

/// One install into a scratch project.
#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    /// Target the resolution is done for, used in errors.
    pub target: &'a str,
    /// Scratch project containing a `package.json`.
    pub scratch_dir: &'a Path,
    pub package: &'a str,
    pub selector: &'a VersionSelector,
    pub registry: &'a Url,
    /// Registry token, if the package is private.
    pub token: Option<&'a str>,
}

impl InstallRequest<'_> {
    /// `<package>@<selector>` as passed to the package manager.
    pub fn spec(&self) -> String {
        format!("{}@{}", self.package, self.selector)
    }

    /// Builds a resolution error for this request.
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::Resolution {
            target: self.target.to_string(),
            package: self.package.to_string(),
            selector: self.selector.to_string(),
            message: message.into(),
        }
    }
}

/// Installs a package into a scratch project.
///
/// On success the scratch directory holds a `package.json` and a
/// `package-lock.json` that mention the package.
pub trait RegistryOperations: Send + Sync {
    fn install(&self, request: &InstallRequest<'_>) -> Result<()>;
}

/// Installs with the `npm` command line client.
#[derive(Debug, Clone)]
pub struct NpmRegistry {
    program: PathBuf,
    lockfile_version: u8,
}

impl NpmRegistry {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("npm"),
            lockfile_version: 2,
        }
    }

    /// Uses a different `npm` executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl Default for NpmRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryOperations for NpmRegistry {
    fn install(&self, request: &InstallRequest<'_>) -> Result<()> {
        write_npmrc(request.scratch_dir, request.registry, request.token)
            .map_err(|e| request.error(format!("cannot write .npmrc: {}", e)))?;

        let spec = request.spec();
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(request.scratch_dir)
            .args([
                "install",
                "--save",
                "--no-audit",
                "--no-fund",
                "--ignore-scripts",
            ])
            .arg(format!("--lockfile-version={}", self.lockfile_version))
            .arg(&spec)
            .stdin(Stdio::null());

        debug!(
            "{}: npm install {} in {}",
            request.target,
            spec,
            request.scratch_dir.display()
        );

        let output = cmd
            .output()
            .map_err(|e| request.error(format!("failed to run npm: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = format!("npm exited with {}: {}", output.status, stderr.trim());
            return Err(request.error(scrub(&message, request.token.unwrap_or_default())));
        }

        Ok(())
    }
}

/// Key npm uses to look up the token for a registry, e.g.
/// `//registry.npmjs.org/:_authToken`.
pub fn auth_token_key(registry: &Url) -> String {
    let host = registry.host_str().unwrap_or_default();
    let port = registry
        .port()
        .map(|p| format!(":{}", p))
        .unwrap_or_default();
    let path = registry.path();
    let path = if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    };
    format!("//{}{}{}:_authToken", host, port, path)
}

/// Contents of the scratch project's `.npmrc`.
pub fn npmrc_contents(registry: &Url, token: Option<&str>) -> String {
    let mut contents = format!("registry={}\n", registry);
    if let Some(token) = token {
        contents.push_str(&format!("{}={}\n", auth_token_key(registry), token));
    }
    contents
}

fn write_npmrc(scratch_dir: &Path, registry: &Url, token: Option<&str>) -> std::io::Result<()> {
    fs::write(scratch_dir.join(".npmrc"), npmrc_contents(registry, token))
}
