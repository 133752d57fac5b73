//! # Run Configuration
//!
//! Everything a run needs is assembled once at startup into a [`Settings`]
//! value and then shared read-only between target runs. Nothing in here is
//! mutated after validation, so concurrent runs can borrow it freely.
//!
//! ## Key Types
//!
//! - **[`Credentials`]**: username + token used for both clone and push.
//!   The token is kept private and never shows up in `Debug` output.
//! - **[`Settings`]**: the static target list, the ref to operate on, the
//!   package and version selector, commit identity and transport options.
//! - **[`TargetRepository`]**: one target derived from `Settings`, with its
//!   own isolated working directory.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::defaults;
use crate::error::{Error, Result};
use crate::resolver::VersionSelector;

/// Transport credentials, read once from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    token: String,
}

impl Credentials {
    /// Creates credentials, rejecting empty values.
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let token = token.into();

        if username.trim().is_empty() {
            return Err(Error::Config {
                message: "USERNAME is empty".to_string(),
                hint: Some("Set USERNAME to the account that owns ACCESS_TOKEN".to_string()),
            });
        }
        if token.trim().is_empty() {
            return Err(Error::Config {
                message: "ACCESS_TOKEN is empty".to_string(),
                hint: Some("Set ACCESS_TOKEN to a token with push access".to_string()),
            });
        }

        Ok(Self { username, token })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"***")
            .finish()
    }
}

/// Process-wide settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Identifiers of the repositories to update.
    pub targets: Vec<String>,
    /// Base URL the identifiers are appended to.
    pub origin: String,
    /// Branch to clone and push.
    pub r#ref: String,
    /// Fully qualified name of the translations package.
    pub package: String,
    /// Version to install (`latest` or an explicit version).
    pub selector: VersionSelector,
    pub credentials: Credentials,
    /// Registry token, written into the scratch `.npmrc` when present.
    pub npm_token: Option<String>,
    pub registry: Url,
    /// HTTP proxy handed to git as `http.proxy`.
    pub proxy: Option<String>,
    /// Root under which every target gets its own directory.
    pub work_dir: PathBuf,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    /// Commit locally but never push.
    pub dry_run: bool,
    /// Process targets one after another instead of in parallel.
    pub sequential: bool,
}

impl Settings {
    /// Creates settings with the built-in target list and commit identity.
    pub fn new(credentials: Credentials, r#ref: impl Into<String>, work_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            targets: defaults::default_targets(),
            origin: defaults::DEFAULT_ORIGIN.to_string(),
            r#ref: r#ref.into(),
            package: defaults::TRANSLATIONS_PACKAGE.to_string(),
            selector: VersionSelector::Latest,
            credentials,
            npm_token: None,
            registry: Url::parse(defaults::DEFAULT_REGISTRY)?,
            proxy: None,
            work_dir,
            author_name: defaults::AUTHOR_NAME.to_string(),
            author_email: defaults::AUTHOR_EMAIL.to_string(),
            message: defaults::COMMIT_MESSAGE.to_string(),
            dry_run: false,
            sequential: false,
        })
    }

    /// Checks the settings before any target is processed.
    pub fn validate(&self) -> Result<()> {
        if self.r#ref.trim().is_empty() {
            return Err(Error::Config {
                message: "REF is empty".to_string(),
                hint: Some("Set REF to the branch that should receive the bump".to_string()),
            });
        }

        if self.targets.is_empty() {
            return Err(Error::Config {
                message: "no target repositories configured".to_string(),
                hint: None,
            });
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            validate_identifier(target)?;
            if !seen.insert(target.as_str()) {
                return Err(Error::Config {
                    message: format!("target '{}' is listed twice", target),
                    hint: Some("Each target gets its own working directory".to_string()),
                });
            }
        }

        Url::parse(&self.origin).map_err(|e| Error::Config {
            message: format!("origin '{}' is not a valid URL: {}", self.origin, e),
            hint: None,
        })?;

        if self.package.trim().is_empty() {
            return Err(Error::Config {
                message: "package name is empty".to_string(),
                hint: None,
            });
        }

        Ok(())
    }

    /// Derives the target repository for an identifier.
    pub fn target(&self, identifier: &str) -> TargetRepository {
        TargetRepository {
            identifier: identifier.to_string(),
            url: remote_url(&self.origin, identifier),
            r#ref: self.r#ref.clone(),
            work_dir: self.work_dir.join(identifier),
        }
    }

    /// All configured targets, in configuration order.
    pub fn target_repositories(&self) -> Vec<TargetRepository> {
        self.targets.iter().map(|t| self.target(t)).collect()
    }
}

/// One repository to update, with its own working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRepository {
    pub identifier: String,
    /// Remote URL without credentials.
    pub url: String,
    pub r#ref: String,
    /// Directory owned by this target only.
    pub work_dir: PathBuf,
}

impl TargetRepository {
    /// Where the repository is cloned.
    pub fn clone_dir(&self) -> PathBuf {
        self.work_dir.join("repo")
    }

    /// Where the registry scratch install happens.
    pub fn scratch_dir(&self) -> PathBuf {
        self.work_dir.join("registry")
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

/// Appends an identifier to the origin.
pub fn remote_url(origin: &str, identifier: &str) -> String {
    format!("{}/{}", origin.trim_end_matches('/'), identifier)
}

/// Parses a comma separated target list, dropping blanks.
pub fn parse_target_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_identifier(identifier: &str) -> Result<()> {
    let valid = !identifier.is_empty()
        && identifier != "."
        && identifier != ".."
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(Error::Config {
            message: format!("invalid target identifier '{}'", identifier),
            hint: Some("Use the bare repository name, e.g. lx-api-server".to_string()),
        })
    }
}
