//! # Error Handling
//!
//! This module defines the centralized error type for `bump-translations`.
//! It uses `thiserror` to derive a single `Error` enum covering every step of
//! the per-target pipeline, plus the ambient failures (configuration, I/O,
//! JSON, URL and semver parsing) those steps are built on.
//!
//! ## Step errors
//!
//! The five step errors mirror the pipeline:
//!
//! - **`Clone`**: the shallow clone of a target repository failed.
//! - **`Resolution`**: the registry install failed, or the installed
//!   manifests do not mention the translations package.
//! - **`Patch`**: a manifest could not be read, parsed, patched or written.
//! - **`Commit`**: staging or committing the working tree failed.
//! - **`Push`**: the remote rejected the push.
//!
//! Each of them carries the target identifier so a log line is enough to
//! diagnose which repository broke and where. URLs stored in errors are
//! always redacted (see [`crate::git::redact_url`]).

use thiserror::Error;

/// Main error type for bump-translations operations
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration (environment or flags) is missing or invalid.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// Cloning a target repository failed.
    ///
    /// Includes the redacted repository URL, the ref, the error message and an
    /// optional hint for resolution.
    #[error("Clone error for {target} ({url}@{r#ref}): {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Clone {
        target: String,
        url: String,
        r#ref: String,
        message: String,
        /// Optional hint for how to resolve the clone issue
        hint: Option<String>,
    },

    /// Resolving the translations package through the registry failed.
    #[error("Resolution error for {target} ({package}@{selector}): {message}")]
    Resolution {
        target: String,
        package: String,
        selector: String,
        message: String,
    },

    /// Patching a manifest document failed.
    #[error("Patch error for {target} ({file}): {message}")]
    Patch {
        target: String,
        file: String,
        message: String,
    },

    /// Staging or committing the working tree failed.
    #[error("Commit error for {target}: {message}")]
    Commit { target: String, message: String },

    /// Pushing the commit to the remote failed.
    #[error("Push error for {target} ({url}@{r#ref}): {message}")]
    Push {
        target: String,
        url: String,
        r#ref: String,
        message: String,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),
}

impl Error {
    /// Name of the pipeline step that produced this error.
    pub fn step(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config",
            Error::Clone { .. } => "clone",
            Error::Resolution { .. } => "resolve",
            Error::Patch { .. } => "patch",
            Error::Commit { .. } => "commit",
            Error::Push { .. } => "push",
            Error::Io(_) | Error::Json(_) | Error::UrlParse(_) | Error::Semver(_) => "internal",
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
