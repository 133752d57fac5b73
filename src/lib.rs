//! # Bump Translations Library
//!
//! This library propagates a new version of the shared translations package
//! into the repositories that depend on it. It is driven by the
//! `bump-translations` binary but every step can be used on its own.
//!
//! ## Quick Example
//!
//! ```
//! use bump_translations::manifest::ManifestDocument;
//!
//! let doc = ManifestDocument::parse(r#"{
//!   "name": "lx-api-server",
//!   "dependencies": {
//!     "@surikat/lx-translations": "^2.1.0"
//!   }
//! }"#).unwrap();
//!
//! assert_eq!(doc.indent(), "  ");
//! assert!(doc.dependency("@surikat/lx-translations").is_some());
//! ```
//!
//! ## Execution Flow
//!
//! For every target repository, [`pipeline::Pipeline`] runs:
//!
//! 1.  **Repository Fetch** (`git`, `repository`): shallow, single-branch
//!     clone of the configured ref into the target's own directory.
//! 2.  **Dependency Resolver** (`resolver`, `registry`): install the
//!     translations package into a scratch project to learn the concrete
//!     version and lock record the registry assigns.
//! 3.  **Manifest Patcher** (`manifest`): rewrite only the translations entry
//!     of `package.json` and `package-lock.json`.
//! 4.  **Commit & Publish** (`git`, `repository`): stage everything, commit
//!     with a fixed identity and push back to the same ref.
//!
//! Targets are independent: a failure is logged and recorded in the
//! [`pipeline::RunReport`] and the next target proceeds.

pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod repository;
pub mod resolver;

#[cfg(test)]
mod manifest_proptest;
