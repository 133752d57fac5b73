//! # Repository Operations
//!
//! The pipeline talks to git through the [`GitOperations`] trait rather than
//! calling [`crate::git`] directly. In the binary, [`DefaultGitOperations`]
//! forwards every call to the system `git` command; tests substitute
//! doubles to simulate rejected pushes, failing clones and the like without
//! a remote.

use crate::config::TargetRepository;
use crate::error::Result;
use crate::git::{StagedChanges, Transport};

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Shallow, single-branch clone of the target into its clone directory.
    fn clone_shallow(&self, target: &TargetRepository, transport: &Transport<'_>) -> Result<()>;

    /// Stages every working-tree change, including removals.
    fn stage_all(&self, target: &TargetRepository) -> Result<StagedChanges>;

    /// Commits the staged tree and returns the new commit id.
    fn commit(
        &self,
        target: &TargetRepository,
        author_name: &str,
        author_email: &str,
        message: &str,
    ) -> Result<String>;

    /// Pushes the current commit to the target ref on `origin`.
    fn push(&self, target: &TargetRepository, transport: &Transport<'_>) -> Result<()>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command to perform real Git operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn clone_shallow(&self, target: &TargetRepository, transport: &Transport<'_>) -> Result<()> {
        crate::git::clone_shallow(target, transport)
    }

    fn stage_all(&self, target: &TargetRepository) -> Result<StagedChanges> {
        crate::git::stage_all(target)
    }

    fn commit(
        &self,
        target: &TargetRepository,
        author_name: &str,
        author_email: &str,
        message: &str,
    ) -> Result<String> {
        crate::git::commit(target, author_name, author_email, message)
    }

    fn push(&self, target: &TargetRepository, transport: &Transport<'_>) -> Result<()> {
        crate::git::push(target, transport)
    }
}
