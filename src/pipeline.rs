//! # Per-Target Pipeline
//!
//! Each target repository goes through the same sequence of fallible steps:
//!
//! ```text
//! Pending → Cloned → Resolved → Patched → Committed → Pushed
//!                                   └────→ UpToDate (nothing to commit)
//! ```
//!
//! Any step error moves the target to `Failed`. The error is logged, the
//! scratch clone is abandoned as is (no rollback), and the remaining targets
//! carry on. There is no resumption: a retry starts again from `Pending`.
//!
//! Targets share nothing mutable. Every target works in its own directory
//! under the configured work dir and all commands receive that directory
//! explicitly, so [`Pipeline::run_all`] can process them in parallel. Each
//! target gets a thread of its own, so one hanging clone or push does not
//! hold up the others.

use std::fmt;

use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{Settings, TargetRepository};
use crate::defaults::{PACKAGE_FILE, PACKAGE_LOCK_FILE};
use crate::error::{Error, Result};
use crate::git::{redact_url, Transport};
use crate::manifest::{self, ManifestKind};
use crate::registry::RegistryOperations;
use crate::repository::GitOperations;
use crate::resolver::{DependencyReference, Resolver};

/// Where a target run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Cloned,
    Resolved,
    Patched,
    Committed,
    Pushed,
    /// The target already pinned the resolved version.
    UpToDate,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Pending => "pending",
            Stage::Cloned => "cloned",
            Stage::Resolved => "resolved",
            Stage::Patched => "patched",
            Stage::Committed => "committed",
            Stage::Pushed => "pushed",
            Stage::UpToDate => "up to date",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Final state of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetOutcome {
    pub identifier: String,
    /// Terminal stage: `Pushed`, `UpToDate`, `Committed` (dry run) or `Failed`.
    pub stage: Stage,
    /// Last stage completed before the run ended.
    pub reached: Stage,
    /// Resolved version of the translations package.
    pub version: Option<String>,
    /// Id of the bump commit.
    pub commit: Option<String>,
    pub failed_step: Option<&'static str>,
    pub error: Option<String>,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        self.stage != Stage::Failed
    }
}

/// Outcomes of every target, in configuration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<TargetOutcome>,
}

impl RunReport {
    /// True when no target failed.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Process exit code: 0 when every target succeeded, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Progress of a single target while it runs.
struct TargetRun {
    identifier: String,
    stage: Stage,
    version: Option<String>,
    commit: Option<String>,
}

impl TargetRun {
    fn new(target: &TargetRepository) -> Self {
        Self {
            identifier: target.identifier.clone(),
            stage: Stage::Pending,
            version: None,
            commit: None,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!("{}: {} -> {}", self.identifier, self.stage, next);
        self.stage = next;
    }

    fn finish(self) -> TargetOutcome {
        TargetOutcome {
            identifier: self.identifier,
            stage: self.stage,
            reached: self.stage,
            version: self.version,
            commit: self.commit,
            failed_step: None,
            error: None,
        }
    }

    fn fail(self, err: &Error) -> TargetOutcome {
        TargetOutcome {
            identifier: self.identifier,
            stage: Stage::Failed,
            reached: self.stage,
            version: self.version,
            commit: self.commit,
            failed_step: Some(err.step()),
            error: Some(err.to_string()),
        }
    }
}

/// Drives targets through clone, resolve, patch, commit and push.
pub struct Pipeline<'a> {
    settings: &'a Settings,
    git: &'a dyn GitOperations,
    registry: &'a dyn RegistryOperations,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        git: &'a dyn GitOperations,
        registry: &'a dyn RegistryOperations,
    ) -> Self {
        Self {
            settings,
            git,
            registry,
        }
    }

    fn transport(&self) -> Transport<'a> {
        Transport {
            credentials: &self.settings.credentials,
            proxy: self.settings.proxy.as_deref(),
        }
    }

    /// Runs every configured target and collects the outcomes.
    ///
    /// Failures are logged and recorded; they never stop other targets.
    pub fn run_all(&self) -> RunReport {
        let targets = self.settings.target_repositories();

        let outcomes: Vec<TargetOutcome> = if self.settings.sequential || targets.len() < 2 {
            targets.iter().map(|t| self.run_target(t)).collect()
        } else {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(targets.len())
                .build()
            {
                Ok(pool) => pool.install(|| targets.par_iter().map(|t| self.run_target(t)).collect()),
                Err(e) => {
                    warn!("Cannot start worker threads ({}), running targets sequentially", e);
                    targets.iter().map(|t| self.run_target(t)).collect()
                }
            }
        };

        RunReport { outcomes }
    }

    /// Runs one target to a terminal stage.
    pub fn run_target(&self, target: &TargetRepository) -> TargetOutcome {
        let mut run = TargetRun::new(target);

        match self.drive(target, &mut run) {
            Ok(()) => run.finish(),
            Err(err) => {
                error!(
                    "{}: failed at {} ({}): {}",
                    target.identifier,
                    err.step(),
                    run.stage,
                    err
                );
                run.fail(&err)
            }
        }
    }

    fn drive(&self, target: &TargetRepository, run: &mut TargetRun) -> Result<()> {
        let settings = self.settings;
        let transport = self.transport();
        let url = redact_url(&target.url);

        self.git.clone_shallow(target, &transport)?;
        info!("Cloned {} branch of {}.", target.r#ref, url);
        run.advance(Stage::Cloned);

        let dep = Resolver::new(settings, self.registry).resolve(target)?;
        info!(
            "{}: {}@{} resolved to {}",
            target.identifier, dep.package, dep.selector, dep.version
        );
        run.version = Some(dep.version.to_string());
        run.advance(Stage::Resolved);

        self.patch_manifests(target, &dep)?;
        run.advance(Stage::Patched);

        let staged = self.git.stage_all(target)?;
        if staged.is_empty() {
            info!(
                "{}: already on {} {}, nothing to commit",
                target.identifier, dep.package, dep.version
            );
            run.advance(Stage::UpToDate);
            return Ok(());
        }

        let commit = self.git.commit(
            target,
            &settings.author_name,
            &settings.author_email,
            &settings.message,
        )?;
        debug!("{}: committed {} ({} paths)", target.identifier, commit, staged.len());
        run.commit = Some(commit);
        run.advance(Stage::Committed);

        if settings.dry_run {
            info!(
                "{}: dry run, not pushing the {} branch of {}",
                target.identifier, target.r#ref, url
            );
            return Ok(());
        }

        self.git.push(target, &transport)?;
        info!("Successfully pushed the {} branch of {}.", target.r#ref, url);
        run.advance(Stage::Pushed);

        Ok(())
    }

    /// Patches the descriptor and, when the target has one, the lock file.
    fn patch_manifests(&self, target: &TargetRepository, dep: &DependencyReference) -> Result<()> {
        let dir = target.clone_dir();
        let descriptor = dir.join(PACKAGE_FILE);
        let lock = dir.join(PACKAGE_LOCK_FILE);
        let id = target.identifier.as_str();

        // Disjoint files, patched side by side.
        let (descriptor_changed, lock_changed) = rayon::join(
            || manifest::patch_file(id, &descriptor, ManifestKind::Descriptor, dep),
            || {
                if lock.exists() {
                    manifest::patch_file(id, &lock, ManifestKind::Lock, dep).map(Some)
                } else {
                    Ok(None)
                }
            },
        );

        let descriptor_changed = descriptor_changed?;
        match lock_changed? {
            Some(lock_changed) => debug!(
                "{}: {} changed: {}, {} changed: {}",
                id, PACKAGE_FILE, descriptor_changed, PACKAGE_LOCK_FILE, lock_changed
            ),
            None => warn!("{}: no {}, only {} was patched", id, PACKAGE_LOCK_FILE, PACKAGE_FILE),
        }

        Ok(())
    }
}
