//! Default values for bump-translations.
//!
//! This module provides centralized default values used by the CLI and the
//! configuration layer, so the target list and commit identity live in one
//! place.

/// Repositories that depend on the translations package.
pub const DEFAULT_TARGETS: &[&str] = &["lx-api-server", "lx-react-client"];

/// Fully qualified name (scope + name) of the translations package.
pub const TRANSLATIONS_PACKAGE: &str = "@surikat/lx-translations";

/// Organization namespace every target repository lives under.
pub const DEFAULT_ORIGIN: &str = "https://github.com/surikaterna";

/// Registry used for the scratch install.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Commit message of the bump commit.
pub const COMMIT_MESSAGE: &str = "Update translations";

/// Author name of the bump commit.
pub const AUTHOR_NAME: &str = "Bump Translations Action";

/// Author email of the bump commit. Git refuses to commit without one.
pub const AUTHOR_EMAIL: &str = "bump-translations@users.noreply.github.com";

/// Name of the dependency descriptor.
pub const PACKAGE_FILE: &str = "package.json";

/// Name of the lock document next to the descriptor.
pub const PACKAGE_LOCK_FILE: &str = "package-lock.json";

/// Returns the default target list as owned strings.
pub fn default_targets() -> Vec<String> {
    DEFAULT_TARGETS.iter().map(|t| t.to_string()).collect()
}
