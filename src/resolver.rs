//! # Dependency Resolution
//!
//! The registry is the only authority on what `latest` means, so resolution
//! is done by installing the translations package into a throwaway project
//! and reading back what the package manager wrote:
//!
//! 1. A fresh scratch directory is created for the target (any previous
//!    content is removed first, so no resolution state is reused).
//! 2. A minimal `package.json` is written into it.
//! 3. The [`RegistryOperations`] implementation installs
//!    `<package>@<selector>`.
//! 4. The descriptor entry (e.g. `"^2.5.0"`) and the lock record (version,
//!    `resolved` URL, `integrity`) are read from the resulting
//!    `package.json` / `package-lock.json`.
//!
//! The lock record is looked up in the legacy `dependencies` section first
//! and in the `packages["node_modules/<name>"]` section second, so every
//! lockfile version is understood.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::debug;
use semver::Version;
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};

use crate::config::{Settings, TargetRepository};
use crate::defaults::{PACKAGE_FILE, PACKAGE_LOCK_FILE};
use crate::error::{Error, Result};
use crate::registry::{InstallRequest, RegistryOperations};

/// Which version of the package to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    /// Whatever the registry's `latest` tag points at.
    Latest,
    /// An explicit version.
    Exact(Version),
}

impl FromStr for VersionSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "latest" {
            return Ok(VersionSelector::Latest);
        }

        let version = s.strip_prefix('v').unwrap_or(s);
        Version::parse(version)
            .map(VersionSelector::Exact)
            .map_err(|e| Error::Config {
                message: format!("invalid version selector '{}': {}", s, e),
                hint: Some("Use 'latest' or a full version such as 2.5.0".to_string()),
            })
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Latest => write!(f, "latest"),
            VersionSelector::Exact(version) => write!(f, "{}", version),
        }
    }
}

/// The translations package as the registry resolved it.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyReference {
    pub package: String,
    pub selector: VersionSelector,
    /// Concrete version the selector resolved to.
    pub version: Version,
    /// Value for `dependencies[<package>]` in the descriptor.
    pub descriptor_entry: JsonValue,
    /// Value for `dependencies[<package>]` in the lock document.
    pub lock_entry: JsonValue,
    /// Value for `packages["node_modules/<package>"]`, when the package
    /// manager wrote one.
    pub package_entry: Option<JsonValue>,
}

impl DependencyReference {
    /// Key of the package in a lock document's `packages` section.
    pub fn package_key(&self) -> String {
        package_key(&self.package)
    }
}

/// Fields every lock record has to carry.
#[derive(Debug, Deserialize)]
struct LockRecord {
    version: String,
    #[serde(default)]
    resolved: Option<String>,
    #[serde(default)]
    integrity: Option<String>,
}

/// Resolves the translations package for targets.
pub struct Resolver<'a> {
    settings: &'a Settings,
    registry: &'a dyn RegistryOperations,
}

impl<'a> Resolver<'a> {
    pub fn new(settings: &'a Settings, registry: &'a dyn RegistryOperations) -> Self {
        Self { settings, registry }
    }

    /// Installs the package in the target's scratch directory and reads back
    /// the resolved descriptor and lock entries.
    pub fn resolve(&self, target: &TargetRepository) -> Result<DependencyReference> {
        let scratch_dir = target.scratch_dir();
        let settings = self.settings;
        let request = InstallRequest {
            target: &target.identifier,
            scratch_dir: &scratch_dir,
            package: &settings.package,
            selector: &settings.selector,
            registry: &settings.registry,
            token: settings.npm_token.as_deref(),
        };

        prepare_scratch(&scratch_dir)
            .map_err(|e| request.error(format!("cannot prepare scratch project: {}", e)))?;

        self.registry.install(&request)?;

        read_back(&request)
    }
}

/// Key of a package in a lock document's `packages` section.
pub fn package_key(package: &str) -> String {
    format!("node_modules/{}", package)
}

/// Empties (or creates) the scratch directory and writes a bare descriptor.
fn prepare_scratch(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;

    let descriptor = json!({
        "name": "bump-translations-scratch",
        "version": "1.0.0",
        "private": true,
        "dependencies": {}
    });
    fs::write(
        dir.join(PACKAGE_FILE),
        format!("{:#}\n", descriptor),
    )
}

fn read_back(request: &InstallRequest<'_>) -> Result<DependencyReference> {
    let descriptor_path = request.scratch_dir.join(PACKAGE_FILE);
    let lock_path = request.scratch_dir.join(PACKAGE_LOCK_FILE);

    // Disjoint files, safe to read side by side.
    let (descriptor, lock) = rayon::join(
        || read_json(request, &descriptor_path),
        || read_json(request, &lock_path),
    );
    let (descriptor, lock) = (descriptor?, lock?);

    let descriptor_entry = descriptor
        .get("dependencies")
        .and_then(|deps| deps.get(request.package))
        .cloned()
        .ok_or_else(|| {
            request.error(format!(
                "{} is missing from {} after install",
                request.package, PACKAGE_FILE
            ))
        })?;

    let package_entry = lock
        .get("packages")
        .and_then(|packages| packages.get(package_key(request.package)))
        .cloned();

    let lock_entry = match lock
        .get("dependencies")
        .and_then(|deps| deps.get(request.package))
    {
        Some(entry) => entry.clone(),
        None => package_entry
            .as_ref()
            .map(legacy_record)
            .ok_or_else(|| {
                request.error(format!(
                    "{} is missing from {} after install",
                    request.package, PACKAGE_LOCK_FILE
                ))
            })?,
    };

    let record: LockRecord = serde_json::from_value(lock_entry.clone()).map_err(|e| {
        request.error(format!("unexpected lock record: {}", e))
    })?;
    let version = Version::parse(&record.version).map_err(|e| {
        request.error(format!("registry returned invalid version '{}': {}", record.version, e))
    })?;

    debug!(
        "{}: lock record {} ({}, {})",
        request.target,
        record.version,
        record.resolved.as_deref().unwrap_or("no resolved URL"),
        record.integrity.as_deref().unwrap_or("no integrity")
    );

    if let VersionSelector::Exact(requested) = request.selector {
        if &version != requested {
            return Err(request.error(format!(
                "requested {} but the registry resolved {}",
                requested, version
            )));
        }
    }

    Ok(DependencyReference {
        package: request.package.to_string(),
        selector: request.selector.clone(),
        version,
        descriptor_entry,
        lock_entry,
        package_entry,
    })
}

fn read_json(request: &InstallRequest<'_>, path: &Path) -> Result<JsonValue> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let text = fs::read_to_string(path)
        .map_err(|e| request.error(format!("cannot read {}: {}", name, e)))?;
    serde_json::from_str(&text).map_err(|e| request.error(format!("cannot parse {}: {}", name, e)))
}

/// Projects a `packages` entry onto the legacy `dependencies` record shape.
fn legacy_record(entry: &JsonValue) -> JsonValue {
    let mut record = Map::new();
    for key in ["version", "resolved", "integrity", "dev", "optional"] {
        if let Some(value) = entry.get(key) {
            record.insert(key.to_string(), value.clone());
        }
    }
    JsonValue::Object(record)
}
