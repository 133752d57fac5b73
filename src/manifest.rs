//! # Manifest Patching
//!
//! Rewrites the translations package entry in a target's `package.json` and
//! `package-lock.json` without disturbing anything else:
//!
//! - key order is preserved (`serde_json` is built with `preserve_order`),
//! - the document's indentation (N spaces or a tab) is detected and reused,
//!   and a document written on a single line stays on a single line,
//! - line endings (`\n` or `\r\n`) are detected and reused, and a trailing
//!   newline is kept if the original had one,
//! - numbers are kept as written (`serde_json` is built with
//!   `arbitrary_precision`),
//! - files are only rewritten when the rendered bytes actually change, so
//!   patching twice with the same dependency is a no-op.
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the original, so a crash leaves either the old or the new content.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value as JsonValue};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::resolver::DependencyReference;

/// Which manifest a document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// `package.json`
    Descriptor,
    /// `package-lock.json`
    Lock,
}

/// A parsed manifest together with the formatting it was read with.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    root: Map<String, JsonValue>,
    indent: String,
    /// Written on one line, without indentation.
    compact: bool,
    line_ending: &'static str,
    trailing_newline: bool,
}

impl ManifestDocument {
    /// Parses a manifest. The root has to be a JSON object.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let value: JsonValue =
            serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;
        let JsonValue::Object(root) = value else {
            return Err("top-level value is not an object".to_string());
        };

        Ok(Self {
            root,
            indent: detect_indent(text),
            compact: !text.trim_end().contains('\n'),
            line_ending: detect_line_ending(text),
            trailing_newline: text.ends_with('\n'),
        })
    }

    /// The `dependencies` mapping, if the document has one.
    pub fn dependencies(&self) -> Option<&Map<String, JsonValue>> {
        self.root.get("dependencies").and_then(JsonValue::as_object)
    }

    pub fn dependency(&self, name: &str) -> Option<&JsonValue> {
        self.dependencies().and_then(|deps| deps.get(name))
    }

    /// Top-level value other than through `dependencies`.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.root.get(key)
    }

    /// Sets `dependencies[name]`, returning whether the value changed.
    ///
    /// A new key is appended at the end of the mapping; an existing key keeps
    /// its position.
    pub fn set_dependency(
        &mut self,
        name: &str,
        value: JsonValue,
    ) -> std::result::Result<bool, String> {
        let deps = self
            .root
            .get_mut("dependencies")
            .and_then(JsonValue::as_object_mut)
            .ok_or_else(|| "document has no \"dependencies\" mapping".to_string())?;

        match deps.get_mut(name) {
            Some(existing) if *existing == value => Ok(false),
            Some(existing) => {
                *existing = value;
                Ok(true)
            }
            None => {
                deps.insert(name.to_string(), value);
                Ok(true)
            }
        }
    }

    /// Replaces `packages[key]` when that entry already exists.
    ///
    /// Returns whether the value changed.
    pub fn replace_package_entry(&mut self, key: &str, value: JsonValue) -> bool {
        let Some(entry) = self
            .root
            .get_mut("packages")
            .and_then(JsonValue::as_object_mut)
            .and_then(|packages| packages.get_mut(key))
        else {
            return false;
        };

        if *entry == value {
            false
        } else {
            *entry = value;
            true
        }
    }

    /// Replaces `packages[""].dependencies[name]` when it already exists.
    ///
    /// Lockfiles from npm 7 and later repeat the descriptor's ranges there.
    pub fn replace_root_package_range(&mut self, name: &str, value: JsonValue) -> bool {
        let Some(range) = self
            .root
            .get_mut("packages")
            .and_then(|packages| packages.get_mut(""))
            .and_then(|root| root.get_mut("dependencies"))
            .and_then(|deps| deps.get_mut(name))
        else {
            return false;
        };

        if *range == value {
            false
        } else {
            *range = value;
            true
        }
    }

    pub fn indent(&self) -> &str {
        &self.indent
    }

    /// Serializes the document with its original formatting conventions.
    pub fn render(&self) -> String {
        let mut out = Vec::new();
        // Writing into a Vec with string keys cannot fail.
        let written = if self.compact {
            serde_json::to_writer(&mut out, &self.root)
        } else {
            let formatter = PrettyFormatter::with_indent(self.indent.as_bytes());
            let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
            self.root.serialize(&mut serializer)
        };
        if written.is_err() {
            return String::new();
        }

        // Raw newlines only occur between tokens; inside strings they are escaped.
        let mut text = String::from_utf8_lossy(&out).into_owned();
        if self.line_ending != "\n" {
            text = text.replace('\n', self.line_ending);
        }
        if self.trailing_newline {
            text.push_str(self.line_ending);
        }
        text
    }
}

/// Applies a resolved dependency to a document.
///
/// Returns whether anything changed.
pub fn apply(
    doc: &mut ManifestDocument,
    kind: ManifestKind,
    dep: &DependencyReference,
) -> std::result::Result<bool, String> {
    match kind {
        ManifestKind::Descriptor => doc.set_dependency(&dep.package, dep.descriptor_entry.clone()),
        ManifestKind::Lock => {
            let mut changed = doc.set_dependency(&dep.package, dep.lock_entry.clone())?;
            if let Some(entry) = &dep.package_entry {
                changed |= doc.replace_package_entry(&dep.package_key(), entry.clone());
                changed |= doc.replace_root_package_range(&dep.package, dep.descriptor_entry.clone());
            }
            Ok(changed)
        }
    }
}

/// Read-modify-write of one manifest file.
///
/// Returns whether the file was rewritten.
pub fn patch_file(
    target: &str,
    path: &Path,
    kind: ManifestKind,
    dep: &DependencyReference,
) -> Result<bool> {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let patch_error = |message: String| Error::Patch {
        target: target.to_string(),
        file: file.clone(),
        message,
    };

    let original = fs::read_to_string(path).map_err(|e| patch_error(format!("cannot read: {}", e)))?;
    let mut doc = ManifestDocument::parse(&original).map_err(patch_error)?;
    apply(&mut doc, kind, dep).map_err(patch_error)?;

    let rendered = doc.render();
    if rendered == original {
        return Ok(false);
    }

    write_atomic(path, &rendered).map_err(|e| patch_error(format!("cannot write: {}", e)))?;
    Ok(true)
}

/// Writes `contents` next to `path` and renames it into place.
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), metadata.permissions())?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// `\r\n` when the document uses it, `\n` otherwise.
pub fn detect_line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Indentation of the first indented line, two spaces when there is none.
pub fn detect_indent(text: &str) -> String {
    text.lines()
        .skip(1)
        .find(|line| !line.trim().is_empty())
        .map(|line| {
            if line.starts_with('\t') {
                "\t".to_string()
            } else {
                let spaces = line.len() - line.trim_start_matches(' ').len();
                if spaces == 0 {
                    "  ".to_string()
                } else {
                    " ".repeat(spaces)
                }
            }
        })
        .unwrap_or_else(|| "  ".to_string())
}
