//! Property-based tests for manifest patching.
//!
//! These tests use proptest to generate random manifests and verify that
//! patching is stable and never touches unrelated content.

#[cfg(test)]
mod proptest_tests {
    use crate::manifest::{apply, ManifestDocument, ManifestKind};
    use crate::resolver::{DependencyReference, VersionSelector};
    use proptest::prelude::*;
    use semver::Version;
    use serde::Serialize;
    use serde_json::ser::PrettyFormatter;
    use serde_json::{json, Map, Value as JsonValue};

    const PACKAGE: &str = "@surikat/lx-translations";

    fn dependency(major: u64, minor: u64, patch: u64) -> DependencyReference {
        let version = Version::new(major, minor, patch);
        DependencyReference {
            package: PACKAGE.to_string(),
            selector: VersionSelector::Latest,
            descriptor_entry: json!(format!("^{}", version)),
            lock_entry: json!({ "version": version.to_string(), "integrity": "sha512-x" }),
            package_entry: None,
            version,
        }
    }

    fn manifest_text(
        deps: &[(String, String)],
        scripts: &[(String, String)],
        include_target: bool,
        indent: usize,
    ) -> String {
        let mut dependencies = Map::new();
        for (name, range) in deps {
            dependencies.insert(name.clone(), json!(range));
        }
        if include_target {
            dependencies.insert(PACKAGE.to_string(), json!("^0.1.0"));
        }

        let mut script_map = Map::new();
        for (name, command) in scripts {
            script_map.insert(name.clone(), json!(command));
        }

        let mut root = Map::new();
        root.insert("name".to_string(), json!("generated"));
        root.insert("scripts".to_string(), JsonValue::Object(script_map));
        root.insert("dependencies".to_string(), JsonValue::Object(dependencies));

        let indent = " ".repeat(indent);
        let mut out = Vec::new();
        let formatter = PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        root.serialize(&mut serializer).unwrap();
        String::from_utf8(out).unwrap() + "\n"
    }

    fn deps_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::vec(("[a-z][a-z0-9-]{0,10}", "\\^[0-9]\\.[0-9]\\.[0-9]"), 0..8)
    }

    fn scripts_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::vec(("[a-z]{1,8}", "[a-z ./-]{0,20}"), 0..4)
    }

    proptest! {
        /// Property: patching twice yields the same bytes as patching once
        #[test]
        fn patch_is_idempotent(
            deps in deps_strategy(),
            include_target in any::<bool>(),
            major in 0u64..10, minor in 0u64..20, patch in 0u64..20,
        ) {
            let text = manifest_text(&deps, &[], include_target, 2);
            let dep = dependency(major, minor, patch);

            let mut once = ManifestDocument::parse(&text).unwrap();
            apply(&mut once, ManifestKind::Descriptor, &dep).unwrap();
            let first = once.render();

            let mut twice = ManifestDocument::parse(&first).unwrap();
            let changed = apply(&mut twice, ManifestKind::Descriptor, &dep).unwrap();

            prop_assert!(!changed);
            prop_assert_eq!(twice.render(), first);
        }

        /// Property: only dependencies[PACKAGE] changes
        #[test]
        fn patch_preserves_unrelated_content(
            deps in deps_strategy(),
            scripts in scripts_strategy(),
            include_target in any::<bool>(),
            major in 0u64..10,
        ) {
            let text = manifest_text(&deps, &scripts, include_target, 2);
            let dep = dependency(major, 0, 0);

            let before = ManifestDocument::parse(&text).unwrap();
            let mut after = before.clone();
            apply(&mut after, ManifestKind::Lock, &dep).unwrap();

            prop_assert_eq!(after.get("name"), before.get("name"));
            prop_assert_eq!(after.get("scripts"), before.get("scripts"));

            let old = before.dependencies().unwrap();
            let new = after.dependencies().unwrap();
            for (name, value) in old {
                if name != PACKAGE {
                    prop_assert_eq!(new.get(name), Some(value));
                }
            }
            prop_assert_eq!(new.get(PACKAGE), Some(&dep.lock_entry));
            prop_assert_eq!(
                new.len(),
                old.len() + usize::from(!old.contains_key(PACKAGE))
            );
        }

        /// Property: rendering an unpatched document reproduces it
        #[test]
        fn render_reproduces_input(
            deps in deps_strategy(),
            indent in 1usize..8,
        ) {
            let text = manifest_text(&deps, &[], true, indent);
            let doc = ManifestDocument::parse(&text).unwrap();
            prop_assert_eq!(doc.render(), text);
        }
    }
}
