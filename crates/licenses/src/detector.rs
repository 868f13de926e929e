//! License file discovery and governing-license lookup

use std::collections::BTreeSet;

use modsite_archive::{module_prefix, ModuleZip};
use modsite_types::{License, LicenseMetadata};

use crate::{KeywordClassifier, LicenseClassifier, REDISTRIBUTABLE_TYPES};

/// License files larger than this are recorded without contents and treated
/// as not redistributable.
pub const MAX_LICENSE_SIZE: u64 = 1024 * 1024;

/// Minimum coverage for a classified license to count as redistributable.
pub const MIN_COVERAGE: f64 = 75.0;

const LICENSE_BASES: &[&str] = &["license", "licence", "copying", "unlicense", "unlicence"];
const LICENSE_EXTS: &[&str] = &["", ".md", ".markdown", ".txt", ".rst", ".code", ".docs"];
const LICENSE_EXTRA: &[&str] = &[
    "license-2.0.txt",
    "licence-2.0.txt",
    "license-apache",
    "licence-apache",
    "license-apache-2.0.txt",
    "licence-apache-2.0.txt",
    "license-mit",
    "licence-mit",
    "license.mit",
    "licence.mit",
    "mit-license",
    "mit-licence",
    "mit-license.md",
    "mit-licence.md",
    "mit-license.txt",
    "mit-licence.txt",
    "mit_license",
    "mit_licence",
];

/// Whether `name` (a bare file name) is recognized as a license file.
#[must_use]
pub fn is_license_file_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if LICENSE_EXTRA.contains(&lower.as_str()) {
        return true;
    }
    LICENSE_BASES.iter().any(|base| {
        lower
            .strip_prefix(base)
            .is_some_and(|ext| LICENSE_EXTS.contains(&ext))
    })
}

fn dir_of(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

/// Whether `dir` is `ancestor` or lies beneath it. Both are relative to the
/// module root; the root itself is the empty string.
fn is_within(dir: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || dir == ancestor
        || (dir.starts_with(ancestor) && dir.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Licenses of one module version.
#[derive(Debug, Clone)]
pub struct Detector {
    module_path: String,
    version: String,
    licenses: Vec<License>,
}

impl Detector {
    /// Scan `zip` for license files with the default classifier.
    #[must_use]
    pub fn new(module_path: &str, version: &str, zip: &ModuleZip) -> Self {
        Self::with_classifier(module_path, version, zip, &KeywordClassifier)
    }

    /// Scan `zip` for license files, classifying them with `classifier`.
    ///
    /// Files under `vendor/` and inside nested modules (directories with their
    /// own go.mod) are ignored.
    #[must_use]
    pub fn with_classifier(
        module_path: &str,
        version: &str,
        zip: &ModuleZip,
        classifier: &dyn LicenseClassifier,
    ) -> Self {
        let prefix = module_prefix(module_path, version);
        let nested: BTreeSet<&str> = zip
            .entries()
            .iter()
            .filter_map(|e| e.name.strip_prefix(&prefix))
            .filter_map(|rel| rel.strip_suffix("/go.mod"))
            .collect();

        let mut licenses = Vec::new();
        for entry in zip.entries() {
            if entry.is_dir {
                continue;
            }
            let Some(rel) = entry.name.strip_prefix(&prefix) else {
                continue;
            };
            let file_name = rel.rsplit('/').next().unwrap_or(rel);
            if !is_license_file_name(file_name) {
                continue;
            }
            let dir = dir_of(rel);
            if dir.split('/').any(|seg| seg == "vendor")
                || nested.iter().any(|n| is_within(dir, n))
            {
                continue;
            }
            let (contents, classification) = match zip.read_entry(entry, MAX_LICENSE_SIZE) {
                Ok(contents) => {
                    let c = classifier.classify(&contents);
                    (contents, c)
                }
                Err(e) => {
                    tracing::warn!(module_path, version, file = rel, error = %e, "skipping license contents");
                    (
                        Vec::new(),
                        crate::Classification {
                            types: Vec::new(),
                            coverage: 0.0,
                        },
                    )
                }
            };
            let is_redistributable = !classification.types.is_empty()
                && classification.coverage >= MIN_COVERAGE
                && classification
                    .types
                    .iter()
                    .all(|t| REDISTRIBUTABLE_TYPES.contains(&t.as_str()));
            licenses.push(License {
                metadata: LicenseMetadata {
                    types: classification.types,
                    file_path: rel.to_string(),
                    coverage: classification.coverage,
                },
                is_redistributable,
                contents,
            });
        }
        licenses.sort_by(|a, b| a.metadata.file_path.cmp(&b.metadata.file_path));
        Self {
            module_path: module_path.to_string(),
            version: version.to_string(),
            licenses,
        }
    }

    #[must_use]
    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Every license found, sorted by file path.
    #[must_use]
    pub fn all_licenses(&self) -> &[License] {
        &self.licenses
    }

    /// Licenses governing `dir` (relative to the module root): those in `dir`
    /// itself or any ancestor.
    pub fn governing(&self, dir: &str) -> impl Iterator<Item = &License> + '_ {
        let dir = dir.trim_matches('/').to_string();
        self.licenses
            .iter()
            .filter(move |l| is_within(&dir, l.directory()))
    }

    /// Metadata of the licenses governing `dir`.
    #[must_use]
    pub fn metadata_for(&self, dir: &str) -> Vec<LicenseMetadata> {
        self.governing(dir).map(|l| l.metadata.clone()).collect()
    }

    /// Whether content in `dir` may be redistributed.
    #[must_use]
    pub fn is_path_redistributable(&self, dir: &str) -> bool {
        let mut any = false;
        for license in self.governing(dir) {
            if !license.is_redistributable {
                return false;
            }
            any = true;
        }
        any
    }

    /// Whether the module as a whole may be redistributed, judged by the
    /// licenses at its root.
    #[must_use]
    pub fn is_module_redistributable(&self) -> bool {
        let mut root = self.licenses.iter().filter(|l| l.directory().is_empty()).peekable();
        root.peek().is_some() && root.all(|l| l.is_redistributable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modsite_archive::build_module_zip;

    const MIT: &str = "Permission is hereby granted, free of charge, to any person obtaining a copy of this software, to deal in the Software without restriction. The above copyright notice and this permission notice shall be included in all copies. THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND.";
    const PROPRIETARY: &str = "Copyright 2020 Acme. All rights reserved.";

    fn detector(files: &[(&str, &str)]) -> Detector {
        let data = build_module_zip("example.com/m", "v1.0.0", files).unwrap();
        let zip = ModuleZip::open(data).unwrap();
        Detector::new("example.com/m", "v1.0.0", &zip)
    }

    #[test]
    fn recognizes_license_names() {
        for name in ["LICENSE", "license.md", "COPYING", "LICENCE.txt", "LICENSE-MIT", "UNLICENSE"] {
            assert!(is_license_file_name(name), "{name}");
        }
        for name in ["LICENSE.go", "README", "license_test.go", "LICENSES"] {
            assert!(!is_license_file_name(name), "{name}");
        }
    }

    #[test]
    fn root_license_governs_everything() {
        let d = detector(&[("LICENSE", MIT), ("a/a.go", "package a")]);
        assert!(d.is_module_redistributable());
        assert!(d.is_path_redistributable("a"));
        assert!(d.is_path_redistributable("a/b/c"));
        assert_eq!(d.metadata_for("a").len(), 1);
    }

    #[test]
    fn no_license_is_not_redistributable() {
        let d = detector(&[("a/a.go", "package a")]);
        assert!(!d.is_module_redistributable());
        assert!(!d.is_path_redistributable("a"));
        assert!(d.all_licenses().is_empty());
    }

    #[test]
    fn nested_license_is_conjunction() {
        let d = detector(&[
            ("LICENSE", MIT),
            ("a/LICENSE", PROPRIETARY),
            ("a/a.go", "package a"),
            ("ab/ab.go", "package ab"),
        ]);
        assert!(d.is_module_redistributable());
        assert!(!d.is_path_redistributable("a"));
        assert!(!d.is_path_redistributable("a/sub"));
        // Sibling with a shared name prefix is not governed by a/LICENSE.
        assert!(d.is_path_redistributable("ab"));
        assert_eq!(d.metadata_for("a").len(), 2);
    }

    #[test]
    fn license_only_in_subdirectory() {
        let d = detector(&[("a/LICENSE", MIT), ("a/a.go", "package a"), ("b/b.go", "package b")]);
        assert!(!d.is_module_redistributable());
        assert!(d.is_path_redistributable("a"));
        assert!(!d.is_path_redistributable("b"));
    }

    #[test]
    fn vendor_and_nested_modules_ignored() {
        let d = detector(&[
            ("LICENSE", MIT),
            ("vendor/x/LICENSE", PROPRIETARY),
            ("sub/go.mod", "module example.com/m/sub"),
            ("sub/LICENSE", PROPRIETARY),
        ]);
        assert_eq!(d.all_licenses().len(), 1);
        assert!(d.is_path_redistributable("sub"));
    }
}
