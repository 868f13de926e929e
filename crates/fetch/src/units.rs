//! Unit assembly
//!
//! Turns extracted packages and readmes into the directory tree stored for a
//! module version: one unit per package, per directory that was attempted
//! but yielded no package, and per ancestor directory up to the module root.

use std::collections::{BTreeMap, BTreeSet};

use modsite_licenses::Detector;
use modsite_types::{Package, Readme, Unit, STDLIB_MODULE_PATH};

use crate::extract::{dir_of, is_within};

/// Directory of `path` relative to the module root ("" for the root).
fn relative_dir<'a>(module_path: &str, path: &'a str) -> &'a str {
    if module_path == STDLIB_MODULE_PATH {
        if path == STDLIB_MODULE_PATH {
            ""
        } else {
            path
        }
    } else if path == module_path {
        ""
    } else {
        path.strip_prefix(module_path)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path)
    }
}

/// Every unit path implied by `paths`: the paths themselves, their
/// ancestors within the module, and the module root.
#[must_use]
pub fn unit_paths<'a>(module_path: &str, paths: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    let mut out = BTreeSet::from([module_path.to_string()]);
    for path in paths {
        let mut dir = relative_dir(module_path, path);
        while !dir.is_empty() {
            out.insert(crate::extract::import_path(module_path, dir));
            dir = dir_of(dir);
        }
    }
    out
}

/// Readme of the closest directory at or above `dir`. Within one directory
/// the first file by name wins.
fn nearest_readme<'a>(readmes: &'a [Readme], dir: &str) -> Option<&'a Readme> {
    readmes
        .iter()
        .filter(|r| is_within(dir, dir_of(&r.file_path)))
        .max_by(|a, b| {
            let (da, db) = (dir_of(&a.file_path), dir_of(&b.file_path));
            da.len().cmp(&db.len()).then_with(|| b.file_path.cmp(&a.file_path))
        })
}

/// Assemble the units of a module version, sorted by path.
///
/// `extra_dirs` are full paths of directories that must appear even though
/// they carry no package, such as directories whose package failed.
#[must_use]
pub fn assemble_units(
    module_path: &str,
    version: &str,
    packages: Vec<Package>,
    readmes: &[Readme],
    extra_dirs: &[String],
    detector: &Detector,
) -> Vec<Unit> {
    let paths = unit_paths(
        module_path,
        packages
            .iter()
            .map(|p| p.path.as_str())
            .chain(extra_dirs.iter().map(String::as_str)),
    );
    let mut by_path: BTreeMap<String, Package> =
        packages.into_iter().map(|p| (p.path.clone(), p)).collect();

    paths
        .into_iter()
        .map(|path| {
            let dir = relative_dir(module_path, &path);
            let is_redistributable = detector.is_path_redistributable(dir);
            let readme = if is_redistributable {
                nearest_readme(readmes, dir).cloned()
            } else {
                None
            };
            Unit {
                module_path: module_path.to_string(),
                version: version.to_string(),
                is_redistributable,
                licenses: detector.metadata_for(dir),
                readme,
                package: by_path.remove(&path),
                path,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use modsite_archive::{build_module_zip, ModuleZip};

    const MIT: &str = "Permission is hereby granted, free of charge, to any person obtaining a copy of this software, to deal in the Software without restriction. The above copyright notice and this permission notice shall be included in all copies. THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND.";

    fn package(path: &str, module_path: &str) -> Package {
        Package {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            v1_path: modsite_types::version::v1_path(path, module_path),
            is_redistributable: true,
            licenses: Vec::new(),
            imports: Vec::new(),
            documentation: Vec::new(),
        }
    }

    fn detector(module_path: &str, files: &[(&str, &str)]) -> Detector {
        let zip = ModuleZip::open(build_module_zip(module_path, "v1.0.0", files).unwrap()).unwrap();
        Detector::new(module_path, "v1.0.0", &zip)
    }

    #[test]
    fn directory_paths() {
        let cases: &[(&str, &[&str], &[&str])] = &[
            ("github.com/empty/module", &[], &["github.com/empty/module"]),
            ("github.com/r/b", &["github.com/r/b"], &["github.com/r/b"]),
            (
                "github.com/e/es/v7",
                &["github.com/e/es/v7/esapi", "github.com/e/es/v7/internal/version"],
                &[
                    "github.com/e/es/v7",
                    "github.com/e/es/v7/esapi",
                    "github.com/e/es/v7/internal",
                    "github.com/e/es/v7/internal/version",
                ],
            ),
            ("std", &["cmd/go"], &["cmd", "cmd/go", "std"]),
        ];
        for (module_path, packages, want) in cases {
            let got: Vec<String> = unit_paths(module_path, packages.iter().copied()).into_iter().collect();
            assert_eq!(got, *want, "{module_path}");
        }
    }

    #[test]
    fn assembles_packages_readmes_and_licenses() {
        let m = "example.com/m";
        let d = detector(m, &[("LICENSE", MIT), ("a/b/b.go", "package b")]);
        let readmes = vec![
            Readme { file_path: "README.md".into(), contents: "root".into() },
            Readme { file_path: "a/README".into(), contents: "a".into() },
            Readme { file_path: "a/readme.md".into(), contents: "a lower".into() },
        ];
        let units = assemble_units(
            m,
            "v1.0.0",
            vec![package("example.com/m/a/b", m)],
            &readmes,
            &["example.com/m/c".to_string()],
            &d,
        );
        let paths: Vec<&str> = units.iter().map(|u| u.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["example.com/m", "example.com/m/a", "example.com/m/a/b", "example.com/m/c"]
        );
        assert!(units[0].is_module_root());
        assert_eq!(units[0].readme.as_ref().unwrap().contents, "root");
        assert_eq!(units[1].readme.as_ref().unwrap().contents, "a");
        assert_eq!(units[2].readme.as_ref().unwrap().contents, "a");
        assert_eq!(units[3].readme.as_ref().unwrap().contents, "root");
        assert!(units[2].is_package());
        assert!(!units[3].is_package());
        assert!(units.iter().all(|u| u.is_redistributable));
        assert!(units.iter().all(|u| u.licenses.len() == 1));
    }

    #[test]
    fn non_redistributable_units_drop_readmes() {
        let m = "example.com/m";
        let d = detector(m, &[("a/a.go", "package a")]);
        let readmes = vec![Readme { file_path: "README".into(), contents: "r".into() }];
        let units = assemble_units(m, "v1.0.0", vec![package("example.com/m/a", m)], &readmes, &[], &d);
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| !u.is_redistributable && u.readme.is_none()));
    }

    #[test]
    fn stdlib_units_have_no_prefix() {
        let d = detector("std", &[("LICENSE", MIT), ("net/http/h.go", "package http")]);
        let units = assemble_units("std", "v1.21.0", vec![package("net/http", "std")], &[], &[], &d);
        let paths: Vec<&str> = units.iter().map(|u| u.path.as_str()).collect();
        assert_eq!(paths, vec!["net", "net/http", "std"]);
        assert!(units[1].is_package());
        assert!(units[2].is_module_root());
    }
}
