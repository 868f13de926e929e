//! Content extraction
//!
//! Walks a module zip, groups `.go` files into packages by directory,
//! applies build constraints per build context and renders documentation.
//! Problems with one package are recorded as that package's state and never
//! abort the module; the caller decides what an empty result means.

use std::collections::{BTreeMap, BTreeSet};

use modsite_archive::{module_prefix, ModuleZip, ZipEntry};
use modsite_config::FetchConfig;
use modsite_errors::{status, Error, FetchError};
use modsite_licenses::Detector;
use modsite_types::{
    version, BuildContext, Documentation, Package, PackageVersionState, Readme,
    STDLIB_MODULE_PATH,
};

use crate::buildctx::FileConstraints;
use crate::godoc::{self, RenderLimits, SourceFile};

/// Shown in place of documentation that exceeded the HTML ceiling.
pub const DOCUMENTATION_TOO_LARGE_HTML: &str =
    "<p>Documentation is too large to display.</p>";

/// Limits applied during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractLimits {
    pub max_file_size: u64,
    pub max_documentation_html: u64,
    pub max_imports_per_package: usize,
    pub render: RenderLimits,
    /// Contexts tried for every package, in preference order.
    pub build_contexts: Vec<BuildContext>,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        let config = FetchConfig::default();
        Self {
            max_file_size: config.max_file_size,
            max_documentation_html: config.max_documentation_html,
            max_imports_per_package: config.max_imports_per_package,
            render: RenderLimits::from_config(&config),
            build_contexts: BuildContext::defaults(),
        }
    }
}

impl ExtractLimits {
    /// Limits from the `[fetch]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured build context is malformed.
    pub fn from_config(config: &FetchConfig) -> Result<Self, Error> {
        Ok(Self {
            max_file_size: config.max_file_size,
            max_documentation_html: config.max_documentation_html,
            max_imports_per_package: config.max_imports_per_package,
            render: RenderLimits::from_config(config),
            build_contexts: config.build_contexts()?,
        })
    }
}

/// Packages and per-package states of one module version.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub packages: Vec<Package>,
    /// One per attempted package directory, sorted by path.
    pub states: Vec<PackageVersionState>,
}

impl Extraction {
    /// Fail with `BadModule` when no package survived.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::BadModule` if the module contains no packages.
    pub fn ensure_packages(&self) -> Result<(), FetchError> {
        if self.packages.is_empty() {
            Err(FetchError::bad_module("module contains 0 packages"))
        } else {
            Ok(())
        }
    }

    /// Paths whose package was dropped entirely.
    #[must_use]
    pub fn failed_paths(&self) -> Vec<String> {
        self.states
            .iter()
            .filter(|s| {
                s.status != status::OK && s.status != status::DOCUMENTATION_HTML_TOO_LARGE
            })
            .map(|s| s.package_path.clone())
            .collect()
    }

    #[must_use]
    pub fn has_incomplete_packages(&self) -> bool {
        self.states.iter().any(|s| s.status != status::OK)
    }
}

/// Path of a zip entry relative to the module root, or `None` when the
/// entry does not belong to the module proper: outside the prefix, under a
/// `vendor` or `testdata` directory or a directory starting with `.` or `_`,
/// or inside a nested module.
fn module_relative<'a>(name: &'a str, prefix: &str, nested: &BTreeSet<String>) -> Option<&'a str> {
    let rel = name.strip_prefix(prefix)?;
    let dir = dir_of(rel);
    if !dir.is_empty()
        && dir.split('/').any(|seg| {
            seg == "vendor" || seg == "testdata" || seg.starts_with('.') || seg.starts_with('_')
        })
    {
        return None;
    }
    if nested.iter().any(|n| is_within(dir, n)) {
        return None;
    }
    Some(rel)
}

/// Directories (relative to the module root) that hold their own go.mod.
fn nested_modules(zip: &ModuleZip, prefix: &str) -> BTreeSet<String> {
    zip.entries()
        .iter()
        .filter_map(|e| e.name.strip_prefix(prefix))
        .filter_map(|rel| rel.strip_suffix("/go.mod"))
        .map(ToString::to_string)
        .collect()
}

pub(crate) fn dir_of(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

pub(crate) fn is_within(dir: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || dir == ancestor
        || (dir.starts_with(ancestor) && dir.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Import path of the package in directory `dir` (relative to the module root).
#[must_use]
pub fn import_path(module_path: &str, dir: &str) -> String {
    if module_path == STDLIB_MODULE_PATH {
        if dir.is_empty() {
            STDLIB_MODULE_PATH.to_string()
        } else {
            dir.to_string()
        }
    } else if dir.is_empty() {
        module_path.to_string()
    } else {
        format!("{module_path}/{dir}")
    }
}

/// Whether `path` is a well-formed import path: non-empty slash-separated
/// elements of letters, digits and `-._~+`, none starting or ending with a
/// dot.
#[must_use]
pub fn check_import_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('/').all(|elem| {
            !elem.is_empty()
                && !elem.starts_with('.')
                && !elem.ends_with('.')
                && elem
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-._~+".contains(c))
        })
}

fn is_readme(file_name: &str) -> bool {
    let stem = file_name.split_once('.').map_or(file_name, |(stem, _)| stem);
    stem.eq_ignore_ascii_case("readme")
}

/// Collect README files, skipping those over the per-file ceiling.
#[must_use]
pub fn extract_readmes(
    module_path: &str,
    version: &str,
    zip: &ModuleZip,
    max_file_size: u64,
) -> Vec<Readme> {
    let prefix = module_prefix(module_path, version);
    let nested = nested_modules(zip, &prefix);
    let mut readmes = Vec::new();
    for entry in zip.entries().iter().filter(|e| !e.is_dir) {
        let Some(rel) = module_relative(&entry.name, &prefix, &nested) else {
            continue;
        };
        let file_name = rel.rsplit('/').next().unwrap_or(rel);
        if !is_readme(file_name) {
            continue;
        }
        match zip.read_entry(entry, max_file_size) {
            Ok(contents) => readmes.push(Readme {
                file_path: rel.to_string(),
                contents: String::from_utf8_lossy(&contents).into_owned(),
            }),
            Err(e) => {
                tracing::warn!(module_path, version, file = rel, error = %e, "skipping readme");
            }
        }
    }
    readmes.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    readmes
}

struct PackageFailure {
    status: u16,
    message: String,
}

impl PackageFailure {
    fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Extract every package of the module.
///
/// # Errors
///
/// Returns `FetchError::BadModule` if an entry lies outside the
/// `module@version/` prefix. Per-package problems are reported in the
/// returned states instead.
pub fn extract_packages(
    module_path: &str,
    version: &str,
    zip: &ModuleZip,
    detector: &Detector,
    limits: &ExtractLimits,
) -> Result<Extraction, FetchError> {
    let prefix = module_prefix(module_path, version);
    zip.check_prefix(&prefix)
        .map_err(|e| FetchError::bad_module(format!("module zip is malformed: {e}")))?;
    let nested = nested_modules(zip, &prefix);

    let mut dirs: BTreeMap<&str, Vec<&ZipEntry>> = BTreeMap::new();
    for entry in zip.entries().iter().filter(|e| !e.is_dir) {
        let Some(rel) = module_relative(&entry.name, &prefix, &nested) else {
            continue;
        };
        let file_name = rel.rsplit('/').next().unwrap_or(rel);
        if !file_name.ends_with(".go")
            || file_name.ends_with("_test.go")
            || file_name.starts_with(['.', '_'])
        {
            continue;
        }
        dirs.entry(dir_of(rel)).or_default().push(entry);
    }

    let mut extraction = Extraction::default();
    for (dir, entries) in dirs {
        let path = import_path(module_path, dir);
        let state = PackageVersionState::new(&path, module_path, version, status::OK);
        match load_package(module_path, &path, dir, zip, &entries, detector, limits) {
            Ok((package, None)) => {
                extraction.packages.push(package);
                extraction.states.push(state);
            }
            Ok((package, Some(failure))) => {
                tracing::info!(package = %path, status = failure.status, error = %failure.message, "package degraded");
                extraction.packages.push(package);
                extraction
                    .states
                    .push(PackageVersionState { status: failure.status, ..state }.with_error(failure.message));
            }
            Err(failure) => {
                tracing::info!(package = %path, status = failure.status, error = %failure.message, "package skipped");
                extraction
                    .states
                    .push(PackageVersionState { status: failure.status, ..state }.with_error(failure.message));
            }
        }
    }
    Ok(extraction)
}

type LoadResult = Result<(Package, Option<PackageFailure>), PackageFailure>;

fn load_package(
    module_path: &str,
    path: &str,
    dir: &str,
    zip: &ModuleZip,
    entries: &[&ZipEntry],
    detector: &Detector,
    limits: &ExtractLimits,
) -> LoadResult {
    if !check_import_path(path) {
        return Err(PackageFailure::new(
            status::BAD_IMPORT_PATH,
            format!("invalid import path {path:?}"),
        ));
    }
    if let Some(big) = entries.iter().find(|e| e.size > limits.max_file_size) {
        tracing::warn!(file = %big.name, size = big.size, max = limits.max_file_size, "file exceeds size limit");
        return Err(PackageFailure::new(
            status::MAX_FILE_SIZE_LIMIT_EXCEEDED,
            format!(
                "file {} size={} exceeds max {}",
                big.name, big.size, limits.max_file_size
            ),
        ));
    }

    let mut files: Vec<(SourceFile, FileConstraints)> = Vec::with_capacity(entries.len());
    for entry in entries {
        let file_name = entry.name.rsplit('/').next().unwrap_or(&entry.name);
        let bytes = zip
            .read_entry(entry, limits.max_file_size)
            .map_err(|e| PackageFailure::new(status::INVALID_CONTENTS, e.to_string()))?;
        let src = String::from_utf8(bytes).map_err(|_| {
            PackageFailure::new(status::INVALID_CONTENTS, format!("{file_name}: not valid UTF-8"))
        })?;
        let constraints = FileConstraints::from_source(&src)
            .map_err(|e| PackageFailure::new(status::INVALID_CONTENTS, format!("{file_name}: {e}")))?;
        let parsed = godoc::parse_file(file_name, &src, &limits.render)
            .map_err(|e| PackageFailure::new(status::INVALID_CONTENTS, format!("{file_name}: {e}")))?;
        files.push((parsed, constraints));
    }

    // Files matched per context; identical sets share one rendering.
    let mut variants: Vec<(BuildContext, Vec<&SourceFile>)> = Vec::new();
    for ctx in &limits.build_contexts {
        let matched: Vec<&SourceFile> = files
            .iter()
            .filter(|(f, c)| c.matches(&f.name, ctx))
            .map(|(f, _)| f)
            .collect();
        if !matched.is_empty() {
            variants.push((ctx.clone(), matched));
        }
    }
    if variants.is_empty() {
        return Err(PackageFailure::new(
            status::BUILD_CONTEXT_NOT_SUPPORTED,
            "no files match any supported build context",
        ));
    }
    let same_everywhere = variants.len() == limits.build_contexts.len()
        && variants.windows(2).all(|w| {
            w[0].1.iter().map(|f| &f.name).eq(w[1].1.iter().map(|f| &f.name))
        });
    if same_everywhere {
        variants.truncate(1);
        variants[0].0 = BuildContext::all();
    }

    let canonical = &variants[0].1;
    let name = canonical[0].package_name.clone();
    if let Some(other) = canonical.iter().find(|f| f.package_name != name) {
        return Err(PackageFailure::new(
            status::INVALID_CONTENTS,
            format!(
                "found packages {name} and {} in {}",
                other.package_name,
                if dir.is_empty() { "module root" } else { dir }
            ),
        ));
    }
    let imports: Vec<String> = canonical
        .iter()
        .flat_map(|f| f.imports.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if imports.len() > limits.max_imports_per_package {
        return Err(PackageFailure::new(
            status::MAX_IMPORTS_LIMIT_EXCEEDED,
            format!(
                "{} imports exceeds max {}",
                imports.len(),
                limits.max_imports_per_package
            ),
        ));
    }

    let is_redistributable = detector.is_path_redistributable(dir);
    let mut degraded = None;
    let mut documentation = Vec::with_capacity(variants.len());
    for (ctx, matched) in &variants {
        let (synopsis, html) = if is_redistributable {
            let html = godoc::render_html(path, matched);
            let synopsis = godoc::synopsis(&godoc::package_doc(matched));
            if html.len() as u64 > limits.max_documentation_html {
                degraded = Some(PackageFailure::new(
                    status::DOCUMENTATION_HTML_TOO_LARGE,
                    format!(
                        "{ctx}: documentation size={} exceeds max {}",
                        html.len(),
                        limits.max_documentation_html
                    ),
                ));
                (synopsis, DOCUMENTATION_TOO_LARGE_HTML.to_string())
            } else {
                (synopsis, html)
            }
        } else {
            (String::new(), String::new())
        };
        documentation.push(Documentation {
            build_context: ctx.clone(),
            synopsis,
            html,
        });
    }

    let package = Package {
        path: path.to_string(),
        name,
        v1_path: version::v1_path(path, module_path),
        is_redistributable,
        licenses: detector.metadata_for(dir),
        imports,
        documentation,
    };
    Ok((package, degraded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use modsite_archive::build_module_zip;

    const MIT: &str = "Permission is hereby granted, free of charge, to any person obtaining a copy of this software, to deal in the Software without restriction. The above copyright notice and this permission notice shall be included in all copies. THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND.";

    fn run(files: &[(&str, &str)], limits: &ExtractLimits) -> Extraction {
        let data = build_module_zip("example.com/m", "v1.0.0", files).unwrap();
        let zip = ModuleZip::open(data).unwrap();
        let detector = Detector::new("example.com/m", "v1.0.0", &zip);
        extract_packages("example.com/m", "v1.0.0", &zip, &detector, limits).unwrap()
    }

    fn statuses(e: &Extraction) -> Vec<(String, u16)> {
        e.states
            .iter()
            .map(|s| (s.package_path.clone(), s.status))
            .collect()
    }

    #[test]
    fn groups_files_and_filters_directories() {
        let e = run(
            &[
                ("LICENSE", MIT),
                ("m.go", "// Package m is the root.\npackage m\n\nimport \"fmt\"\n"),
                ("m_test.go", "package m\n"),
                ("a/a.go", "// Package a does A.\npackage a\n"),
                ("a/b.go", "package a\n\nimport \"io\"\n"),
                ("vendor/x/x.go", "package x\n"),
                ("testdata/t.go", "package t\n"),
                ("_hidden/h.go", "package h\n"),
                (".git/g.go", "package g\n"),
                ("nested/go.mod", "module example.com/m/nested\n"),
                ("nested/n.go", "package nested\n"),
                ("a/notes.txt", "not go"),
            ],
            &ExtractLimits::default(),
        );
        assert_eq!(
            statuses(&e),
            vec![
                ("example.com/m".to_string(), 200),
                ("example.com/m/a".to_string(), 200)
            ]
        );
        let a = &e.packages[1];
        assert_eq!(a.name, "a");
        assert_eq!(a.imports, vec!["io"]);
        assert_eq!(a.synopsis(), "Package a does A.");
        assert!(a.is_redistributable);
        assert_eq!(a.documentation.len(), 1);
        assert!(a.documentation[0].build_context.is_all());
        assert!(!e.has_incomplete_packages());
    }

    #[test]
    fn oversized_file_excludes_package() {
        let limits = ExtractLimits {
            max_file_size: 64,
            ..ExtractLimits::default()
        };
        let big = format!("package b\n\n// {}\n", "x".repeat(100));
        let e = run(
            &[("LICENSE", MIT), ("a/a.go", "package a\n"), ("b/b.go", &big)],
            &limits,
        );
        assert_eq!(
            statuses(&e),
            vec![
                ("example.com/m/a".to_string(), 200),
                ("example.com/m/b".to_string(), status::MAX_FILE_SIZE_LIMIT_EXCEEDED)
            ]
        );
        assert_eq!(e.packages.len(), 1);
        assert_eq!(e.failed_paths(), vec!["example.com/m/b"]);
        assert!(e.has_incomplete_packages());
    }

    #[test]
    fn build_context_variants() {
        let e = run(
            &[
                ("LICENSE", MIT),
                ("p/p_linux.go", "// Package p on linux.\npackage p\n"),
                ("p/p_windows.go", "// Package p on windows.\npackage p\n"),
                ("w/w.go", "//go:build plan9\n\npackage w\n"),
            ],
            &ExtractLimits::default(),
        );
        assert_eq!(
            statuses(&e),
            vec![
                ("example.com/m/p".to_string(), 200),
                ("example.com/m/w".to_string(), status::BUILD_CONTEXT_NOT_SUPPORTED)
            ]
        );
        let p = &e.packages[0];
        let contexts: Vec<String> = p
            .documentation
            .iter()
            .map(|d| d.build_context.to_string())
            .collect();
        assert_eq!(contexts, vec!["linux/amd64", "windows/amd64"]);
        assert_eq!(p.synopsis(), "Package p on linux.");
    }

    #[test]
    fn package_level_failures() {
        let limits = ExtractLimits {
            max_imports_per_package: 1,
            max_documentation_html: 300,
            ..ExtractLimits::default()
        };
        let long_doc = format!("// Package d {}.\npackage d\n", "word ".repeat(100));
        let e = run(
            &[
                ("LICENSE", MIT),
                ("bad/x.go", "package x\n"),
                ("bad/y.go", "package y\n"),
                ("broken/b.go", "package broken\nfunc F() {\n"),
                ("d/d.go", &long_doc),
                ("imp/i.go", "package imp\n\nimport (\n\t\"a\"\n\t\"b\"\n)\n"),
                ("bad path!/p.go", "package p\n"),
            ],
            &limits,
        );
        assert_eq!(
            statuses(&e),
            vec![
                ("example.com/m/bad".to_string(), status::INVALID_CONTENTS),
                ("example.com/m/bad path!".to_string(), status::BAD_IMPORT_PATH),
                ("example.com/m/broken".to_string(), status::INVALID_CONTENTS),
                ("example.com/m/d".to_string(), status::DOCUMENTATION_HTML_TOO_LARGE),
                ("example.com/m/imp".to_string(), status::MAX_IMPORTS_LIMIT_EXCEEDED),
            ]
        );
        assert_eq!(e.packages.len(), 1);
        assert_eq!(e.packages[0].documentation[0].html, DOCUMENTATION_TOO_LARGE_HTML);
        assert_eq!(e.failed_paths().len(), 4);
    }

    #[test]
    fn hostile_sources_fail_only_their_package() {
        let not_chain = format!("//go:build {}linux\n\npackage a\n", "!".repeat(300_000));
        let plus_chain = format!("// +build {}\n\npackage b\n", vec!["linux"; 300_000].join(","));
        let depth = godoc::MAX_NESTING + 1;
        let nested = format!("package c\n\nvar X = {}{}\n", "T{".repeat(depth), "}".repeat(depth));
        let e = run(
            &[
                ("LICENSE", MIT),
                ("a/a.go", &not_chain),
                ("b/b.go", &plus_chain),
                ("c/c.go", &nested),
                ("ok/ok.go", "package ok\n"),
            ],
            &ExtractLimits::default(),
        );
        assert_eq!(
            statuses(&e),
            vec![
                ("example.com/m/a".to_string(), status::INVALID_CONTENTS),
                ("example.com/m/b".to_string(), status::INVALID_CONTENTS),
                ("example.com/m/c".to_string(), status::INVALID_CONTENTS),
                ("example.com/m/ok".to_string(), 200),
            ]
        );
        assert!(e.states.iter().all(|s| s.error.as_ref().is_none_or(|m| m.len() < 200)));
    }

    #[test]
    fn non_redistributable_packages_keep_no_docs() {
        let e = run(&[("a/a.go", "// Package a is secret.\npackage a\n")], &ExtractLimits::default());
        let a = &e.packages[0];
        assert!(!a.is_redistributable);
        assert_eq!(a.synopsis(), "");
        assert!(a.documentation[0].html.is_empty());
    }

    #[test]
    fn zero_packages_is_bad_module() {
        let e = run(&[("README.md", "# nothing")], &ExtractLimits::default());
        assert!(matches!(e.ensure_packages(), Err(FetchError::BadModule { .. })));
    }

    #[test]
    fn readmes() {
        let data = build_module_zip(
            "example.com/m",
            "v1.0.0",
            &[
                ("README.md", "root"),
                ("a/readme", "about a"),
                ("a/README.txt", "a txt"),
                ("vendor/x/README", "vendored"),
                ("b/READMEs.go", "package b"),
            ],
        )
        .unwrap();
        let zip = ModuleZip::open(data).unwrap();
        let readmes = extract_readmes("example.com/m", "v1.0.0", &zip, 1024);
        let paths: Vec<&str> = readmes.iter().map(|r| r.file_path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "a/README.txt", "a/readme"]);
        assert!(extract_readmes("example.com/m", "v1.0.0", &zip, 2).is_empty());
    }

    #[test]
    fn import_paths() {
        assert_eq!(import_path("std", "net/http"), "net/http");
        assert_eq!(import_path("std", ""), "std");
        assert_eq!(import_path("example.com/m", ""), "example.com/m");
        assert_eq!(import_path("example.com/m", "a/b"), "example.com/m/a/b");
        assert!(check_import_path("example.com/m/a-b_c.d~e+f"));
        assert!(!check_import_path("example.com/m/has space"));
        assert!(!check_import_path("example.com//m"));
        assert!(!check_import_path("example.com/.hidden"));
    }
}
