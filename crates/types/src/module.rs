//! Module and unit type definitions

use crate::{BuildContext, LicenseMetadata, License, VersionType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity and top-level metadata of one module version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub module_path: String,
    pub version: String,
    pub commit_time: DateTime<Utc>,
    pub version_type: VersionType,
    pub is_redistributable: bool,
    pub has_go_mod: bool,
    /// Text following `Deprecated:` in the go.mod module comment.
    pub deprecated_comment: Option<String>,
}

/// A fully assembled module, the unit of atomicity handed to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub info: ModuleInfo,
    pub licenses: Vec<License>,
    /// Sorted by path. Always contains the module root.
    pub units: Vec<Unit>,
}

impl Module {
    /// Look up a unit by its full path.
    #[must_use]
    pub fn unit(&self, path: &str) -> Option<&Unit> {
        self.units
            .binary_search_by(|u| u.path.as_str().cmp(path))
            .ok()
            .map(|idx| &self.units[idx])
    }

    /// Iterate over the units that carry a package.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.units.iter().filter_map(|u| u.package.as_ref())
    }
}

/// A directory-tree node: module root, plain directory, package, or several at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub path: String,
    pub module_path: String,
    pub version: String,
    pub is_redistributable: bool,
    pub licenses: Vec<LicenseMetadata>,
    pub readme: Option<Readme>,
    pub package: Option<Package>,
}

impl Unit {
    #[must_use]
    pub fn is_module_root(&self) -> bool {
        self.path == self.module_path
    }

    #[must_use]
    pub fn is_package(&self) -> bool {
        self.package.is_some()
    }
}

/// A package extracted from a module zip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub path: String,
    pub name: String,
    /// Path with any major-version suffix removed from the module part.
    pub v1_path: String,
    pub is_redistributable: bool,
    pub licenses: Vec<LicenseMetadata>,
    pub imports: Vec<String>,
    /// One entry per matching build context; the first is canonical.
    pub documentation: Vec<Documentation>,
}

impl Package {
    /// Synopsis of the canonical documentation.
    #[must_use]
    pub fn synopsis(&self) -> &str {
        self.documentation
            .first()
            .map_or("", |doc| doc.synopsis.as_str())
    }
}

/// Rendered documentation for one build context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    pub build_context: BuildContext,
    pub synopsis: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readme {
    pub file_path: String,
    pub contents: String,
}
