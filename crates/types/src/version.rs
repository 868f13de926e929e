//! Module version helpers
//!
//! Module versions are semantic versions with a leading `v`
//! (`v1.2.3`, `v2.0.0-rc.1`, `v0.0.0-20190101000000-abcdef123456`). Requests
//! may also name a branch or the symbolic `latest`, which are resolved by the
//! archive source before anything else happens.

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

/// Requested version meaning "the newest available".
pub const LATEST: &str = "latest";
pub const MASTER: &str = "master";
pub const MAIN: &str = "main";

/// Classification of a resolved version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionType {
    Release,
    Prerelease,
    Pseudo,
}

impl fmt::Display for VersionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Release => write!(f, "release"),
            Self::Prerelease => write!(f, "prerelease"),
            Self::Pseudo => write!(f, "pseudo"),
        }
    }
}

fn pseudo_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^v[0-9]+\.(0\.0-|\d+\.\d+-([^+]*\.)?0\.)\d{14}-[A-Za-z0-9]+(\+[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?$",
        )
        .ok()
    })
    .as_ref()
}

/// Parse a `v`-prefixed canonical semantic version.
#[must_use]
pub fn parse(version: &str) -> Option<Version> {
    let rest = version.strip_prefix('v')?;
    Version::parse(rest).ok()
}

/// Whether `version` is a canonical module version.
#[must_use]
pub fn is_valid(version: &str) -> bool {
    parse(version).is_some()
}

/// Whether `version` is a pseudo-version generated from a commit.
#[must_use]
pub fn is_pseudo(version: &str) -> bool {
    pseudo_regex().is_some_and(|re| re.is_match(version))
}

/// Whether a requested version needs resolving before it can be fetched.
#[must_use]
pub fn is_symbolic(version: &str) -> bool {
    !is_valid(version)
}

/// Classify a canonical version. Returns `None` for non-semver input.
#[must_use]
pub fn version_type(version: &str) -> Option<VersionType> {
    let parsed = parse(version)?;
    Some(if is_pseudo(version) {
        VersionType::Pseudo
    } else if parsed.pre.is_empty() {
        VersionType::Release
    } else {
        VersionType::Prerelease
    })
}

/// Order two module versions; unparseable versions sort first.
#[must_use]
pub fn compare(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(a), Some(b)) => a.cmp_precedence(&b).then_with(|| a.cmp(&b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Split a module path into its series prefix and major-version suffix.
///
/// `github.com/a/b/v3` splits into (`github.com/a/b`, `/v3`) and
/// `gopkg.in/yaml.v2` into (`gopkg.in/yaml`, `.v2`). `v0` and `v1` are not
/// valid suffixes for non-gopkg.in paths.
#[must_use]
pub fn split_path_version(module_path: &str) -> (&str, &str) {
    if module_path.starts_with("gopkg.in/") {
        if let Some(idx) = module_path.rfind(".v") {
            let digits = &module_path[idx + 2..];
            let digits = digits.strip_suffix("-unstable").unwrap_or(digits);
            if is_major_digits(digits, true) {
                return (&module_path[..idx], &module_path[idx..]);
            }
        }
        return (module_path, "");
    }
    if let Some(idx) = module_path.rfind("/v") {
        if is_major_digits(&module_path[idx + 2..], false) {
            return (&module_path[..idx], &module_path[idx..]);
        }
    }
    (module_path, "")
}

fn is_major_digits(s: &str, allow_low: bool) -> bool {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if s.len() > 1 && s.starts_with('0') {
        return false;
    }
    allow_low || !(s == "0" || s == "1")
}

/// Module path with any major-version suffix removed.
#[must_use]
pub fn series_path(module_path: &str) -> &str {
    split_path_version(module_path).0
}

/// Path of a package as it would appear in major version 1 of its module.
#[must_use]
pub fn v1_path(package_path: &str, module_path: &str) -> String {
    if module_path == crate::STDLIB_MODULE_PATH {
        return package_path.to_string();
    }
    let suffix = package_path.strip_prefix(module_path).unwrap_or("");
    format!("{}{suffix}", series_path(module_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_versions() {
        assert_eq!(version_type("v1.2.3"), Some(VersionType::Release));
        assert_eq!(version_type("v1.2.3-rc.1"), Some(VersionType::Prerelease));
        assert_eq!(
            version_type("v0.0.0-20190101000000-abcdef123456"),
            Some(VersionType::Pseudo)
        );
        assert_eq!(
            version_type("v1.2.4-0.20190101000000-abcdef123456"),
            Some(VersionType::Pseudo)
        );
        assert_eq!(version_type("master"), None);
        assert_eq!(version_type("1.2.3"), None);
    }

    #[test]
    fn symbolic_versions() {
        assert!(is_symbolic(LATEST));
        assert!(is_symbolic(MASTER));
        assert!(!is_symbolic("v1.0.0"));
    }

    #[test]
    fn compares_by_precedence() {
        assert_eq!(compare("v1.10.0", "v1.9.0"), Ordering::Greater);
        assert_eq!(compare("v1.0.0-rc.1", "v1.0.0"), Ordering::Less);
        assert_eq!(compare("junk", "v0.0.1"), Ordering::Less);
    }

    #[test]
    fn series_and_v1_paths() {
        assert_eq!(series_path("github.com/a/b/v3"), "github.com/a/b");
        assert_eq!(series_path("github.com/a/b/v1"), "github.com/a/b/v1");
        assert_eq!(series_path("github.com/a/b/v01"), "github.com/a/b/v01");
        assert_eq!(series_path("gopkg.in/yaml.v2"), "gopkg.in/yaml");
        assert_eq!(series_path("gopkg.in/check.v1"), "gopkg.in/check");
        assert_eq!(
            v1_path("github.com/a/b/v3/pkg/x", "github.com/a/b/v3"),
            "github.com/a/b/pkg/x"
        );
        assert_eq!(v1_path("github.com/a/b", "github.com/a/b"), "github.com/a/b");
        assert_eq!(v1_path("net/http", "std"), "net/http");
    }

    proptest::proptest! {
        #[test]
        fn v1_path_never_longer(major in 2u32..50, tail in "[a-z]{1,8}(/[a-z]{1,8}){0,3}") {
            let module = format!("example.com/m/v{major}");
            let pkg = format!("{module}/{tail}");
            let v1 = v1_path(&pkg, &module);
            proptest::prop_assert!(v1.len() < pkg.len());
            let expected = format!("example.com/m/{tail}");
            proptest::prop_assert_eq!(v1, expected);
        }
    }
}
