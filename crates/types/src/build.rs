//! Build contexts used to select conditionally compiled files

use serde::{Deserialize, Serialize};
use std::fmt;

/// A (GOOS, GOARCH) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildContext {
    pub goos: String,
    pub goarch: String,
}

impl BuildContext {
    pub fn new(goos: impl Into<String>, goarch: impl Into<String>) -> Self {
        Self {
            goos: goos.into(),
            goarch: goarch.into(),
        }
    }

    /// The contexts documentation is generated for, in preference order.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("linux", "amd64"),
            Self::new("windows", "amd64"),
            Self::new("darwin", "amd64"),
            Self::new("js", "wasm"),
        ]
    }

    /// Marker context for documentation that is identical in every context.
    #[must_use]
    pub fn all() -> Self {
        Self::new("all", "all")
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        self.goos == "all" && self.goarch == "all"
    }

    /// Parse `goos/goarch`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (goos, goarch) = s.split_once('/')?;
        if goos.is_empty() || goarch.is_empty() || goarch.contains('/') {
            return None;
        }
        Some(Self::new(goos, goarch))
    }
}

impl fmt::Display for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.goos, self.goarch)
    }
}
