//! License type definitions

use serde::{Deserialize, Serialize};

/// What is known about a license file without its contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseMetadata {
    /// SPDX identifiers detected in the file. Empty when nothing was recognized.
    pub types: Vec<String>,
    /// Path of the file relative to the module root.
    pub file_path: String,
    /// Share of the file's words accounted for by the detected licenses, 0-100.
    pub coverage: f64,
}

/// A license file found in a module zip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub metadata: LicenseMetadata,
    pub is_redistributable: bool,
    #[serde(with = "serde_bytes_as_string")]
    pub contents: Vec<u8>,
}

impl License {
    /// Directory governed by this license, relative to the module root.
    #[must_use]
    pub fn directory(&self) -> &str {
        match self.metadata.file_path.rfind('/') {
            Some(idx) => &self.metadata.file_path[..idx],
            None => "",
        }
    }
}

mod serde_bytes_as_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(d)?.into_bytes())
    }
}
