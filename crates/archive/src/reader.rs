use std::io::{Cursor, Read};

use bytes::Bytes;
use modsite_errors::ArchiveError;
use zip::ZipArchive;

/// One file or directory entry of a zip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub name: String,
    /// Uncompressed size as recorded in the central directory.
    pub size: u64,
    pub is_dir: bool,
    index: usize,
}

/// An in-memory zip that can be read from concurrently.
///
/// Reads clone the underlying archive handle, which shares the buffer and
/// the parsed central directory, so `&self` is enough to read any entry.
#[derive(Debug, Clone)]
pub struct ModuleZip {
    archive: ZipArchive<Cursor<Bytes>>,
    entries: Vec<ZipEntry>,
    size: u64,
}

impl ModuleZip {
    /// Parse the central directory of `data`.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Malformed` if `data` is not a readable zip.
    pub fn open(data: Bytes) -> Result<Self, ArchiveError> {
        let size = data.len() as u64;
        let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| ArchiveError::Malformed {
            message: e.to_string(),
        })?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index).map_err(|e| ArchiveError::Malformed {
                message: e.to_string(),
            })?;
            entries.push(ZipEntry {
                name: file.name().to_string(),
                size: file.size(),
                is_dir: file.is_dir(),
                index,
            });
        }
        Ok(Self {
            archive,
            entries,
            size,
        })
    }

    /// All entries in central-directory order.
    #[must_use]
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Compressed size of the whole archive in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Verify every entry lives under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::BadPrefix` naming the first offending entry.
    pub fn check_prefix(&self, prefix: &str) -> Result<(), ArchiveError> {
        match self.entries.iter().find(|e| !e.name.starts_with(prefix)) {
            Some(entry) => Err(ArchiveError::BadPrefix {
                name: entry.name.clone(),
                prefix: prefix.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Read an entry by name, refusing anything larger than `limit` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry does not exist, exceeds `limit`, or
    /// cannot be decompressed.
    pub fn read(&self, name: &str, limit: u64) -> Result<Vec<u8>, ArchiveError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| ArchiveError::EntryNotFound {
                name: name.to_string(),
            })?;
        self.read_entry(entry, limit)
    }

    /// Read an entry, refusing anything larger than `limit` bytes.
    ///
    /// The recorded size is checked first, and the decompressed stream is
    /// capped as well in case the central directory lies.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry exceeds `limit` or cannot be decompressed.
    pub fn read_entry(&self, entry: &ZipEntry, limit: u64) -> Result<Vec<u8>, ArchiveError> {
        if entry.size > limit {
            return Err(ArchiveError::EntryTooLarge {
                name: entry.name.clone(),
                limit,
            });
        }
        let mut archive = self.archive.clone();
        let file = archive
            .by_index(entry.index)
            .map_err(|e| ArchiveError::Malformed {
                message: format!("{}: {e}", entry.name),
            })?;
        let capacity = usize::try_from(entry.size).unwrap_or(0);
        let mut buf = Vec::with_capacity(capacity);
        file.take(limit.saturating_add(1))
            .read_to_end(&mut buf)
            .map_err(|e| ArchiveError::Malformed {
                message: format!("{}: {e}", entry.name),
            })?;
        if buf.len() as u64 > limit {
            return Err(ArchiveError::EntryTooLarge {
                name: entry.name.clone(),
                limit,
            });
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_module_zip;

    #[test]
    fn garbage_is_malformed() {
        let err = ModuleZip::open(Bytes::from_static(b"not a zip")).unwrap_err();
        assert!(matches!(err, ArchiveError::Malformed { .. }));
    }

    #[test]
    fn bounded_reads() {
        let data = build_module_zip(
            "example.com/m",
            "v1.0.0",
            &[("go.mod", "module example.com/m\n"), ("a/a.go", "package a\n")],
        )
        .unwrap();
        let zip = ModuleZip::open(data).unwrap();
        assert!(zip.contains("example.com/m@v1.0.0/go.mod"));
        assert_eq!(
            zip.read("example.com/m@v1.0.0/a/a.go", 100).unwrap(),
            b"package a\n"
        );
        let err = zip.read("example.com/m@v1.0.0/a/a.go", 3).unwrap_err();
        assert!(matches!(err, ArchiveError::EntryTooLarge { limit: 3, .. }));
        assert!(matches!(
            zip.read("example.com/m@v1.0.0/nope.go", 100),
            Err(ArchiveError::EntryNotFound { .. })
        ));
        zip.check_prefix("example.com/m@v1.0.0/").unwrap();
        assert!(zip.check_prefix("example.com/other@v1.0.0/").is_err());
    }
}
