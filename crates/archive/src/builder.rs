use std::io::{Cursor, Write};

use bytes::Bytes;
use modsite_errors::ArchiveError;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::module_prefix;

/// Writes a module zip with every entry under `module@version/`.
pub struct ZipBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    prefix: String,
}

impl ZipBuilder {
    #[must_use]
    pub fn new(module_path: &str, version: &str) -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            prefix: module_prefix(module_path, version),
        }
    }

    /// Add a file at `path` relative to the module root.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::WriteFailed` if the entry cannot be written.
    pub fn add_file(&mut self, path: &str, contents: &[u8]) -> Result<(), ArchiveError> {
        let name = format!("{}{path}", self.prefix);
        self.writer
            .start_file(
                name,
                SimpleFileOptions::default().last_modified_time(zip::DateTime::default()),
            )
            .map_err(|e| ArchiveError::WriteFailed {
                message: e.to_string(),
            })?;
        self.writer
            .write_all(contents)
            .map_err(|e| ArchiveError::WriteFailed {
                message: e.to_string(),
            })
    }

    /// Finish the archive and return its bytes.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::WriteFailed` if the central directory cannot be written.
    pub fn finish(self) -> Result<Bytes, ArchiveError> {
        let cursor = self.writer.finish().map_err(|e| ArchiveError::WriteFailed {
            message: e.to_string(),
        })?;
        Ok(Bytes::from(cursor.into_inner()))
    }
}

/// Build a module zip from `(path, contents)` pairs.
///
/// # Errors
///
/// Returns `ArchiveError::WriteFailed` if any entry cannot be written.
pub fn build_module_zip<C: AsRef<[u8]>>(
    module_path: &str,
    version: &str,
    files: &[(&str, C)],
) -> Result<Bytes, ArchiveError> {
    let mut builder = ZipBuilder::new(module_path, version);
    for (path, contents) in files {
        builder.add_file(path, contents.as_ref())?;
    }
    builder.finish()
}
