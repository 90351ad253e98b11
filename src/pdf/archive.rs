//! Zip bundling for multi-file outputs

use crate::error::Result;
use std::io::{Cursor, Write};
use zip::write::FileOptions;

/// Builds a zip archive in memory
pub struct ArchiveBuilder {
    zip: zip::ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
    entries: usize,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            zip: zip::ZipWriter::new(Cursor::new(Vec::new())),
            options: FileOptions::default().compression_method(zip::CompressionMethod::Deflated),
            entries: 0,
        }
    }

    /// Append one file under `name` (a `/`-separated path inside the archive)
    pub fn add(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.zip.start_file(name, self.options)?;
        self.zip.write_all(data)?;
        self.entries += 1;
        Ok(())
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn finish(mut self) -> Result<Vec<u8>> {
        Ok(self.zip.finish()?.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}
