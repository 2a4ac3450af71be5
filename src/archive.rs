//! ZIP archive extraction
//!
//! Some catalog endpoints respond with a ZIP archive bundling several XML
//! files. This module unpacks such a response, fully buffered, into named
//! entries; decoding and merging the entries is the normalization pipeline's
//! job.

use std::io::{Cursor, Read};
use thiserror::Error;
use zip::ZipArchive;

/// Errors that can occur while unpacking an archive response
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The response is not a readable ZIP archive
    #[error("Failed to read ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A single entry's content could not be read
    #[error("Failed to read archive entry {name}: {source}")]
    Entry {
        name: String,
        source: std::io::Error,
    },
}

/// Unpacks an archive response into `(entry name, raw bytes)` pairs.
///
/// Entries are returned in archive directory order; directory entries are
/// skipped. The function returns only once every entry has been read, so a
/// successful result always represents the fully-consumed archive.
pub(crate) fn read_entries(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut content)
            .map_err(|source| ArchiveError::Entry {
                name: name.clone(),
                source,
            })?;

        entries.push((name, content));
    }

    Ok(entries)
}
