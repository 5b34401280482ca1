//! Stage D: wrap the finished PDF in a single-entry ZIP archive.

use crate::error::InvertError;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate `document` into a ZIP archive holding exactly one entry named
/// `entry_name`.
pub fn bundle(document: &[u8], entry_name: &str) -> Result<Vec<u8>, InvertError> {
    let archive_err = |detail: String| InvertError::ArchiveFailed {
        entry: entry_name.to_string(),
        detail,
    };

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(document.len() as u64 >= u32::MAX as u64);

    zip.start_file(entry_name, options)
        .map_err(|e| archive_err(e.to_string()))?;
    zip.write_all(document)
        .map_err(|e| archive_err(e.to_string()))?;
    let archive = zip
        .finish()
        .map_err(|e| archive_err(e.to_string()))?
        .into_inner();

    debug!(
        entry = entry_name,
        input = document.len(),
        output = archive.len(),
        "Built archive"
    );
    Ok(archive)
}
