//! Packaging of set outputs into a single downloadable archive

use std::io::{Cursor, Write};
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use crate::storage::ObjectStorage;

/// One file to place in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Name inside the archive
    pub filename: String,
    /// Where the bytes live in storage
    pub storage_path: String,
}

/// Download every entry, zip them (stored, images are already compressed)
/// and upload the archive to `output_path`.
///
/// Entries that cannot be downloaded are left out with a warning. Returns
/// the storage path of the archive.
pub async fn package_archive(
    storage: &dyn ObjectStorage,
    entries: &[ArchiveEntry],
    output_path: &str,
) -> Result<String> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let mut packed = 0usize;
    for entry in entries {
        let data = match storage.download(&entry.storage_path).await {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %entry.storage_path, error = %e, "Skipping archive entry");
                continue;
            }
        };

        writer.start_file(entry.filename.as_str(), options)?;
        writer.write_all(&data)?;
        packed += 1;
    }

    let archive = writer.finish()?.into_inner();
    storage.upload(output_path, &archive, "application/zip").await?;

    info!(path = %output_path, entries = packed, size = archive.len(), "Uploaded set archive");

    Ok(output_path.to_string())
}
