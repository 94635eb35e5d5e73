use std::io::{Read, Seek};

use zip::result::ZipError;
use zip::ZipArchive;

use super::{select_payload, PayloadLocator};
use crate::domain::error::{AppError, Result};

/// Reads the central directory, then opens only the selected entry.
pub struct ZipLocator;

impl PayloadLocator for ZipLocator {
    fn locate<R, T, F>(&self, source: R, consume: F) -> Result<T>
    where
        R: Read + Seek,
        F: FnOnce(&str, &mut dyn Read) -> Result<T>,
    {
        let mut archive = ZipArchive::new(source).map_err(corrupt)?;

        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index).map_err(corrupt)?;
            if !entry.is_dir() {
                names.push((index, entry.name().to_string()));
            }
        }

        let index = select_payload(names.iter().map(|(i, name)| (*i, name.as_str())))
            .ok_or_else(|| {
                AppError::PayloadNotFound("no .csv entry in zip archive".to_string())
            })?;

        let mut entry = archive.by_index(index).map_err(corrupt)?;
        let name = entry.name().to_string();
        tracing::debug!(entry = %name, size = entry.size(), "Located zip payload");
        consume(&name, &mut entry)
    }
}

fn corrupt(err: ZipError) -> AppError {
    AppError::ArchiveCorrupt(format!("zip: {}", err))
}
