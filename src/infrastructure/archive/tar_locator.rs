use std::io::{self, Read, Seek, SeekFrom};

use tar::Archive;

use super::{select_payload, PayloadLocator};
use crate::domain::error::{AppError, Result};

/// Sequential TAR scan.
///
/// A `data.csv` that appears after another `*.csv` still wins, so selection takes two
/// passes over the seekable source: the first reads headers only and seeks past entry
/// data, the second drains every entry up to the selected one and hands it over.
pub struct TarLocator;

impl PayloadLocator for TarLocator {
    fn locate<R, T, F>(&self, source: R, consume: F) -> Result<T>
    where
        R: Read + Seek,
        F: FnOnce(&str, &mut dyn Read) -> Result<T>,
    {
        let mut archive = Archive::new(source);
        let mut names = Vec::new();
        {
            let entries = archive.entries_with_seek().map_err(corrupt)?;
            for (position, entry) in entries.enumerate() {
                let entry = entry.map_err(corrupt)?;
                if !entry.header().entry_type().is_file() {
                    continue;
                }
                let path = entry.path().map_err(corrupt)?;
                names.push((position, path.to_string_lossy().into_owned()));
            }
        }

        let selected = select_payload(names.iter().map(|(i, name)| (*i, name.as_str())))
            .ok_or_else(|| {
                AppError::PayloadNotFound("no .csv entry in tar archive".to_string())
            })?;

        let mut source = archive.into_inner();
        source.seek(SeekFrom::Start(0))?;
        let mut archive = Archive::new(source);

        for (position, entry) in archive.entries().map_err(corrupt)?.enumerate() {
            let mut entry = entry.map_err(corrupt)?;
            if position == selected {
                let name = entry.path().map_err(corrupt)?.to_string_lossy().into_owned();
                tracing::debug!(entry = %name, size = entry.size(), "Located tar payload");
                return consume(&name, &mut entry);
            }
            io::copy(&mut entry, &mut io::sink()).map_err(corrupt)?;
        }

        Err(AppError::ArchiveCorrupt(
            "tar entry disappeared between scans".to_string(),
        ))
    }
}

fn corrupt(err: io::Error) -> AppError {
    AppError::ArchiveCorrupt(format!("tar: {}", err))
}
