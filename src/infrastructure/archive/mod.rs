// ============================================================
// ARCHIVE LOCATOR
// ============================================================
// Finds the CSV payload inside an uploaded ZIP or TAR container

mod tar_locator;
mod zip_locator;

use std::io::{Read, Seek};

use crate::domain::archive::{ArchiveFormat, PREFERRED_PAYLOAD_NAME};
use crate::domain::error::Result;

pub use tar_locator::TarLocator;
pub use zip_locator::ZipLocator;

/// One capability per container format: hand the located CSV entry to `consume`.
///
/// The consumer receives the entry name and a reader positioned at the start of the
/// entry data. Whatever it returns is passed through unchanged.
pub trait PayloadLocator {
    fn locate<R, T, F>(&self, source: R, consume: F) -> Result<T>
    where
        R: Read + Seek,
        F: FnOnce(&str, &mut dyn Read) -> Result<T>;
}

impl ArchiveFormat {
    /// Dispatch to the locator for this container format.
    pub fn locate_payload<R, T, F>(self, source: R, consume: F) -> Result<T>
    where
        R: Read + Seek,
        F: FnOnce(&str, &mut dyn Read) -> Result<T>,
    {
        match self {
            ArchiveFormat::Zip => ZipLocator.locate(source, consume),
            ArchiveFormat::Tar => TarLocator.locate(source, consume),
        }
    }
}

/// Entry names compare without a leading `./`.
pub(crate) fn normalize_entry_name(name: &str) -> &str {
    name.strip_prefix("./").unwrap_or(name)
}

/// Pick the payload among `(position, name)` pairs.
///
/// `data.csv` wins wherever it appears, otherwise the first `*.csv` entry.
pub(crate) fn select_payload<'a, I>(entries: I) -> Option<usize>
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    let mut first_csv = None;
    for (position, name) in entries {
        let name = normalize_entry_name(name);
        if name == PREFERRED_PAYLOAD_NAME {
            return Some(position);
        }
        if first_csv.is_none() && name.ends_with(".csv") {
            first_csv = Some(position);
        }
    }
    first_csv
}
