//! Package Archiver
//!
//! Packs a finished staging tree into the ZIP based EPUB container. Entries are
//! added in sorted path order so identical trees produce identical archives, with
//! the `mimetype` entry first and stored uncompressed as OCF readers expect.

use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use log::debug;
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

use crate::{error::EpubError, utils::remove_leading_slash, workspace::MIMETYPE};

/// Packs every regular file below `root` into a new archive at `output_path`
///
/// An existing file at `output_path` is overwritten and missing parent directories
/// are created. Entry names are the root-relative paths with `/` separators.
///
/// # Return
/// - `Ok(usize)`: Number of entries written
/// - `Err(EpubError)`: `PackagingError` naming the output path
pub fn pack<P: AsRef<Path>, Q: AsRef<Path>>(root: P, output_path: Q) -> Result<usize, EpubError> {
    let root = root.as_ref();
    let output_path = output_path.as_ref();

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|err| EpubError::packaging(output_path, err))?;
        }
    }

    let file = File::create(output_path).map_err(|err| EpubError::packaging(output_path, err))?;
    let mut zip = ZipWriter::new(file);
    let stored = FileOptions::<()>::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    let mut entries = 0;

    let mimetype = root.join(MIMETYPE);
    if mimetype.is_file() {
        let data = fs::read(&mimetype).map_err(|err| EpubError::packaging(output_path, err))?;
        zip.start_file(MIMETYPE, stored)
            .map_err(|err| EpubError::packaging(output_path, err))?;
        zip.write_all(&data)
            .map_err(|err| EpubError::packaging(output_path, err))?;
        entries += 1;
    }

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| EpubError::packaging(output_path, err))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative_path = entry
            .path()
            .strip_prefix(root)
            .map_err(|err| EpubError::packaging(output_path, err))?;
        let target_path = remove_leading_slash(relative_path)
            .to_string_lossy()
            .replace('\\', "/");
        if target_path == MIMETYPE {
            continue;
        }

        let data = fs::read(entry.path()).map_err(|err| EpubError::packaging(output_path, err))?;
        zip.start_file(target_path.as_str(), deflated)
            .map_err(|err| EpubError::packaging(output_path, err))?;
        zip.write_all(&data)
            .map_err(|err| EpubError::packaging(output_path, err))?;

        debug!("archived {}", target_path);
        entries += 1;
    }

    zip.finish()
        .map_err(|err| EpubError::packaging(output_path, err))?;

    Ok(entries)
}
