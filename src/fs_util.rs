use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::trace;
use zip::ZipArchive;

use crate::error::KiraError;

/// Opens a source file for line-oriented reading. `.gz` files are decoded on
/// the fly; `.zip` archives yield their first regular file.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>, KiraError> {
    if !path.is_file() {
        return Err(KiraError::InputNotFound(path.to_path_buf()));
    }
    let file = File::open(path)
        .map_err(|err| KiraError::Filesystem(format!("open {}: {err}", path.display())))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => {
            trace!(path = %path.display(), "opening as gzip");
            Ok(Box::new(BufReader::new(MultiGzDecoder::new(BufReader::new(file)))))
        }
        Some("zip") => {
            trace!(path = %path.display(), "opening first zip entry");
            Ok(Box::new(Cursor::new(read_first_zip_entry(file, path)?)))
        }
        _ => Ok(Box::new(BufReader::new(file))),
    }
}

fn read_first_zip_entry(file: File, path: &Path) -> Result<Vec<u8>, KiraError> {
    let mut archive =
        ZipArchive::new(file).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        if entry.is_dir() || entry.enclosed_name().is_none() {
            continue;
        }
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        return Ok(content);
    }
    Err(KiraError::Filesystem(format!(
        "zip archive {} has no files",
        path.display()
    )))
}
