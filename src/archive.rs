use log::info;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, Violation};

/// Path of the archive `zip_file` writes for `path`
pub fn zip_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".zip");
    PathBuf::from(name)
}

/// Compress `path` into a `<path>.zip` sibling holding the file under its base name
pub fn zip_file(path: &Path) -> Result<PathBuf> {
    let entry_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InputNotFound(path.to_path_buf()))?;
    let mut input = BufReader::new(File::open(path)?);
    let zip_path = zip_path_for(path);

    let mut zip = zip::ZipWriter::new(BufWriter::new(File::create(&zip_path)?));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    zip.start_file(entry_name, options)?;
    io::copy(&mut input, &mut zip)?;
    zip.finish()?.flush()?;

    if !zip_path.is_file() {
        return Err(Error::Violations(vec![Violation::MissingArtifact {
            path: zip_path,
        }]));
    }
    info!("Zipped {} to {}", path.display(), zip_path.display());
    Ok(zip_path)
}
