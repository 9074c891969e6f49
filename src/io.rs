use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Dataset, MetadataFile};

/// Parse a JSON document straight from the file stream
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the original COCO-style dataset
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let dataset: Dataset = read_json(path)?;
    info!(
        "Read {} images and {} annotations from {}",
        dataset.images.len(),
        dataset.annotations.len(),
        path.display()
    );
    Ok(dataset)
}

/// Read the new per-image metadata
pub fn read_metadata(path: &Path) -> Result<MetadataFile> {
    let metadata: MetadataFile = read_json(path)?;
    info!(
        "Read new metadata for {} images from {}",
        metadata.images.len(),
        path.display()
    );
    Ok(metadata)
}

/// Serialize `value` with a one-space indent
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush()?;
    Ok(())
}

pub fn write_dataset(dataset: &Dataset, path: &Path) -> Result<()> {
    write_json(dataset, path)?;
    info!(
        "Wrote {} images and {} annotations to {}",
        dataset.images.len(),
        dataset.annotations.len(),
        path.display()
    );
    Ok(())
}
