use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::archive::zip_file;
use crate::cleanup::{remove_redundant_empty, CleanupReport};
use crate::config::{PipelineConfig, Taxonomy, TransformOptions};
use crate::error::{Error, Result};
use crate::integrity::{check_dataset_file, IntegrityOptions, IntegrityReport};
use crate::io::{read_dataset, read_metadata, write_dataset};
use crate::merge::{merge_metadata, MergeReport};
use crate::preview::write_preview;
use crate::rewrite::rewrite_categories;
use crate::types::{Dataset, MetadataFile};
use crate::validate::validate;

/// Counts from the in-memory stages
#[derive(Debug, Clone, Default)]
pub struct TransformSummary {
    pub cleanup: CleanupReport,
    pub merge: MergeReport,
}

/// What a full run produced
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub transform: TransformSummary,
    pub output_path: PathBuf,
    pub integrity: Option<IntegrityReport>,
    pub preview_path: Option<PathBuf>,
    pub zip_path: Option<PathBuf>,
}

/// Validate, clean, merge and rewrite `dataset` in place
pub fn transform(
    dataset: &mut Dataset,
    metadata: &MetadataFile,
    taxonomy: &Taxonomy,
    options: &TransformOptions,
) -> Result<TransformSummary> {
    let mut index = validate(dataset, metadata, taxonomy, options.policy)?;
    let cleanup = remove_redundant_empty(
        dataset,
        &mut index,
        taxonomy,
        options.cleaner_mode,
        options.policy,
    )?;
    let merge = merge_metadata(dataset, &index, &metadata.images, taxonomy, options.policy)?;
    rewrite_categories(dataset, taxonomy, &options.dataset_version);
    Ok(TransformSummary { cleanup, merge })
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(Error::InputNotFound(path.to_path_buf()))
    }
}

/// Run every stage from reading the inputs to zipping the output
pub fn run(config: &PipelineConfig, taxonomy: &Taxonomy) -> Result<PipelineSummary> {
    ensure_exists(&config.input_dataset_path)?;
    ensure_exists(&config.new_metadata_path)?;
    ensure_exists(&config.image_folder)?;

    let mut dataset = read_dataset(&config.input_dataset_path)?;
    let metadata = read_metadata(&config.new_metadata_path)?;

    let transform_summary = transform(&mut dataset, &metadata, taxonomy, &config.transform)?;
    write_dataset(&dataset, &config.output_path)?;
    drop(dataset);

    let integrity = if config.integrity_check {
        info!("Checking integrity of {}...", config.output_path.display());
        let options = IntegrityOptions {
            base_dir: Some(config.image_folder.clone()),
            check_image_existence: true,
            find_unused_images: true,
        };
        let report = check_dataset_file(&config.output_path, &options)?;
        report.log_summary();
        if report.structural_problems() > 0 {
            return Err(Error::Integrity(report.structural_problems()));
        }
        Some(report)
    } else {
        None
    };

    let preview_path = match &config.preview_folder {
        Some(folder) => Some(write_preview(
            &config.output_path,
            &config.image_folder,
            folder,
            &config.preview,
        )?),
        None => {
            warn!("No preview folder given, skipping preview");
            None
        }
    };

    let zip_path = if config.zip_output {
        Some(zip_file(&config.output_path)?)
    } else {
        None
    };

    info!("Category update completed successfully.");
    Ok(PipelineSummary {
        transform: transform_summary,
        output_path: config.output_path.clone(),
        integrity,
        preview_path,
        zip_path,
    })
}
