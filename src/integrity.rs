//! Post-write integrity check of a COCO-style dataset file.
//!
//! Structural problems (duplicate ids, dangling references) fail the check;
//! missing or unused image files are reported as warnings.

use glob::glob;
use log::{info, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::io::read_dataset;
use crate::types::{Category, Dataset, RecordId, IMG_FORMATS};
use crate::utils::{create_progress_bar, to_file_name};

#[derive(Debug, Clone, Default)]
pub struct IntegrityOptions {
    /// Folder the image file names are relative to
    pub base_dir: Option<PathBuf>,
    pub check_image_existence: bool,
    pub find_unused_images: bool,
}

#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub sorted_categories: Vec<Category>,
    pub image_count: usize,
    pub annotation_count: usize,
    pub duplicate_image_ids: Vec<RecordId>,
    pub duplicate_annotation_ids: Vec<RecordId>,
    pub duplicate_category_ids: Vec<u32>,
    /// Annotation ids whose image id matches no image
    pub unknown_image_refs: Vec<RecordId>,
    /// Annotation ids whose category id matches no category
    pub unknown_category_refs: Vec<RecordId>,
    pub missing_images: Vec<String>,
    pub unused_images: Vec<PathBuf>,
}

impl IntegrityReport {
    pub fn structural_problems(&self) -> usize {
        self.duplicate_image_ids.len()
            + self.duplicate_annotation_ids.len()
            + self.duplicate_category_ids.len()
            + self.unknown_image_refs.len()
            + self.unknown_category_refs.len()
    }

    pub fn is_clean(&self) -> bool {
        self.structural_problems() == 0
            && self.missing_images.is_empty()
            && self.unused_images.is_empty()
    }

    pub fn log_summary(&self) {
        info!("=== Integrity Check ===");
        info!(
            "{} images, {} annotations, {} categories",
            self.image_count,
            self.annotation_count,
            self.sorted_categories.len()
        );
        for category in &self.sorted_categories {
            info!("  {}: {}", category.id, category.name);
        }
        if self.structural_problems() > 0 {
            warn!(
                "Structural problems: {} duplicate image ids, {} duplicate annotation ids, \
                 {} duplicate category ids, {} unknown image refs, {} unknown category refs",
                self.duplicate_image_ids.len(),
                self.duplicate_annotation_ids.len(),
                self.duplicate_category_ids.len(),
                self.unknown_image_refs.len(),
                self.unknown_category_refs.len()
            );
        }
        if !self.missing_images.is_empty() {
            warn!("{} images not found on disk", self.missing_images.len());
        }
        if !self.unused_images.is_empty() {
            warn!(
                "{} image files not referenced by the dataset",
                self.unused_images.len()
            );
        }
    }
}

/// Read the dataset at `path` and check it
pub fn check_dataset_file(path: &Path, options: &IntegrityOptions) -> Result<IntegrityReport> {
    let dataset = read_dataset(path)?;
    check_dataset(&dataset, options)
}

pub fn check_dataset(dataset: &Dataset, options: &IntegrityOptions) -> Result<IntegrityReport> {
    let mut report = IntegrityReport {
        image_count: dataset.images.len(),
        annotation_count: dataset.annotations.len(),
        ..IntegrityReport::default()
    };

    let mut sorted_categories = dataset.categories.clone();
    sorted_categories.sort_by_key(|c| c.id);
    report.duplicate_category_ids = duplicates(sorted_categories.iter().map(|c| c.id));
    report.sorted_categories = sorted_categories;

    report.duplicate_image_ids = duplicates(dataset.images.iter().map(|im| im.id.clone()));
    report.duplicate_annotation_ids =
        duplicates(dataset.annotations.iter().map(|ann| ann.id.clone()));

    let image_ids: HashSet<&RecordId> = dataset.images.iter().map(|im| &im.id).collect();
    let category_ids: HashSet<u32> = dataset.categories.iter().map(|c| c.id).collect();
    for ann in &dataset.annotations {
        if !image_ids.contains(&ann.image_id) {
            report.unknown_image_refs.push(ann.id.clone());
        }
        if !category_ids.contains(&ann.category_id) {
            report.unknown_category_refs.push(ann.id.clone());
        }
    }

    if let Some(base_dir) = &options.base_dir {
        if options.check_image_existence {
            report.missing_images = find_missing_images(dataset, base_dir);
        }
        if options.find_unused_images {
            report.unused_images = find_unused_images(dataset, base_dir)?;
        }
    }

    Ok(report)
}

fn duplicates<T, I>(values: I) -> Vec<T>
where
    T: Eq + std::hash::Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    let mut repeated = Vec::new();
    for value in values {
        if !seen.insert(value.clone()) && !repeated.contains(&value) {
            repeated.push(value);
        }
    }
    repeated
}

fn find_missing_images(dataset: &Dataset, base_dir: &Path) -> Vec<String> {
    let pb = create_progress_bar(dataset.images.len() as u64, "Images");
    let missing = dataset
        .images
        .par_iter()
        .filter_map(|im| {
            pb.inc(1);
            if base_dir.join(&im.file_name).is_file() {
                None
            } else {
                Some(im.file_name.clone())
            }
        })
        .collect();
    pb.finish_with_message("Image check complete");
    missing
}

fn find_unused_images(dataset: &Dataset, base_dir: &Path) -> Result<Vec<PathBuf>> {
    let referenced: HashSet<&str> = dataset
        .images
        .iter()
        .map(|im| im.file_name.as_str())
        .collect();
    let escaped_base = glob::Pattern::escape(&base_dir.to_string_lossy());

    let per_format: Vec<Vec<PathBuf>> = IMG_FORMATS
        .par_iter()
        .map(|ext| -> Result<Vec<PathBuf>> {
            let pattern = format!("{}/**/*.{}", escaped_base, ext);
            Ok(glob(&pattern)?.filter_map(|entry| entry.ok()).collect())
        })
        .collect::<Result<_>>()?;

    let mut unused: Vec<PathBuf> = per_format
        .into_iter()
        .flatten()
        .filter(|path| {
            path.strip_prefix(base_dir)
                .map(|relative| !referenced.contains(to_file_name(relative).as_str()))
                .unwrap_or(true)
        })
        .collect();
    unused.sort();
    unused.dedup();
    Ok(unused)
}
