//! Cross-document and annotation-shape checks run before anything is modified.

use log::info;
use std::collections::{BTreeSet, HashSet};

use crate::config::Taxonomy;
use crate::error::{ErrorPolicy, Result, Violation, ViolationSink};
use crate::index::AnnotationIndex;
use crate::types::{
    Dataset, MetadataFile, ANNOTATION_KEYS_WITHOUT_BBOX, ANNOTATION_KEYS_WITH_BBOX,
};

/// Check that both documents describe the same images and that the original
/// annotations are well formed. Returns the image -> annotations index.
pub fn validate(
    dataset: &Dataset,
    metadata: &MetadataFile,
    taxonomy: &Taxonomy,
    policy: ErrorPolicy,
) -> Result<AnnotationIndex> {
    let mut sink = ViolationSink::new(policy);

    check_same_images(dataset, metadata, &mut sink)?;
    check_annotation_shapes(dataset, taxonomy, &mut sink)?;

    let index = AnnotationIndex::build(&dataset.annotations);
    check_every_image_annotated(dataset, &index, &mut sink)?;
    check_single_category(dataset, &index, &mut sink)?;

    sink.finish()?;
    info!(
        "Validated {} images with {} annotations",
        dataset.images.len(),
        dataset.annotations.len()
    );
    Ok(index)
}

fn check_same_images(
    dataset: &Dataset,
    metadata: &MetadataFile,
    sink: &mut ViolationSink,
) -> Result<()> {
    if dataset.images.len() != metadata.images.len() {
        sink.report(Violation::ImageCountMismatch {
            original: dataset.images.len(),
            metadata: metadata.images.len(),
        })?;
    }

    let original_file_names: HashSet<&str> = dataset
        .images
        .iter()
        .map(|im| im.file_name.as_str())
        .collect();
    for im in &metadata.images {
        if !original_file_names.contains(im.file_name.as_str()) {
            sink.report(Violation::UnknownFileName {
                file_name: im.file_name.clone(),
            })?;
        }
    }

    let mut seen = HashSet::with_capacity(dataset.images.len());
    for im in &dataset.images {
        if !seen.insert(&im.id) {
            sink.report(Violation::DuplicateImageId {
                image_id: im.id.clone(),
            })?;
        }
    }
    Ok(())
}

fn check_annotation_shapes(
    dataset: &Dataset,
    taxonomy: &Taxonomy,
    sink: &mut ViolationSink,
) -> Result<()> {
    let mut seen = HashSet::with_capacity(dataset.annotations.len());
    for ann in &dataset.annotations {
        // The cleaner drops annotations by id, so ids must be unique
        if !seen.insert(&ann.id) {
            sink.report(Violation::DuplicateAnnotationId {
                annotation_id: ann.id.clone(),
            })?;
        }
        let count = ann.key_count();
        if count != ANNOTATION_KEYS_WITHOUT_BBOX && count != ANNOTATION_KEYS_WITH_BBOX {
            sink.report(Violation::AnnotationKeyCount {
                annotation_id: ann.id.clone(),
                count,
            })?;
        }
        // Only the generic animal category may carry a box
        if ann.bbox.is_some() && ann.category_id != taxonomy.source_animal_id {
            sink.report(Violation::BboxOnNonAnimal {
                annotation_id: ann.id.clone(),
                category_id: ann.category_id,
            })?;
        }
    }
    Ok(())
}

fn check_every_image_annotated(
    dataset: &Dataset,
    index: &AnnotationIndex,
    sink: &mut ViolationSink,
) -> Result<()> {
    let image_ids: HashSet<_> = dataset.images.iter().map(|im| &im.id).collect();
    if image_ids.len() == index.image_count() {
        return Ok(());
    }

    for im in &dataset.images {
        if !index.contains(&im.id) {
            sink.report(Violation::UnannotatedImage {
                image_id: im.id.clone(),
            })?;
        }
    }
    for ann in &dataset.annotations {
        if !image_ids.contains(&ann.image_id) {
            sink.report(Violation::OrphanAnnotation {
                annotation_id: ann.id.clone(),
                image_id: ann.image_id.clone(),
            })?;
        }
    }
    Ok(())
}

fn check_single_category(
    dataset: &Dataset,
    index: &AnnotationIndex,
    sink: &mut ViolationSink,
) -> Result<()> {
    for image_id in index.image_ids() {
        let category_ids: BTreeSet<u32> = index
            .positions(image_id)
            .iter()
            .map(|&p| dataset.annotations[p].category_id)
            .collect();
        if category_ids.len() != 1 {
            sink.report(Violation::MixedCategories {
                image_id: image_id.clone(),
                category_ids: category_ids.into_iter().collect(),
            })?;
        }
    }
    Ok(())
}
