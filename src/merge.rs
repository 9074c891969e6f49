//! Copies the new per-image attributes onto the original image records and
//! remaps each image's annotations from the generic animal category to the
//! refined one.

use log::info;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::config::Taxonomy;
use crate::error::{ErrorPolicy, Result, Violation, ViolationSink};
use crate::index::AnnotationIndex;
use crate::types::{Dataset, MetadataImage, RecordId, METADATA_KEYS_ANIMAL, METADATA_KEYS_EMPTY};
use crate::utils::create_progress_bar;

/// Counts from a merge pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub images_merged: usize,
    pub empty_images: usize,
    pub remapped_annotations: usize,
    /// Images per refined category name
    pub images_per_category: BTreeMap<String, usize>,
}

pub fn merge_metadata(
    dataset: &mut Dataset,
    index: &AnnotationIndex,
    metadata: &[MetadataImage],
    taxonomy: &Taxonomy,
    policy: ErrorPolicy,
) -> Result<MergeReport> {
    let mut sink = ViolationSink::new(policy);
    let mut report = MergeReport::default();

    let position_of: HashMap<RecordId, usize> = dataset
        .images
        .iter()
        .enumerate()
        .map(|(position, im)| (im.id.clone(), position))
        .collect();

    let pb = create_progress_bar(metadata.len() as u64, "Merge");
    for new_im in metadata {
        pb.inc(1);
        let Some(&position) = position_of.get(&new_im.id) else {
            sink.report(Violation::UnknownImageId {
                image_id: new_im.id.clone(),
            })?;
            continue;
        };
        merge_image(dataset, position, index, new_im, taxonomy, &mut sink, &mut report)?;
    }
    pb.finish_with_message("Merge complete");

    sink.finish()?;
    info!(
        "Merged metadata into {} images ({} empty, {} annotations remapped)",
        report.images_merged, report.empty_images, report.remapped_annotations
    );
    Ok(report)
}

fn merge_image(
    dataset: &mut Dataset,
    position: usize,
    index: &AnnotationIndex,
    new_im: &MetadataImage,
    taxonomy: &Taxonomy,
    sink: &mut ViolationSink,
    report: &mut MergeReport,
) -> Result<()> {
    let image_id = &new_im.id;
    let original_im = &mut dataset.images[position];
    if new_im.file_name != original_im.file_name {
        return sink.report(Violation::FileNameMismatch {
            image_id: image_id.clone(),
            original: original_im.file_name.clone(),
            metadata: new_im.file_name.clone(),
        });
    }

    match new_im.filter {
        Value::Bool(filter) => original_im.filter = Some(filter),
        _ => sink.report(invalid_type(image_id, "filter", "boolean"))?,
    }

    match &new_im.standardized_habitat_type {
        Value::String(raw) => {
            let habitat = Taxonomy::normalize_habitat(raw);
            if !taxonomy.habitats.contains(&habitat) {
                sink.report(Violation::UnknownHabitat {
                    image_id: image_id.clone(),
                    value: habitat.clone(),
                })?;
            }
            original_im.habitat_type = Some(habitat);
        }
        _ => sink.report(invalid_type(image_id, "standardized_habitat_type", "string"))?,
    }

    match &new_im.visibility {
        Value::String(raw) => {
            let visibility = Taxonomy::normalize_visibility(raw);
            if !taxonomy.visibility_levels.contains(&visibility) {
                sink.report(Violation::UnknownVisibility {
                    image_id: image_id.clone(),
                    value: visibility.clone(),
                })?;
            }
            original_im.visibility = Some(visibility);
        }
        _ => sink.report(invalid_type(image_id, "visibility", "string"))?,
    }

    let positions = index.positions(image_id);
    let annotations = &mut dataset.annotations;

    let Some(animal_type) = &new_im.animal_type else {
        // No animal type: the image must already be a single empty annotation
        check_key_count(new_im, METADATA_KEYS_EMPTY, sink)?;
        let single_empty = positions.len() == 1
            && annotations[positions[0]].category_id == taxonomy.source_empty_id;
        if !single_empty {
            return sink.report(Violation::ExpectedEmpty {
                image_id: image_id.clone(),
            });
        }
        report.images_merged += 1;
        report.empty_images += 1;
        return Ok(());
    };

    let Some(raw) = animal_type.as_str() else {
        return sink.report(Violation::UnknownAnimalType {
            image_id: image_id.clone(),
            value: animal_type.to_string(),
        });
    };
    let name = taxonomy.resolve_animal_type(raw);
    let Some(category_id) = taxonomy.category_id(name) else {
        return sink.report(Violation::UnknownAnimalType {
            image_id: image_id.clone(),
            value: name.to_string(),
        });
    };
    check_key_count(new_im, METADATA_KEYS_ANIMAL, sink)?;

    let not_animals: Vec<RecordId> = positions
        .iter()
        .map(|&p| &annotations[p])
        .filter(|ann| ann.category_id != taxonomy.source_animal_id)
        .map(|ann| ann.id.clone())
        .collect();
    if !not_animals.is_empty() {
        return sink.report(Violation::ExpectedAnimal {
            image_id: image_id.clone(),
            annotation_ids: not_animals,
        });
    }

    for &p in positions {
        annotations[p].category_id = category_id;
    }
    report.images_merged += 1;
    report.remapped_annotations += positions.len();
    *report
        .images_per_category
        .entry(name.to_string())
        .or_insert(0) += 1;
    Ok(())
}

fn check_key_count(new_im: &MetadataImage, expected: usize, sink: &mut ViolationSink) -> Result<()> {
    let count = new_im.key_count();
    if count != expected {
        sink.report(Violation::MetadataKeyCount {
            image_id: new_im.id.clone(),
            count,
            expected,
        })?;
    }
    Ok(())
}

fn invalid_type(image_id: &RecordId, field: &'static str, expected: &'static str) -> Violation {
    Violation::InvalidFieldType {
        image_id: image_id.clone(),
        field,
        expected,
    }
}
