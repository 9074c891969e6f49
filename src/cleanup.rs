use log::info;
use std::collections::HashSet;

use crate::config::{CleanerMode, Taxonomy};
use crate::error::{ErrorPolicy, Result, Violation, ViolationSink};
use crate::index::AnnotationIndex;
use crate::types::{Dataset, RecordId};

/// What the cleaner removed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    pub images_affected: usize,
    pub removed_annotation_ids: Vec<RecordId>,
    pub annotations_before: usize,
    pub annotations_kept: usize,
}

impl CleanupReport {
    pub fn annotations_removed(&self) -> usize {
        self.removed_annotation_ids.len()
    }
}

/// Remove redundant "empty" annotations, keeping the first one of each image.
///
/// `index` is updated in place to match the shortened annotation list.
pub fn remove_redundant_empty(
    dataset: &mut Dataset,
    index: &mut AnnotationIndex,
    taxonomy: &Taxonomy,
    mode: CleanerMode,
    policy: ErrorPolicy,
) -> Result<CleanupReport> {
    let mut sink = ViolationSink::new(policy);
    let mut report = CleanupReport {
        annotations_before: dataset.annotations.len(),
        ..CleanupReport::default()
    };
    let mut doomed = HashSet::new();

    for image_id in index.image_ids() {
        let positions = index.positions(image_id);
        let is_empty = positions
            .iter()
            .any(|&p| dataset.annotations[p].category_id == taxonomy.source_empty_id);
        if !is_empty || positions.len() < 2 {
            continue;
        }

        report.images_affected += 1;
        if mode == CleanerMode::StrictPairs && positions.len() != 2 {
            sink.report(Violation::RedundantGroupSize {
                image_id: image_id.clone(),
                count: positions.len(),
            })?;
            continue;
        }
        for &p in &positions[1..] {
            report
                .removed_annotation_ids
                .push(dataset.annotations[p].id.clone());
            doomed.insert(p);
        }
    }
    sink.finish()?;

    info!(
        "Removing {} redundant annotations from {} images",
        report.annotations_removed(),
        report.images_affected
    );
    index.remove_positions(&mut dataset.annotations, &doomed);
    report.annotations_kept = dataset.annotations.len();
    info!(
        "Keeping {} of {} annotations",
        report.annotations_kept, report.annotations_before
    );

    // Every image must still be annotated, if only as empty
    let mut sink = ViolationSink::new(policy);
    for im in &dataset.images {
        if !index.contains(&im.id) {
            sink.report(Violation::UnannotatedImage {
                image_id: im.id.clone(),
            })?;
        }
    }
    sink.finish()?;

    Ok(report)
}
