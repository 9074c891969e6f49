use std::collections::{HashMap, HashSet};

use crate::types::{AnnotationRecord, RecordId};

/// Image id -> positions of that image's annotations in the dataset's list.
///
/// Images are kept in the order their first annotation appears.
#[derive(Debug, Clone, Default)]
pub struct AnnotationIndex {
    by_image: HashMap<RecordId, Vec<usize>>,
    order: Vec<RecordId>,
}

impl AnnotationIndex {
    pub fn build(annotations: &[AnnotationRecord]) -> Self {
        let mut index = Self::default();
        for (position, ann) in annotations.iter().enumerate() {
            match index.by_image.get_mut(&ann.image_id) {
                Some(positions) => positions.push(position),
                None => {
                    index.order.push(ann.image_id.clone());
                    index.by_image.insert(ann.image_id.clone(), vec![position]);
                }
            }
        }
        index
    }

    pub fn positions(&self, image_id: &RecordId) -> &[usize] {
        self.by_image
            .get(image_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, image_id: &RecordId) -> bool {
        self.by_image.contains_key(image_id)
    }

    /// Number of distinct annotated images
    pub fn image_count(&self) -> usize {
        self.order.len()
    }

    pub fn image_ids(&self) -> impl Iterator<Item = &RecordId> {
        self.order.iter()
    }

    /// Drop the annotations at `doomed` from `annotations` and shift the
    /// remaining positions so the index stays valid.
    pub fn remove_positions(
        &mut self,
        annotations: &mut Vec<AnnotationRecord>,
        doomed: &HashSet<usize>,
    ) {
        if doomed.is_empty() {
            return;
        }

        let mut remap = Vec::with_capacity(annotations.len());
        let mut next = 0;
        for position in 0..annotations.len() {
            if doomed.contains(&position) {
                remap.push(None);
            } else {
                remap.push(Some(next));
                next += 1;
            }
        }

        let mut position = 0;
        annotations.retain(|_| {
            let keep = remap[position].is_some();
            position += 1;
            keep
        });

        for positions in self.by_image.values_mut() {
            *positions = positions.iter().filter_map(|&p| remap[p]).collect();
        }
        self.by_image.retain(|_, positions| !positions.is_empty());
        let by_image = &self.by_image;
        self.order.retain(|id| by_image.contains_key(id));
    }
}
