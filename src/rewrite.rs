use log::info;
use serde_json::Value;

use crate::config::Taxonomy;
use crate::types::Dataset;

/// Replace the category list with the taxonomy's and stamp the version
pub fn rewrite_categories(dataset: &mut Dataset, taxonomy: &Taxonomy, version: &str) {
    dataset.categories = taxonomy.categories.clone();
    dataset.info.version = Some(Value::String(version.to_string()));
    info!(
        "Wrote {} categories, dataset version {}",
        dataset.categories.len(),
        version
    );
}
