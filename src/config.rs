use clap::Parser;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::error::ErrorPolicy;
use crate::preview::PreviewOptions;
use crate::types::Category;

pub const DEFAULT_DATASET_VERSION: &str = "2023.08.19.00";

/// Refine the single "animal" category of a COCO-style dataset using a per-image metadata file
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// The original COCO-style dataset
    #[arg(long = "input_dataset")]
    pub input_dataset: PathBuf,

    /// The new per-image metadata file
    #[arg(long = "new_metadata")]
    pub new_metadata: PathBuf,

    /// Where to write the updated dataset
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Folder the dataset's file names are relative to
    #[arg(long = "image_folder")]
    pub image_folder: PathBuf,

    /// Folder for the HTML preview; no preview is written when omitted
    #[arg(long = "preview_folder")]
    pub preview_folder: Option<PathBuf>,

    /// Version string written to the dataset's info block
    #[arg(long = "dataset_version", default_value = DEFAULT_DATASET_VERSION)]
    pub dataset_version: String,

    /// Report every violation of a stage instead of stopping at the first
    #[arg(long = "fail_slow")]
    pub fail_slow: bool,

    /// Collapse redundant empty annotations of any group size, not only pairs
    #[arg(long = "collapse_empty_groups")]
    pub collapse_empty_groups: bool,

    /// Skip re-reading and checking the written dataset
    #[arg(long = "skip_integrity_check")]
    pub skip_integrity_check: bool,

    /// Skip writing <output>.zip
    #[arg(long = "skip_zip")]
    pub skip_zip: bool,

    /// Maximum number of images listed in the preview
    #[arg(long = "num_to_visualize", default_value_t = 2000)]
    pub num_to_visualize: usize,

    /// Sort the preview by file name instead of dataset order
    #[arg(long = "sort_by_filename")]
    pub sort_by_filename: bool,
}

/// How the cleaner treats a group of redundant empty annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanerMode {
    /// Groups must be exactly two annotations
    #[default]
    StrictPairs,
    /// Keep the first annotation of a group of any size
    KeepFirst,
}

/// Options for the in-memory transformation stages
#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub policy: ErrorPolicy,
    pub cleaner_mode: CleanerMode,
    pub dataset_version: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            policy: ErrorPolicy::FailFast,
            cleaner_mode: CleanerMode::StrictPairs,
            dataset_version: DEFAULT_DATASET_VERSION.to_string(),
        }
    }
}

/// Everything a full run needs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dataset_path: PathBuf,
    pub new_metadata_path: PathBuf,
    pub output_path: PathBuf,
    pub image_folder: PathBuf,
    pub preview_folder: Option<PathBuf>,
    pub transform: TransformOptions,
    pub integrity_check: bool,
    pub zip_output: bool,
    pub preview: PreviewOptions,
}

impl Args {
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            input_dataset_path: self.input_dataset.clone(),
            new_metadata_path: self.new_metadata.clone(),
            output_path: self.output.clone(),
            image_folder: self.image_folder.clone(),
            preview_folder: self.preview_folder.clone(),
            transform: TransformOptions {
                policy: if self.fail_slow {
                    ErrorPolicy::FailSlow
                } else {
                    ErrorPolicy::FailFast
                },
                cleaner_mode: if self.collapse_empty_groups {
                    CleanerMode::KeepFirst
                } else {
                    CleanerMode::StrictPairs
                },
                dataset_version: self.dataset_version.clone(),
            },
            integrity_check: !self.skip_integrity_check,
            zip_output: !self.skip_zip,
            preview: PreviewOptions {
                num_to_visualize: Some(self.num_to_visualize),
                sort_by_filename: self.sort_by_filename,
                include_image_links: true,
            },
        }
    }
}

/// The closed vocabularies the merge checks against.
///
/// `Taxonomy::default()` is the fish/crab scheme; tests build their own.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    /// Target categories in output order
    pub categories: Vec<Category>,
    /// Metadata spellings that map onto a category name
    pub aliases: HashMap<String, String>,
    pub habitats: HashSet<String>,
    pub visibility_levels: HashSet<String>,
    /// Category id of "empty" in the source scheme
    pub source_empty_id: u32,
    /// Category id of the generic "animal" in the source scheme
    pub source_animal_id: u32,
}

impl Taxonomy {
    pub fn new(categories: &[(&str, u32)], habitats: &[&str], visibility_levels: &[&str]) -> Self {
        Self {
            categories: categories
                .iter()
                .map(|&(name, id)| Category {
                    name: name.to_string(),
                    id,
                })
                .collect(),
            aliases: HashMap::new(),
            habitats: habitats.iter().map(|h| h.to_string()).collect(),
            visibility_levels: visibility_levels.iter().map(|v| v.to_string()).collect(),
            source_empty_id: 0,
            source_animal_id: 1,
        }
    }

    pub fn with_alias(mut self, alias: &str, name: &str) -> Self {
        self.aliases.insert(alias.to_string(), name.to_string());
        self
    }

    pub fn category_id(&self, name: &str) -> Option<u32> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
    }

    pub fn category_name(&self, id: u32) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }

    /// Resolve an alias, leaving other names as they are
    pub fn resolve_animal_type<'a>(&'a self, raw: &'a str) -> &'a str {
        self.aliases.get(raw).map(String::as_str).unwrap_or(raw)
    }

    /// Lower-case and replace spaces with underscores
    pub fn normalize_habitat(raw: &str) -> String {
        raw.to_lowercase().replace(' ', "_")
    }

    pub fn normalize_visibility(raw: &str) -> String {
        raw.to_lowercase()
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Taxonomy::new(
            &[
                ("empty", 0),
                ("fish", 1),
                ("crab", 2),
                ("fish_or_crab", 3),
                ("unknown", 4),
            ],
            &[
                "clam",
                "eelgrass",
                "other",
                "oyster_off_bottom",
                "oyster_on_bottom",
                "sediment",
            ],
            &["low", "medium", "high"],
        )
        .with_alias("both", "fish_or_crab")
    }
}
