//! COCO category refinement
//!
//! This library rewrites a COCO-style dataset that labels images with a single
//! generic "animal" category into a finer category scheme, using a second
//! per-image metadata file that also supplies habitat and visibility.

pub mod archive;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod index;
pub mod integrity;
pub mod io;
pub mod merge;
pub mod pipeline;
pub mod preview;
pub mod rewrite;
pub mod types;
pub mod utils;
pub mod validate;

// Re-export commonly used types and functions
pub use config::{Args, CleanerMode, PipelineConfig, Taxonomy, TransformOptions};
pub use error::{Error, ErrorPolicy, Result, Violation, ViolationKind};
pub use index::AnnotationIndex;
pub use pipeline::{run, transform, PipelineSummary, TransformSummary};
pub use types::{AnnotationRecord, Category, Dataset, ImageRecord, MetadataFile, MetadataImage, RecordId};
