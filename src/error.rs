use std::fmt;
use std::path::PathBuf;

use crate::types::RecordId;

/// A broken dataset invariant, tagged with the record that broke it
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    #[error("image count mismatch: original has {original}, metadata has {metadata}")]
    ImageCountMismatch { original: usize, metadata: usize },

    #[error("metadata file name {file_name:?} is not in the original dataset")]
    UnknownFileName { file_name: String },

    #[error("metadata image id {image_id} is not in the original dataset")]
    UnknownImageId { image_id: RecordId },

    #[error("image {image_id}: metadata file name {metadata:?} does not match original {original:?}")]
    FileNameMismatch {
        image_id: RecordId,
        original: String,
        metadata: String,
    },

    #[error("image id {image_id} appears more than once in the original dataset")]
    DuplicateImageId { image_id: RecordId },

    #[error("annotation id {annotation_id} appears more than once")]
    DuplicateAnnotationId { annotation_id: RecordId },

    #[error("annotation {annotation_id} has {count} keys, expected 4 or 5")]
    AnnotationKeyCount {
        annotation_id: RecordId,
        count: usize,
    },

    #[error("annotation {annotation_id} has a bbox but category {category_id}")]
    BboxOnNonAnimal {
        annotation_id: RecordId,
        category_id: u32,
    },

    #[error("image {image_id} has no annotations")]
    UnannotatedImage { image_id: RecordId },

    #[error("annotation {annotation_id} refers to unknown image {image_id}")]
    OrphanAnnotation {
        annotation_id: RecordId,
        image_id: RecordId,
    },

    #[error("image {image_id} mixes categories {category_ids:?}")]
    MixedCategories {
        image_id: RecordId,
        category_ids: Vec<u32>,
    },

    #[error("image {image_id} has {count} redundant empty annotations, expected a pair")]
    RedundantGroupSize { image_id: RecordId, count: usize },

    #[error("image {image_id}: field {field} is not a {expected}")]
    InvalidFieldType {
        image_id: RecordId,
        field: &'static str,
        expected: &'static str,
    },

    #[error("image {image_id}: unknown habitat type {value:?}")]
    UnknownHabitat { image_id: RecordId, value: String },

    #[error("image {image_id}: unknown visibility {value:?}")]
    UnknownVisibility { image_id: RecordId, value: String },

    #[error("image {image_id}: unknown animal type {value:?}")]
    UnknownAnimalType { image_id: RecordId, value: String },

    #[error("image {image_id}: metadata record has {count} keys, expected {expected}")]
    MetadataKeyCount {
        image_id: RecordId,
        count: usize,
        expected: usize,
    },

    #[error("image {image_id} has no animal type but is not a single empty annotation")]
    ExpectedEmpty { image_id: RecordId },

    #[error("image {image_id} has an animal type but annotations {annotation_ids:?} are not animals")]
    ExpectedAnimal {
        image_id: RecordId,
        annotation_ids: Vec<RecordId>,
    },

    #[error("expected output file was not created: {}", .path.display())]
    MissingArtifact { path: PathBuf },
}

/// Coarse grouping of violations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    CrossDocument,
    MalformedAnnotation,
    DuplicateStructure,
    OutOfEnumeration,
    MissingArtifact,
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        use Violation::*;
        match self {
            ImageCountMismatch { .. }
            | UnknownFileName { .. }
            | UnknownImageId { .. }
            | FileNameMismatch { .. }
            | UnannotatedImage { .. }
            | OrphanAnnotation { .. }
            | MetadataKeyCount { .. }
            | ExpectedEmpty { .. }
            | ExpectedAnimal { .. } => ViolationKind::CrossDocument,
            AnnotationKeyCount { .. }
            | BboxOnNonAnimal { .. }
            | MixedCategories { .. }
            | InvalidFieldType { .. } => ViolationKind::MalformedAnnotation,
            DuplicateImageId { .. } | DuplicateAnnotationId { .. } | RedundantGroupSize { .. } => {
                ViolationKind::DuplicateStructure
            }
            UnknownHabitat { .. } | UnknownVisibility { .. } | UnknownAnimalType { .. } => {
                ViolationKind::OutOfEnumeration
            }
            MissingArtifact { .. } => ViolationKind::MissingArtifact,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("input path does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("{}", ViolationList(.0))]
    Violations(Vec<Violation>),

    #[error("integrity check found {0} structural problem(s)")]
    Integrity(usize),
}

impl Error {
    /// The violations carried by this error, if any
    pub fn violations(&self) -> &[Violation] {
        match self {
            Error::Violations(violations) => violations,
            _ => &[],
        }
    }
}

struct ViolationList<'a>(&'a [Violation]);

impl fmt::Display for ViolationList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            [] => write!(f, "invariant violated"),
            [only] => write!(f, "invariant violated: {}", only),
            [first, rest @ ..] => write!(
                f,
                "{} invariants violated; first: {}",
                rest.len() + 1,
                first
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Whether a stage stops at its first violation or reports all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    #[default]
    FailFast,
    FailSlow,
}

/// Collects violations for one stage according to an [`ErrorPolicy`]
#[derive(Debug)]
pub struct ViolationSink {
    policy: ErrorPolicy,
    violations: Vec<Violation>,
}

impl ViolationSink {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            violations: Vec::new(),
        }
    }

    /// Record a violation. Under fail-fast this returns the error right away.
    pub fn report(&mut self, violation: Violation) -> Result<()> {
        match self.policy {
            ErrorPolicy::FailFast => Err(Error::Violations(vec![violation])),
            ErrorPolicy::FailSlow => {
                self.violations.push(violation);
                Ok(())
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Close the stage: an error if anything was collected
    pub fn finish(self) -> Result<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Violations(self.violations))
        }
    }
}
