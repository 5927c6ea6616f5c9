use std::path::PathBuf;
use thiserror::Error;

/// Bag-of-words vectors and the scoring functions defined on them.
pub mod bow;
pub use bow::{BoW, BoWTrait, ScoringType, WeightingType};

/// Descriptor kinds (ORB, CNN) the tools can work with.
pub mod feature;
pub use feature::{Cnn, FeatureKind, FeatureType, Orb};

/// Consumer-side visual vocabulary: loading, transforming and scoring.
pub mod vocab;
pub use vocab::Vocabulary;

/// Image database with an inverted file, queried with descriptor sets.
pub mod database;
pub use database::{Database, QueryResult, QueryResults};

/// Ground truth trajectories and distances between poses.
pub mod pose;

/// Reader and writer for binary descriptor files.
pub mod descriptor_file;

/// Utilities for extracting keypoint descriptors using opencv.
pub mod opencv_utils;
#[cfg(feature = "opencv")]
pub use opencv_utils::*;

/// Flat `.dat` table output.
pub mod output;

/// Harness configuration.
pub mod config;
pub use config::{EmptyFrames, HarnessConfig, ParsePolicy, ReaderConfig};

/// Vocabulary self-test and database query harness.
pub mod harness;

/// Binary ORB descriptor.
///
/// This is the most commonly used keypoint descriptor data type.
/// It is used by ORB and BRIEF, for example.
pub type Desc = [u8; 32];

/// Number of elements in a CNN descriptor.
pub const CNN_DESC_LEN: usize = 128;

/// Dense CNN descriptor of [`CNN_DESC_LEN`] floats.
pub type CnnDesc = Vec<f32>;

/// Id of a word (leaf) in the vocabulary.
pub type WordId = usize;

/// Weight of a word in a BoW vector.
pub type WordValue = f64;

/// Index of a node in the vocabulary tree. The root is node 0.
pub type NodeId = usize;

/// Id of an entry in the database, equal to its insertion order.
pub type EntryId = usize;

/// Deepest vocabulary tree accepted when loading.
pub const MAX_LEVELS: usize = 10;

/// This type represents a map from features to their corresponding nodes in the Vocabulary tree.
///
/// The direct index for `feature[i]` is `di = DirectIdx[i]` where
/// `di.len() <= L` (number of levels), and `di[j]` is the id of the node matching `feature[i]`
/// at level `j + 1` in the Vocabulary tree.
pub type DirectIdx = Vec<smallvec::SmallVec<[NodeId; MAX_LEVELS]>>;

pub type BowResult<T> = std::result::Result<T, BowErr>;

#[derive(Error, Debug)]
pub enum BowErr {
    #[error("Io Error")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "bincode")]
    #[error("Vocabulary Serialization Error")]
    Bincode(#[from] bincode::Error),
    #[cfg(feature = "opencv")]
    #[error("Opencv Error")]
    OpenCvInternal(#[from] opencv::Error),
    #[cfg(feature = "opencv")]
    #[error("Opencv Descriptor decode error")]
    OpenCvDecode,
    #[error("cannot open file {path:?}")]
    CannotOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot load vocabulary from {path:?}: {reason}")]
    VocabularyLoad { path: PathBuf, reason: String },
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
    #[error("truncated descriptor record in frame {frame} at byte offset {offset}")]
    Truncated { frame: usize, offset: u64 },
    #[error("index {index} out of range for {len} entries")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("cannot load image {path:?}")]
    ImageLoad { path: PathBuf },
    #[error("vocabulary has no words")]
    EmptyVocabulary,
    #[error("crate was built without the `{0}` feature")]
    FeatureUnavailable(&'static str),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BowErr {
    /// Wrap an io error from opening `path`.
    pub(crate) fn cannot_open<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        BowErr::CannotOpen {
            path: path.into(),
            source,
        }
    }
}
