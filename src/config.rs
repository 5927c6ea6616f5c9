//! Configuration for the readers and the vocabulary harness.
//!
//! Every field has a default, so an empty YAML document is a valid
//! configuration. Command line flags override the loaded values.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{BowErr, BowResult};

/// What a reader does with a record it cannot parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsePolicy {
    /// Fail with an error carrying the position of the record.
    Strict,
    /// Skip the record and keep going (or stop, for binary streams).
    Lenient,
}

/// What a descriptor reader does with a frame without features.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyFrames {
    /// Omit the frame. Array positions no longer match frame numbers.
    Drop,
    /// Keep an empty descriptor set in its place.
    Keep,
}

/// Descriptor file reader settings
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub policy: ParsePolicy,
    pub empty_frames: EmptyFrames,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            policy: ParsePolicy::Strict,
            empty_frames: EmptyFrames::Drop,
        }
    }
}

/// Settings of the vocabulary/database harness
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Number of images read from an image folder. Also the number of
    /// matches written for the matching query.
    pub frame_count: usize,
    /// Frame queried against the database when an output name is given.
    pub matching_image: usize,
    /// Frames scored against each other by the vocabulary self-test.
    pub self_test_frames: usize,
    /// Frames queried when no output name is given.
    pub diagnostic_queries: usize,
    /// Matches printed per diagnostic query.
    pub diagnostic_top_k: usize,
    /// Binary descriptor reader settings.
    pub descriptors: ReaderConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            // KITTI sequence 05
            frame_count: 2761,
            matching_image: 70,
            self_test_frames: 4,
            diagnostic_queries: 4,
            diagnostic_top_k: 4,
            descriptors: ReaderConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> BowResult<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| BowErr::cannot_open(path, e))?;
        Self::from_yaml(&contents)
    }

    /// Parse from YAML string
    pub fn from_yaml(yaml: &str) -> BowResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| BowErr::Config(e.to_string()))
    }
}
