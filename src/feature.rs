use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, str::FromStr};

use crate::{CnnDesc, Desc, CNN_DESC_LEN};

/// A family of keypoint descriptors: how they are stored, compared,
/// written in a text vocabulary and encoded in a descriptor file.
pub trait FeatureKind {
    type Descriptor: Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned;

    /// Short name used in logs.
    const NAME: &'static str;
    /// Number of whitespace separated fields of a descriptor in a text vocabulary.
    const TEXT_FIELDS: usize;
    /// Size in bytes of an encoded descriptor in a descriptor file.
    const RECORD_BYTES: usize;

    /// Distance between two descriptors. Lower is closer.
    fn distance(a: &Self::Descriptor, b: &Self::Descriptor) -> f64;

    /// Parse a descriptor from exactly [`Self::TEXT_FIELDS`] fields.
    fn from_fields(fields: &[&str]) -> Result<Self::Descriptor, String>;

    /// Inverse of [`FeatureKind::from_fields`].
    fn to_text(desc: &Self::Descriptor) -> String;

    /// Decode a descriptor from exactly [`Self::RECORD_BYTES`] bytes.
    fn decode(bytes: &[u8]) -> Self::Descriptor;

    /// Append the encoding of `desc` to `out`.
    fn encode(desc: &Self::Descriptor, out: &mut Vec<u8>);
}

/// 256-bit ORB descriptors compared with the Hamming distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Orb;

impl FeatureKind for Orb {
    type Descriptor = Desc;

    const NAME: &'static str = "ORB";
    const TEXT_FIELDS: usize = 32;
    const RECORD_BYTES: usize = 32;

    #[inline]
    fn distance(a: &Desc, b: &Desc) -> f64 {
        hamming(a, b) as f64
    }

    fn from_fields(fields: &[&str]) -> Result<Desc, String> {
        if fields.len() != Self::TEXT_FIELDS {
            return Err(format!("expected {} fields, found {}", Self::TEXT_FIELDS, fields.len()));
        }
        let mut desc: Desc = [0; 32];
        for (d, f) in desc.iter_mut().zip(fields) {
            *d = f.parse::<u8>().map_err(|e| format!("bad byte {:?}: {}", f, e))?;
        }
        Ok(desc)
    }

    fn to_text(desc: &Desc) -> String {
        desc.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(" ")
    }

    fn decode(bytes: &[u8]) -> Desc {
        let mut desc: Desc = [0; 32];
        desc.copy_from_slice(&bytes[..Self::RECORD_BYTES]);
        desc
    }

    fn encode(desc: &Desc, out: &mut Vec<u8>) {
        out.extend_from_slice(desc);
    }
}

/// Dense float descriptors from a CNN, compared with the Euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cnn;

impl FeatureKind for Cnn {
    type Descriptor = CnnDesc;

    const NAME: &'static str = "CNN";
    const TEXT_FIELDS: usize = CNN_DESC_LEN;
    const RECORD_BYTES: usize = CNN_DESC_LEN * 4;

    fn distance(a: &CnnDesc, b: &CnnDesc) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| {
                let d = (*x - *y) as f64;
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    fn from_fields(fields: &[&str]) -> Result<CnnDesc, String> {
        if fields.len() != Self::TEXT_FIELDS {
            return Err(format!("expected {} fields, found {}", Self::TEXT_FIELDS, fields.len()));
        }
        fields
            .iter()
            .map(|f| f.parse::<f32>().map_err(|e| format!("bad float {:?}: {}", f, e)))
            .collect()
    }

    fn to_text(desc: &CnnDesc) -> String {
        desc.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
    }

    fn decode(bytes: &[u8]) -> CnnDesc {
        bytes[..Self::RECORD_BYTES]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn encode(desc: &CnnDesc, out: &mut Vec<u8>) {
        for v in desc {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
}

#[inline]
/// Hamming distance between two binary arrays (descriptors).
pub fn hamming(x: &[u8], y: &[u8]) -> u32 {
    x.iter()
        .zip(y)
        .fold(0, |a, (b, c)| a + (*b ^ *c).count_ones())
}

/// Runtime tag selecting the descriptor kind from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    Orb,
    Cnn,
}

impl FromStr for FeatureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orb" => Ok(FeatureType::Orb),
            "cnn" => Ok(FeatureType::Cnn),
            other => Err(format!("{} needs to be orb or cnn", other)),
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeatureType::Orb => "orb",
            FeatureType::Cnn => "cnn",
        })
    }
}
