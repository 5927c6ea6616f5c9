use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::{WordId, WordValue};

/// Bag-of-Words representation of an image or descriptor set.
///
/// Key: word/leaf id in the vocabulary.
///
/// Value: total weight of that word in provided features.
pub type BoW = BTreeMap<WordId, WordValue>;

/// Norm used to normalize a BoW vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LNorm {
    L1,
    L2,
}

/// Provides methods for building and normalizing sparse BoW vectors.
pub trait BoWTrait {
    /// Add `value` to the weight of `id`, inserting it if missing.
    fn add_weight(&mut self, id: WordId, value: WordValue);
    /// Insert `id` with `value` only if it is not present yet.
    fn add_if_not_exist(&mut self, id: WordId, value: WordValue);
    /// Scale the vector to unit norm. Zero vectors are left untouched.
    fn normalize(&mut self, norm: LNorm);
    /// Compute L1 similarity between two normalized BoW. (Used in Galvez (Eq 2)).
    fn l1(&self, other: &Self) -> f64;
    /// Compute L2 similarity between two normalized BoW.
    fn l2(&self, other: &Self) -> f64;
}

impl BoWTrait for BoW {
    fn add_weight(&mut self, id: WordId, value: WordValue) {
        *self.entry(id).or_insert(0.) += value;
    }

    fn add_if_not_exist(&mut self, id: WordId, value: WordValue) {
        self.entry(id).or_insert(value);
    }

    fn normalize(&mut self, norm: LNorm) {
        let n: f64 = match norm {
            LNorm::L1 => self.values().map(|v| v.abs()).sum(),
            LNorm::L2 => self.values().map(|v| v * v).sum::<f64>().sqrt(),
        };
        if n > 0. {
            let inv = 1. / n;
            for w in self.values_mut() {
                *w *= inv;
            }
        }
    }

    fn l1(&self, other: &Self) -> f64 {
        // Only common words contribute: |a| + |b| - |a - b| is zero elsewhere.
        0.5 * common(self, other).fold(0., |acc, (a, b)| acc + a.abs() + b.abs() - (a - b).abs())
    }

    fn l2(&self, other: &Self) -> f64 {
        let dot = common(self, other).fold(0., |acc, (a, b)| acc + a * b);
        if dot >= 1. {
            1.
        } else {
            1. - (1. - dot).sqrt()
        }
    }
}

/// Pairs of weights for the words present in both vectors.
fn common<'a>(a: &'a BoW, b: &'a BoW) -> impl Iterator<Item = (f64, f64)> + 'a {
    a.iter()
        .filter_map(move |(id, va)| b.get(id).map(|vb| (*va, *vb)))
}

/// Similarity function between two BoW vectors. Discriminants follow the
/// DBoW2 text vocabulary header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoringType {
    L1Norm = 0,
    L2Norm = 1,
    ChiSquare = 2,
    Kl = 3,
    Bhattacharyya = 4,
    DotProduct = 5,
}

impl ScoringType {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => ScoringType::L1Norm,
            1 => ScoringType::L2Norm,
            2 => ScoringType::ChiSquare,
            3 => ScoringType::Kl,
            4 => ScoringType::Bhattacharyya,
            5 => ScoringType::DotProduct,
            _ => return None,
        })
    }

    /// Norm that vectors must have before being scored, if any.
    pub fn norm(self) -> Option<LNorm> {
        match self {
            ScoringType::L2Norm => Some(LNorm::L2),
            ScoringType::DotProduct => None,
            _ => Some(LNorm::L1),
        }
    }

    /// Score two BoW vectors. Higher means more similar.
    pub fn score(self, a: &BoW, b: &BoW) -> f64 {
        match self {
            ScoringType::L1Norm => a.l1(b),
            ScoringType::L2Norm => a.l2(b),
            ScoringType::ChiSquare => {
                let s = common(a, b)
                    .filter(|(va, vb)| va + vb != 0.)
                    .fold(0., |acc, (va, vb)| acc + va * vb / (va + vb));
                2. * s
            }
            ScoringType::Kl => {
                let log_eps = f64::EPSILON.ln();
                a.iter()
                    .filter(|(_, va)| **va != 0.)
                    .fold(0., |acc, (id, va)| match b.get(id) {
                        Some(vb) if *vb != 0. => acc + va * (va / vb).ln(),
                        // shared word without weight
                        Some(_) => acc,
                        None => acc + va * (va.ln() - log_eps),
                    })
            }
            ScoringType::Bhattacharyya => common(a, b).fold(0., |acc, (va, vb)| acc + (va * vb).sqrt()),
            ScoringType::DotProduct => common(a, b).fold(0., |acc, (va, vb)| acc + va * vb),
        }
    }
}

impl fmt::Display for ScoringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScoringType::L1Norm => "L1-norm",
            ScoringType::L2Norm => "L2-norm",
            ScoringType::ChiSquare => "Chi square distance",
            ScoringType::Kl => "KL-divergence",
            ScoringType::Bhattacharyya => "Bhattacharyya coefficient",
            ScoringType::DotProduct => "Dot product",
        })
    }
}

/// How word weights are accumulated when transforming features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightingType {
    TfIdf = 0,
    Tf = 1,
    Idf = 2,
    Binary = 3,
}

impl WeightingType {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => WeightingType::TfIdf,
            1 => WeightingType::Tf,
            2 => WeightingType::Idf,
            3 => WeightingType::Binary,
            _ => return None,
        })
    }

    /// Whether every occurrence of a word adds to its weight.
    pub fn accumulates(self) -> bool {
        matches!(self, WeightingType::TfIdf | WeightingType::Tf)
    }
}

impl fmt::Display for WeightingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WeightingType::TfIdf => "tf-idf",
            WeightingType::Tf => "tf",
            WeightingType::Idf => "idf",
            WeightingType::Binary => "binary",
        })
    }
}
