use log::{debug, info};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use crate::*;

#[derive(Serialize, Deserialize, PartialEq, Clone)]
#[serde(bound = "")]
/// Feature vocabulary trained elsewhere on a collection of image keypoint descriptors. Can be:
/// 1. Loaded from a DBoW2 text file, or saved to one.
/// 2. Saved to a file & loaded from a file (requires bincode feature, enabled by default).
/// 3. Used to transform a new set of descriptors into a BoW representation (and
///    optionally get DirectIndex from features to nodes).
pub struct Vocabulary<F: FeatureKind> {
    k: usize,
    levels: usize,
    weighting: WeightingType,
    scoring: ScoringType,
    nodes: Vec<Node<F::Descriptor>>,
    /// Word id to node id.
    words: Vec<NodeId>,
}

/// Vocabulary API
impl<F: FeatureKind> Vocabulary<F> {
    /// Transform a set of descriptors into its bag of words
    /// representation with respect to the Vocabulary.
    pub fn transform(&self, features: &[F::Descriptor]) -> BowResult<BoW> {
        self.transform_generic(features, false).map(|(bow, _)| bow)
    }

    /// Transform a set of descriptors into its bag of words
    /// representation with respect to the Vocabulary.
    ///
    /// Also provides "direct index" from the features to their corresponding nodes in the Vocabulary tree.
    ///
    /// The direct index for `feature[i]` is `di = DirectIdx[i]` where
    /// `di.len() <= L` (number of levels), and `di[j]` is the id of the node matching `feature[i]`
    /// at level `j + 1` in the Vocabulary tree.
    pub fn transform_with_direct_idx(&self, features: &[F::Descriptor]) -> BowResult<(BoW, DirectIdx)> {
        self.transform_generic(features, true)
    }

    /// Similarity of two BoW vectors under the scoring of this vocabulary.
    pub fn score(&self, a: &BoW, b: &BoW) -> f64 {
        self.scoring.score(a, b)
    }

    /// Load a vocabulary in the DBoW2 text format.
    ///
    /// The first line is `k L scoring weighting`. Every following line is a node
    /// `parent_id is_leaf descriptor... weight`, numbered from 1 in file order.
    pub fn load_from_text_file<P: AsRef<Path>>(path: P) -> BowResult<Self> {
        let path = path.as_ref();
        let fail = |reason: String| BowErr::VocabularyLoad {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| fail(e.to_string()))?;
        let mut lines = BufReader::new(file).lines();

        let header = match lines.next() {
            Some(line) => line?,
            None => return Err(fail("empty file".into())),
        };
        let h: Vec<i64> = header
            .split_whitespace()
            .map(|t| t.parse::<i64>())
            .collect::<Result<_, _>>()
            .map_err(|e| fail(format!("bad header {:?}: {}", header, e)))?;
        if h.len() < 4 {
            return Err(fail(format!("bad header {:?}", header)));
        }
        let (k, levels) = (h[0], h[1]);
        if !(0..=20).contains(&k) || !(1..=MAX_LEVELS as i64).contains(&levels) {
            return Err(fail(format!("invalid branching {} or depth {}", k, levels)));
        }
        let scoring = ScoringType::from_code(h[2]).ok_or_else(|| fail(format!("invalid scoring {}", h[2])))?;
        let weighting =
            WeightingType::from_code(h[3]).ok_or_else(|| fail(format!("invalid weighting {}", h[3])))?;

        let mut voc = Self::empty(k as usize, levels as usize, weighting, scoring);
        for (i, line) in lines.enumerate() {
            let line = line?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            let lineno = i + 2;
            if fields.len() != F::TEXT_FIELDS + 3 {
                return Err(fail(format!(
                    "line {}: expected {} fields, found {}",
                    lineno,
                    F::TEXT_FIELDS + 3,
                    fields.len()
                )));
            }
            let parent: NodeId = fields[0]
                .parse()
                .map_err(|_| fail(format!("line {}: bad parent {:?}", lineno, fields[0])))?;
            if parent >= voc.nodes.len() {
                return Err(fail(format!("line {}: unknown parent {}", lineno, parent)));
            }
            let is_leaf: i64 = fields[1]
                .parse()
                .map_err(|_| fail(format!("line {}: bad leaf flag {:?}", lineno, fields[1])))?;
            let descriptor = F::from_fields(&fields[2..2 + F::TEXT_FIELDS])
                .map_err(|e| fail(format!("line {}: {}", lineno, e)))?;
            let weight: WordValue = fields[2 + F::TEXT_FIELDS]
                .parse()
                .map_err(|_| fail(format!("line {}: bad weight", lineno)))?;

            voc.push_node(parent, descriptor, weight, is_leaf > 0);
        }

        if voc.words.is_empty() {
            return Err(fail("no words".into()));
        }
        info!("Loaded {} vocabulary from {:?}: {}", F::NAME, path, voc);
        Ok(voc)
    }

    /// Save vocabulary in the DBoW2 text format.
    pub fn save_to_text_file<P: AsRef<Path>>(&self, path: P) -> BowResult<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "{} {}  {} {}", self.k, self.levels, self.scoring as i32, self.weighting as i32)?;
        for node in self.nodes.iter().skip(1) {
            if let Some(d) = &node.descriptor {
                writeln!(
                    out,
                    "{} {} {} {}",
                    node.parent,
                    node.word_id.is_some() as i32,
                    F::to_text(d),
                    node.weight
                )?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Load an vocabulary saved with [`Vocabulary::save`].
    #[cfg(feature = "bincode")]
    pub fn load<P: AsRef<std::path::Path>>(file: P) -> BowResult<Self> {
        let path = file.as_ref();
        let mut file = File::open(path).map_err(|e| BowErr::cannot_open(path, e))?;
        let mut buffer: Vec<u8> = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut buffer)?;
        Ok(bincode::deserialize(&buffer)?)
    }

    /// Save vocabulary to a file
    #[cfg(feature = "bincode")]
    pub fn save<P: AsRef<std::path::Path>>(&self, file: P) -> BowResult<()> {
        let serialized = bincode::serialize(&self)?;
        let mut file = File::create(file)?;
        file.write_all(&serialized)?;
        Ok(())
    }

    /// Number of words (leaves).
    pub fn num_words(&self) -> usize {
        self.words.len()
    }

    pub fn branching_factor(&self) -> usize {
        self.k
    }

    pub fn depth_levels(&self) -> usize {
        self.levels
    }

    pub fn scoring(&self) -> ScoringType {
        self.scoring
    }

    pub fn weighting(&self) -> WeightingType {
        self.weighting
    }

    /// Weight stored for a word.
    pub fn word_weight(&self, word: WordId) -> Option<WordValue> {
        self.words.get(word).map(|&n| self.nodes[n].weight)
    }
}

/////////////////////                Helpers                 ////////////////////////
/////////////////////////////////////////////////////////////////////////////////////

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
/// A node of the vocabulary tree. Every node but the root carries the
/// cluster center it represents.
struct Node<D> {
    parent: NodeId,
    children: Vec<NodeId>,
    descriptor: Option<D>,
    weight: WordValue,
    word_id: Option<WordId>,
}

impl<F: FeatureKind> Vocabulary<F> {
    fn transform_generic(&self, features: &[F::Descriptor], di: bool) -> BowResult<(BoW, DirectIdx)> {
        if self.words.is_empty() {
            return Err(BowErr::EmptyVocabulary);
        }
        let mut bow = BoW::new();
        let mut direct_idx: DirectIdx = Vec::with_capacity(if di { features.len() } else { 0 });
        let accumulate = self.weighting.accumulates();

        for feature in features {
            let (word_id, weight, path) = self.descend(feature);
            if di {
                direct_idx.push(path);
            }
            if weight > 0. {
                if accumulate {
                    bow.add_weight(word_id, weight);
                } else {
                    bow.add_if_not_exist(word_id, weight);
                }
            }
        }

        match self.scoring.norm() {
            Some(norm) => bow.normalize(norm),
            None if accumulate && !bow.is_empty() => {
                // DBoW2 divides by the number of distinct words
                let nd = bow.len() as f64;
                for w in bow.values_mut() {
                    *w /= nd;
                }
            }
            None => {}
        }

        Ok((bow, direct_idx))
    }

    /// Walk the tree from the root to the closest leaf.
    fn descend(&self, feature: &F::Descriptor) -> (WordId, WordValue, SmallVec<[NodeId; MAX_LEVELS]>) {
        let mut path = SmallVec::new();
        let mut node = &self.nodes[0];
        let mut id: NodeId = 0;

        // traverse tree
        while !node.children.is_empty() {
            let mut best: (f64, NodeId) = (f64::INFINITY, node.children[0]);
            for &child in node.children.iter() {
                if let Some(d) = &self.nodes[child].descriptor {
                    let dist = F::distance(feature, d);
                    if dist < best.0 {
                        best = (dist, child);
                    }
                }
            }
            id = best.1;
            node = &self.nodes[id];
            if path.len() < MAX_LEVELS {
                path.push(id);
            }
        }

        match node.word_id {
            Some(w) => (w, node.weight, path),
            // Inner node without children, only in malformed trees. Use the first word.
            None => {
                debug!("node {} has no children and is not a word", id);
                (0, 0., path)
            }
        }
    }

    fn push_node(&mut self, parent: NodeId, descriptor: F::Descriptor, weight: WordValue, leaf: bool) {
        let id = self.nodes.len();
        let word_id = if leaf {
            self.words.push(id);
            Some(self.words.len() - 1)
        } else {
            None
        };
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            descriptor: Some(descriptor),
            weight,
            word_id,
        });
        self.nodes[parent].children.push(id);
    }

    fn empty(k: usize, levels: usize, weighting: WeightingType, scoring: ScoringType) -> Self {
        Self {
            k,
            levels,
            weighting,
            scoring,
            nodes: vec![Node {
                parent: 0,
                children: Vec::new(),
                descriptor: None,
                weight: 0.,
                word_id: None,
            }],
            words: Vec::new(),
        }
    }
}

impl<F: FeatureKind> fmt::Display for Vocabulary<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Vocabulary: k = {}, L = {}, Weighting = {}, Scoring = {}, Number of words = {}",
            self.k,
            self.levels,
            self.weighting,
            self.scoring,
            self.words.len()
        )
    }
}

impl<F: FeatureKind> fmt::Debug for Vocabulary<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vocabulary")
            .field("Feature", &F::NAME)
            .field("Word/Leaf Nodes", &self.words.len())
            .field("Other Nodes", &(self.nodes.len() - self.words.len()))
            .field("Levels", &self.levels)
            .field("Branching Factor", &self.k)
            .field("Weighting", &self.weighting)
            .field("Scoring", &self.scoring)
            .finish()
    }
}
