//! Vocabulary self-test and database evaluation.
//!
//! The harness loads the frames of a sequence, scores a few of them against
//! each other with the vocabulary, adds every frame to a database and then
//! either prints a few diagnostic queries or writes the matches of one frame
//! to a `.dat` table.

use log::info;
use std::{path::Path, str::FromStr};

use crate::{
    descriptor_file::read_descriptor_file, output::write_table, BowErr, BowResult, Cnn, CnnDesc,
    Database, Desc, FeatureKind, HarnessConfig, QueryResults, Vocabulary,
};

/// Storage format of a vocabulary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocFormat {
    /// DBoW2 text format.
    Text,
    /// This crate's bincode format.
    Bincode,
}

impl FromStr for VocFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" | "txt" => Ok(VocFormat::Text),
            "bincode" | "bin" => Ok(VocFormat::Bincode),
            other => Err(format!("unknown vocabulary format {}", other)),
        }
    }
}

/// Load a vocabulary. Any failure is reported as [`BowErr::VocabularyLoad`].
pub fn load_vocabulary<F: FeatureKind>(path: &Path, format: VocFormat) -> BowResult<Vocabulary<F>> {
    info!("Loading vocabulary");
    let loaded = match format {
        VocFormat::Text => Vocabulary::<F>::load_from_text_file(path),
        #[cfg(feature = "bincode")]
        VocFormat::Bincode => Vocabulary::<F>::load(path),
        #[cfg(not(feature = "bincode"))]
        VocFormat::Bincode => Err(BowErr::FeatureUnavailable("bincode")),
    };
    loaded.map_err(|e| match e {
        e @ BowErr::VocabularyLoad { .. } => e,
        e => BowErr::VocabularyLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })
}

/// Load CNN frames from a binary descriptor file.
pub fn load_cnn_frames(source: &Path, config: &HarnessConfig) -> BowResult<Vec<Vec<CnnDesc>>> {
    info!("About to load features of {} images", config.frame_count);
    read_descriptor_file::<Cnn, _>(source, &config.descriptors)
}

/// Load ORB frames: extracted from `NNNNNN.png` images when `source` is a
/// folder, read from a binary descriptor file otherwise.
pub fn load_orb_frames(source: &Path, config: &HarnessConfig) -> BowResult<Vec<Vec<Desc>>> {
    if source.is_dir() {
        extract_orb_frames(source, config.frame_count)
    } else {
        read_descriptor_file::<crate::Orb, _>(source, &config.descriptors)
    }
}

#[cfg(feature = "opencv")]
fn extract_orb_frames(folder: &Path, count: usize) -> BowResult<Vec<Vec<Desc>>> {
    crate::opencv_utils::load_orb_features(folder, count)
}

#[cfg(not(feature = "opencv"))]
fn extract_orb_frames(folder: &Path, _count: usize) -> BowResult<Vec<Vec<Desc>>> {
    log::error!(
        "cannot extract features from {:?}, first image would be {:?}",
        folder,
        crate::opencv_utils::image_path(folder, 0)
    );
    Err(BowErr::FeatureUnavailable("opencv"))
}

/// Score of frame `i` against frame `j`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairScore {
    pub i: usize,
    pub j: usize,
    pub score: f64,
}

/// Score the first `n` frames against each other (0 low, 1 high).
pub fn self_test<F: FeatureKind>(
    voc: &Vocabulary<F>,
    frames: &[Vec<F::Descriptor>],
    n: usize,
) -> BowResult<Vec<PairScore>> {
    let bows = frames
        .iter()
        .take(n)
        .map(|f| voc.transform(f))
        .collect::<BowResult<Vec<_>>>()?;
    let mut scores = Vec::with_capacity(bows.len() * bows.len());
    for (i, v1) in bows.iter().enumerate() {
        for (j, v2) in bows.iter().enumerate() {
            scores.push(PairScore {
                i,
                j,
                score: voc.score(v1, v2),
            });
        }
    }
    Ok(scores)
}

/// Add every frame to the database. Entry ids equal frame positions.
pub fn populate<F: FeatureKind>(db: &mut Database<'_, F>, frames: &[Vec<F::Descriptor>]) -> BowResult<()> {
    for f in frames {
        db.add(f)?;
    }
    Ok(())
}

/// Query the database with each of the first `n` frames.
pub fn diagnostic_queries<F: FeatureKind>(
    db: &Database<'_, F>,
    frames: &[Vec<F::Descriptor>],
    n: usize,
    top_k: usize,
) -> BowResult<Vec<QueryResults>> {
    frames.iter().take(n).map(|f| db.query(f, top_k)).collect()
}

/// Query the database with frame `index`.
pub fn matching_query<F: FeatureKind>(
    db: &Database<'_, F>,
    frames: &[Vec<F::Descriptor>],
    index: usize,
    top_k: usize,
) -> BowResult<QueryResults> {
    let f = frames.get(index).ok_or(BowErr::IndexOutOfRange {
        index,
        len: frames.len(),
    })?;
    db.query(f, top_k)
}

/// Write query results as `<id> <score>` rows under a `#x y` header.
pub fn write_scores<P: AsRef<Path>>(path: P, results: &QueryResults) -> BowResult<usize> {
    write_table(path, "x y", results.iter().map(|r| (r.id, r.score)))
}

/// Run the whole evaluation on loaded frames.
///
/// With an output path the matches of `config.matching_image` are written
/// there, otherwise diagnostic queries are printed.
pub fn run<F: FeatureKind>(
    voc: &Vocabulary<F>,
    frames: &[Vec<F::Descriptor>],
    config: &HarnessConfig,
    output: Option<&Path>,
) -> BowResult<()> {
    println!("Matching images against themselves (0 low, 1 high): ");
    for s in self_test(voc, frames, config.self_test_frames)? {
        println!("Image {} vs Image {}: {}", s.i, s.j, s.score);
    }

    info!("Creating a database of {} frames", frames.len());
    let mut db = Database::new(voc);
    populate(&mut db, frames)?;
    println!("Database information: \n{}", db);

    match output {
        None => {
            println!("Querying the database: ");
            let results = diagnostic_queries(&db, frames, config.diagnostic_queries, config.diagnostic_top_k)?;
            for (i, ret) in results.iter().enumerate() {
                println!("Searching for Image {}. {}", i, ret);
            }
            println!();
        }
        Some(path) => {
            let ret = matching_query(&db, frames, config.matching_image, config.frame_count)?;
            write_scores(path, &ret)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{vocab::tests::orb_voc_text, vocab::tests::write_tmp, Orb};
    use approx::assert_relative_eq;

    fn frames() -> Vec<Vec<Desc>> {
        vec![
            vec![[0u8; 32]],
            vec![[255u8; 32]],
            vec![[0u8; 32], [255u8; 32]],
            vec![[15u8; 32], [0u8; 32]],
            vec![[240u8; 32]],
        ]
    }

    fn voc() -> Vocabulary<Orb> {
        let f = write_tmp(&orb_voc_text());
        load_vocabulary::<Orb>(f.path(), VocFormat::Text).unwrap()
    }

    #[test]
    fn self_test_scores_every_pair_of_first_frames() {
        let voc = voc();
        let scores = self_test(&voc, &frames(), 4).unwrap();
        assert_eq!(scores.len(), 16);
        for s in scores.iter().filter(|s| s.i == s.j) {
            assert_relative_eq!(s.score, 1.0, epsilon = 1e-12);
        }
        let s01 = scores.iter().find(|s| s.i == 0 && s.j == 1).unwrap();
        assert_relative_eq!(s01.score, 0.0);
    }

    #[test]
    fn self_test_is_bounded_by_frame_count() {
        let voc = voc();
        assert_eq!(self_test(&voc, &frames()[..2], 4).unwrap().len(), 4);
    }

    #[test]
    fn diagnostic_queries_find_self() {
        let voc = voc();
        let frames = frames();
        let mut db = Database::new(&voc);
        populate(&mut db, &frames).unwrap();
        assert_eq!(db.len(), frames.len());
        let results = diagnostic_queries(&db, &frames, 4, 4).unwrap();
        assert_eq!(results.len(), 4);
        for (i, ret) in results.iter().enumerate() {
            assert!(ret.len() <= 4);
            assert_eq!(ret.0[0].id, i);
        }
    }

    #[test]
    fn matching_query_out_of_range() {
        let voc = voc();
        let frames = frames();
        let mut db = Database::new(&voc);
        populate(&mut db, &frames).unwrap();
        let err = matching_query(&db, &frames, 70, 10).unwrap_err();
        assert!(matches!(err, BowErr::IndexOutOfRange { index: 70, len: 5 }));
    }

    #[test]
    fn run_writes_matches_of_matching_image() {
        let voc = voc();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("scores.dat");
        let config = HarnessConfig {
            matching_image: 1,
            ..Default::default()
        };
        run(&voc, &frames(), &config, Some(&out)).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#x y");
        // frame 1 is in entries 1 and 2 only, entry 2 holds word 2 at 2/3
        assert_eq!(&lines[1..], &["1 1", "2 0.666667"]);
    }

    #[test]
    fn missing_vocabulary_is_a_load_error() {
        for format in [VocFormat::Text, VocFormat::Bincode] {
            let err = load_vocabulary::<Cnn>(Path::new("/nonexistent/voc"), format).unwrap_err();
            assert!(matches!(err, BowErr::VocabularyLoad { .. }));
        }
    }

    #[test]
    fn orb_file_source_is_read_as_descriptor_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        crate::descriptor_file::write_descriptor_file::<Orb, _>(f.path(), &frames()).unwrap();
        let loaded = load_orb_frames(f.path(), &HarnessConfig::default()).unwrap();
        assert_eq!(loaded, frames());
    }

    #[test]
    fn voc_format_tokens() {
        assert_eq!("text".parse::<VocFormat>(), Ok(VocFormat::Text));
        assert_eq!("bincode".parse::<VocFormat>(), Ok(VocFormat::Bincode));
        assert!("yaml".parse::<VocFormat>().is_err());
    }
}
