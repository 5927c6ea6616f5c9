use log::{debug, info};
use nalgebra::{Matrix4, Vector3};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{BowErr, BowResult, ParsePolicy};

/// Frame a trajectory is compared against by default.
pub const DEFAULT_REFERENCE: usize = 70;

/// Rigid body pose of one frame, as a homogeneous 4x4 transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose(pub Matrix4<f64>);

impl Pose {
    /// Build a pose from the 12 row-major values of its upper 3x4 block.
    pub fn from_row_major(v: &[f64; 12]) -> Self {
        Pose(Matrix4::new(
            v[0], v[1], v[2], v[3], //
            v[4], v[5], v[6], v[7], //
            v[8], v[9], v[10], v[11], //
            0., 0., 0., 1.,
        ))
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.0.fixed_view::<3, 1>(0, 3).into_owned()
    }
}

/// Distance of one frame to the reference frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceRecord {
    pub frame: usize,
    pub distance: f64,
}

/// Load a trajectory of row-major 3x4 matrices (KITTI format).
///
/// The file is read as a stream of whitespace separated numbers grouped
/// twelve at a time, so line breaks do not matter. Under
/// [`ParsePolicy::Lenient`] a token that is not a number discards the record
/// being built and reading resumes after it; an incomplete last record is
/// dropped. The index of a pose is its position among the parsed ones.
pub fn load_poses<P: AsRef<Path>>(path: P, policy: ParsePolicy) -> BowResult<Vec<Pose>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| BowErr::cannot_open(path, e))?;
    let mut poses = Vec::new();
    let mut record = [0.; 12];
    let mut filled = 0;
    // line of the first token of the current record
    let mut record_line = 0;

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        for token in line.split_whitespace() {
            if filled == 0 {
                record_line = i + 1;
            }
            match token.parse::<f64>() {
                Ok(x) => {
                    record[filled] = x;
                    filled += 1;
                    if filled == 12 {
                        poses.push(Pose::from_row_major(&record));
                        filled = 0;
                    }
                }
                Err(_) => {
                    let reason = format!("bad number {:?} in record {}", token, poses.len());
                    match policy {
                        ParsePolicy::Strict => return Err(BowErr::MalformedRecord { line: i + 1, reason }),
                        ParsePolicy::Lenient => debug!("line {}: {}, dropping {} values", i + 1, reason, filled),
                    }
                    filled = 0;
                }
            }
        }
    }

    if filled > 0 {
        let reason = format!("expected 12 fields, found {}", filled);
        match policy {
            ParsePolicy::Strict => {
                return Err(BowErr::MalformedRecord {
                    line: record_line,
                    reason,
                })
            }
            ParsePolicy::Lenient => debug!("line {}: {}", record_line, reason),
        }
    }
    info!("Loaded {} poses from {:?}", poses.len(), path);
    Ok(poses)
}

/// Euclidean distance between the translation of every pose and the
/// translation of `poses[reference]`.
pub fn trajectory_distances(poses: &[Pose], reference: usize) -> BowResult<Vec<DistanceRecord>> {
    let p1 = poses
        .get(reference)
        .ok_or(BowErr::IndexOutOfRange {
            index: reference,
            len: poses.len(),
        })?
        .translation();
    Ok(poses
        .iter()
        .enumerate()
        .map(|(frame, p2)| DistanceRecord {
            frame,
            distance: (p1 - p2.translation()).norm(),
        })
        .collect())
}
