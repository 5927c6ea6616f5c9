use std::path::{Path, PathBuf};

#[cfg(feature = "opencv")]
use crate::{BowErr, BowResult, Desc};
#[cfg(feature = "opencv")]
use log::{debug, info};
#[cfg(feature = "opencv")]
use opencv::{self, core::MatTrait, prelude::Feature2DTrait};
#[cfg(feature = "opencv")]
use std::convert::TryInto;

#[cfg(feature = "opencv")]
type CvImage = opencv::prelude::Mat;
#[cfg(feature = "opencv")]
type CvMat = opencv::core::Mat;

/// Image of frame `i` in an image folder: `<folder>/NNNNNN.png`.
pub fn image_path<P: AsRef<Path>>(folder: P, i: usize) -> PathBuf {
    folder.as_ref().join(format!("{:06}.png", i))
}

/// Extract orb keypoint descriptors from an image, one per keypoint.
#[cfg(feature = "opencv")]
fn orb_from_cvimage(cv_img: &CvImage) -> BowResult<Vec<Desc>> {
    // Create detector
    let mut orb = opencv::features2d::ORB::default()?;

    // Detect keypoints and compute descriptors
    let mut kps = opencv::types::VectorOfKeyPoint::new();
    let mut desc = CvMat::default()?;
    let mask = CvMat::default()?;
    orb.detect_and_compute(cv_img, &mask, &mut kps, &mut desc, false)?;

    // Copy every descriptor row into its own buffer
    (0..kps.len())
        .map(|i| -> BowResult<Desc> {
            let row = (0..32)
                .map(|j| desc.at_2d::<u8>(i as i32, j).map(|v| *v))
                .collect::<Result<Vec<u8>, _>>()?;
            row.as_slice().try_into().map_err(|_| BowErr::OpenCvDecode)
        })
        .collect()
}

/// Use opencv to load a grayscale image and extract orb keypoint descriptors.
#[cfg(feature = "opencv")]
pub fn load_img_get_kps<P: AsRef<Path>>(path: P) -> BowResult<Vec<Desc>> {
    let path = path.as_ref();
    let name = path.to_str().ok_or_else(|| BowErr::ImageLoad {
        path: path.to_path_buf(),
    })?;
    let img: CvImage = opencv::imgcodecs::imread(name, opencv::imgcodecs::IMREAD_GRAYSCALE)?;
    if img.empty()? {
        return Err(BowErr::ImageLoad {
            path: path.to_path_buf(),
        });
    }
    orb_from_cvimage(&img)
}

/// Extract orb descriptors from frames `0..count` of an image folder.
#[cfg(feature = "opencv")]
pub fn load_orb_features<P: AsRef<Path>>(folder: P, count: usize) -> BowResult<Vec<Vec<Desc>>> {
    info!("Extracting ORB features from {} images", count);
    let mut features: Vec<Vec<Desc>> = Vec::with_capacity(count);
    for i in 0..count {
        features.push(load_img_get_kps(image_path(&folder, i))?);
        if i % 200 == 0 {
            debug!("[{}/{}]", i, count);
        }
    }
    Ok(features)
}
