//! Binary descriptor files.
//!
//! A file is a stream of frames. Every frame is a sequence of feature records
//! `x: i32, y: i32, descriptor`, closed by a record whose coordinates are
//! `(-1, -1)`. All numbers are little endian. The descriptor takes
//! [`FeatureKind::RECORD_BYTES`] bytes: 128 `f32` for CNN features, 32 raw
//! bytes for ORB. The end of the file closes the last frame.

use log::{debug, info, warn};
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, ErrorKind, Read, Write},
    path::Path,
};

use crate::{BowErr, BowResult, EmptyFrames, FeatureKind, ParsePolicy, ReaderConfig};

/// Coordinates of the record that closes a frame.
pub const FRAME_END: (i32, i32) = (-1, -1);

/// Frames between two progress messages.
const PROGRESS_EVERY: usize = 200;

/// Read every frame of a descriptor file.
pub fn read_descriptor_file<F: FeatureKind, P: AsRef<Path>>(
    path: P,
    config: &ReaderConfig,
) -> BowResult<Vec<Vec<F::Descriptor>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| BowErr::cannot_open(path, e))?;
    info!("Loading {} descriptors from {:?}", F::NAME, path);
    let frames = read_descriptors::<F, _>(BufReader::new(file), config)?;
    info!("Loaded {} frames", frames.len());
    Ok(frames)
}

/// Read every frame from a stream of descriptor records.
pub fn read_descriptors<F: FeatureKind, R: Read>(
    mut reader: R,
    config: &ReaderConfig,
) -> BowResult<Vec<Vec<F::Descriptor>>> {
    let mut frames: Vec<Vec<F::Descriptor>> = Vec::new();
    let mut coords = [0u8; 8];
    let mut payload = vec![0u8; F::RECORD_BYTES];
    let mut offset: u64 = 0;
    let mut n_frames: usize = 0;
    let mut eof = false;

    while !eof {
        let mut frame: Vec<F::Descriptor> = Vec::new();
        loop {
            let record_start = offset;
            let n = read_full(&mut reader, &mut coords)?;
            offset += n as u64;
            if n == 0 {
                eof = true;
                break;
            }
            if n < coords.len() {
                truncated(config.policy, n_frames, record_start)?;
                eof = true;
                break;
            }
            let x = i32::from_le_bytes([coords[0], coords[1], coords[2], coords[3]]);
            let y = i32::from_le_bytes([coords[4], coords[5], coords[6], coords[7]]);
            if x == FRAME_END.0 || y == FRAME_END.1 {
                break;
            }

            let n = read_full(&mut reader, &mut payload)?;
            offset += n as u64;
            if n < payload.len() {
                truncated(config.policy, n_frames, record_start)?;
                eof = true;
                break;
            }
            frame.push(F::decode(&payload));
        }

        // A clean end of file right after a closed frame is not a frame.
        if eof && frame.is_empty() {
            break;
        }
        n_frames += 1;
        if !frame.is_empty() || config.empty_frames == EmptyFrames::Keep {
            frames.push(frame);
        } else {
            debug!("frame {} has no features, dropped", n_frames - 1);
        }
        if n_frames % PROGRESS_EVERY == 0 {
            debug!("read {} frames", n_frames);
        }
    }

    Ok(frames)
}

fn truncated(policy: ParsePolicy, frame: usize, offset: u64) -> BowResult<()> {
    match policy {
        ParsePolicy::Strict => Err(BowErr::Truncated { frame, offset }),
        ParsePolicy::Lenient => {
            warn!(
                "truncated record in frame {} at byte {}, ignoring the rest of the file",
                frame, offset
            );
            Ok(())
        }
    }
}

/// Fill `buf` as far as the stream allows. Returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match reader.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(m) => n += m,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

/// Write frames in the layout read by [`read_descriptor_file`]. Features get
/// `(0, i)` as coordinates.
pub fn write_descriptor_file<F: FeatureKind, P: AsRef<Path>>(
    path: P,
    frames: &[Vec<F::Descriptor>],
) -> BowResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_descriptors::<F, _>(&mut out, frames)?;
    out.flush()?;
    Ok(())
}

pub fn write_descriptors<F: FeatureKind, W: Write>(
    out: &mut W,
    frames: &[Vec<F::Descriptor>],
) -> BowResult<()> {
    let mut buf = Vec::with_capacity(8 + F::RECORD_BYTES);
    for frame in frames {
        for (i, desc) in frame.iter().enumerate() {
            buf.clear();
            buf.extend_from_slice(&0i32.to_le_bytes());
            buf.extend_from_slice(&(i as i32).to_le_bytes());
            F::encode(desc, &mut buf);
            out.write_all(&buf)?;
        }
        out.write_all(&FRAME_END.0.to_le_bytes())?;
        out.write_all(&FRAME_END.1.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cnn, CnnDesc, Desc, Orb, CNN_DESC_LEN};
    use std::io::Cursor;

    fn lenient() -> ReaderConfig {
        ReaderConfig {
            policy: ParsePolicy::Lenient,
            ..Default::default()
        }
    }

    fn cnn(v: f32) -> CnnDesc {
        vec![v; CNN_DESC_LEN]
    }

    fn record(bytes: &mut Vec<u8>, x: i32, y: i32, desc: &CnnDesc) {
        bytes.extend_from_slice(&x.to_le_bytes());
        bytes.extend_from_slice(&y.to_le_bytes());
        Cnn::encode(desc, bytes);
    }

    fn end(bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&(-1i32).to_le_bytes());
        bytes.extend_from_slice(&(-1i32).to_le_bytes());
    }

    #[test]
    fn two_frames_with_one_record_each() {
        let mut bytes = Vec::new();
        record(&mut bytes, 10, 20, &cnn(1.));
        end(&mut bytes);
        record(&mut bytes, 30, 40, &cnn(2.));
        end(&mut bytes);
        let frames = read_descriptors::<Cnn, _>(Cursor::new(bytes), &ReaderConfig::default()).unwrap();
        assert_eq!(frames, vec![vec![cnn(1.)], vec![cnn(2.)]]);
    }

    #[test]
    fn empty_frames_are_dropped_by_default() {
        let mut bytes = Vec::new();
        end(&mut bytes);
        record(&mut bytes, 1, 1, &cnn(3.));
        end(&mut bytes);
        let frames = read_descriptors::<Cnn, _>(Cursor::new(bytes), &ReaderConfig::default()).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], cnn(3.));
    }

    #[test]
    fn empty_frames_can_be_kept() {
        let mut bytes = Vec::new();
        end(&mut bytes);
        record(&mut bytes, 1, 1, &cnn(3.));
        end(&mut bytes);
        let config = ReaderConfig {
            empty_frames: EmptyFrames::Keep,
            ..Default::default()
        };
        let frames = read_descriptors::<Cnn, _>(Cursor::new(bytes), &config).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_empty());
    }

    #[test]
    fn only_one_coordinate_needs_to_be_negative() {
        let mut bytes = Vec::new();
        record(&mut bytes, 5, 5, &cnn(1.));
        bytes.extend_from_slice(&7i32.to_le_bytes());
        bytes.extend_from_slice(&(-1i32).to_le_bytes());
        record(&mut bytes, 6, 6, &cnn(2.));
        end(&mut bytes);
        let frames = read_descriptors::<Cnn, _>(Cursor::new(bytes), &ReaderConfig::default()).unwrap();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn unterminated_last_frame_is_kept() {
        let mut bytes = Vec::new();
        record(&mut bytes, 5, 5, &cnn(1.));
        end(&mut bytes);
        record(&mut bytes, 6, 6, &cnn(2.));
        record(&mut bytes, 7, 7, &cnn(3.));
        let frames = read_descriptors::<Cnn, _>(Cursor::new(bytes), &ReaderConfig::default()).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].len(), 2);
    }

    #[test]
    fn strict_truncation_reports_frame_and_offset() {
        let mut bytes = Vec::new();
        record(&mut bytes, 5, 5, &cnn(1.));
        end(&mut bytes);
        let start = bytes.len() as u64;
        record(&mut bytes, 6, 6, &cnn(2.));
        bytes.truncate(bytes.len() - 10);
        match read_descriptors::<Cnn, _>(Cursor::new(bytes), &ReaderConfig::default()) {
            Err(BowErr::Truncated { frame, offset }) => {
                assert_eq!(frame, 1);
                assert_eq!(offset, start);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn lenient_truncation_keeps_complete_records() {
        let mut bytes = Vec::new();
        record(&mut bytes, 5, 5, &cnn(1.));
        end(&mut bytes);
        record(&mut bytes, 6, 6, &cnn(2.));
        record(&mut bytes, 7, 7, &cnn(3.));
        bytes.truncate(bytes.len() - 1);
        let frames = read_descriptors::<Cnn, _>(Cursor::new(bytes), &lenient()).unwrap();
        assert_eq!(frames, vec![vec![cnn(1.)], vec![cnn(2.)]]);
    }

    #[test]
    fn lenient_partial_coordinates_end_the_stream() {
        let mut bytes = Vec::new();
        record(&mut bytes, 5, 5, &cnn(1.));
        end(&mut bytes);
        bytes.extend_from_slice(&[1, 2, 3]);
        let frames = read_descriptors::<Cnn, _>(Cursor::new(bytes.clone()), &lenient()).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(read_descriptors::<Cnn, _>(Cursor::new(bytes), &ReaderConfig::default()).is_err());
    }

    #[test]
    fn empty_stream_has_no_frames() {
        let frames = read_descriptors::<Orb, _>(Cursor::new(Vec::new()), &ReaderConfig::default()).unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn orb_files_written_and_read_back() {
        let mut d: Desc = [0; 32];
        d[5] = 42;
        let frames: Vec<Vec<Desc>> = vec![vec![d, [1; 32]], vec![[9; 32]]];
        let f = tempfile::NamedTempFile::new().unwrap();
        write_descriptor_file::<Orb, _>(f.path(), &frames).unwrap();
        assert_eq!(std::fs::metadata(f.path()).unwrap().len(), 3 * 40 + 2 * 8);
        let read = read_descriptor_file::<Orb, _>(f.path(), &ReaderConfig::default()).unwrap();
        assert_eq!(read, frames);
    }

    #[test]
    fn missing_file_cannot_be_opened() {
        let err = read_descriptor_file::<Cnn, _>("/nonexistent/desc.bin", &ReaderConfig::default())
            .unwrap_err();
        assert!(matches!(err, BowErr::CannotOpen { .. }));
    }
}
