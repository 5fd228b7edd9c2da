//! Convenience helpers for loading frames and masks via the `image` crate.
//!
//! Available when the `image-io` feature is enabled. Each frame is one
//! grayscale image file. 8-bit and 16-bit grayscale samples are read as
//! stored, without rescaling; other colour types are rejected.

use crate::frames::{BinMask, OwnedFrames};
use crate::util::{CorrError, CorrResult};
use image::DynamicImage;
use std::path::Path;

fn open(path: &Path) -> CorrResult<DynamicImage> {
    image::open(path).map_err(|err| CorrError::ImageIo {
        reason: format!("{}: {err}", path.display()),
    })
}

/// Grayscale samples of `img` widened to u16, with `(height, width)`.
fn gray_samples(img: DynamicImage, path: &Path) -> CorrResult<(Vec<u16>, usize, usize)> {
    let height = img.height() as usize;
    let width = img.width() as usize;
    let samples = match img {
        DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(u16::from).collect(),
        DynamicImage::ImageLuma16(buf) => buf.into_raw(),
        other => {
            return Err(CorrError::ImageIo {
                reason: format!(
                    "{}: expected 8-bit or 16-bit grayscale, got {:?}",
                    path.display(),
                    other.color()
                ),
            })
        }
    };
    Ok((samples, height, width))
}

/// Loads a list of grayscale images into one frame stack.
///
/// All frames must share the size of the first one.
pub fn load_frame_stack<P: AsRef<Path>>(paths: &[P]) -> CorrResult<OwnedFrames<u16>> {
    let first = paths.first().ok_or(CorrError::InvalidDimensions {
        frames: 0,
        height: 0,
        width: 0,
    })?;
    let first = first.as_ref();
    let (samples, height, width) = gray_samples(open(first)?, first)?;

    let mut data = Vec::with_capacity(samples.len() * paths.len());
    data.extend_from_slice(&samples);
    for path in &paths[1..] {
        let path = path.as_ref();
        let (frame, frame_height, frame_width) = gray_samples(open(path)?, path)?;
        if (frame_height, frame_width) != (height, width) {
            return Err(CorrError::ShapeMismatch {
                expected_height: height,
                expected_width: width,
                height: frame_height,
                width: frame_width,
            });
        }
        data.extend_from_slice(&frame);
    }
    OwnedFrames::new(data, paths.len(), height, width)
}

/// Loads a grayscale image whose pixel values are bin labels.
pub fn load_bin_mask<P: AsRef<Path>>(path: P) -> CorrResult<BinMask> {
    let path = path.as_ref();
    let (samples, height, width) = gray_samples(open(path)?, path)?;
    let labels = samples.into_iter().map(u32::from).collect();
    BinMask::new(labels, height, width)
}
