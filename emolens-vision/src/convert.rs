//! Planar YUV to interleaved RGB conversion.
//!
//! Camera planes are first packed into an NV21 buffer (full luma plane
//! followed by interleaved V/U pairs at quarter resolution), which is then
//! expanded to RGB with BT.601 full-range coefficients.

use image::RgbImage;
use thiserror::Error;

use crate::frame::{PlanarImage, Plane, Subsampling};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("image has zero width or height")]
    ZeroDimension,
    #[error("missing plane {0}")]
    MissingPlane(usize),
    #[error("plane {plane} too short: need {needed} bytes, got {got}")]
    ShortPlane {
        plane: usize,
        needed: usize,
        got: usize,
    },
    #[error("NV21 buffer too short: need {needed} bytes, got {got}")]
    ShortBuffer { needed: usize, got: usize },
}

/// Decode a camera image into an RGB bitmap.
pub fn decode(image: &PlanarImage<'_>) -> Result<RgbImage, ConvertError> {
    let nv21 = to_nv21(image)?;
    nv21_to_rgb(image.width, image.height, &nv21)
}

/// Pack the planes of `image` into a contiguous NV21 buffer.
pub fn to_nv21(image: &PlanarImage<'_>) -> Result<Vec<u8>, ConvertError> {
    let (w, h) = (image.width as usize, image.height as usize);
    if w == 0 || h == 0 {
        return Err(ConvertError::ZeroDimension);
    }
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let mut out = Vec::with_capacity(w * h + 2 * cw * ch);

    let y = checked_plane(image, 0, w, h)?;
    for row in 0..h {
        for col in 0..w {
            out.push(y.sample(col, row));
        }
    }

    // 4:2:2 sources keep every other chroma row
    let row_step = match image.subsampling {
        Subsampling::Yuv420 => 1,
        Subsampling::Yuv422 => 2,
        Subsampling::Monochrome => {
            out.resize(w * h + 2 * cw * ch, 128);
            return Ok(out);
        }
    };

    let (src_cols, src_rows) = image.chroma_dims();
    let u = checked_plane(image, 1, src_cols, src_rows)?;
    let v = checked_plane(image, 2, src_cols, src_rows)?;
    for row in 0..ch {
        let src_row = (row * row_step).min(src_rows - 1);
        for col in 0..cw {
            out.push(v.sample(col, src_row));
            out.push(u.sample(col, src_row));
        }
    }
    Ok(out)
}

fn checked_plane<'p>(
    image: &'p PlanarImage<'_>,
    index: usize,
    cols: usize,
    rows: usize,
) -> Result<&'p Plane<'p>, ConvertError> {
    let plane = image
        .planes
        .get(index)
        .ok_or(ConvertError::MissingPlane(index))?;
    let needed = plane.required_len(cols, rows);
    if plane.data.len() < needed {
        return Err(ConvertError::ShortPlane {
            plane: index,
            needed,
            got: plane.data.len(),
        });
    }
    Ok(plane)
}

/// Expand an NV21 buffer into an RGB image.
pub fn nv21_to_rgb(width: u32, height: u32, data: &[u8]) -> Result<RgbImage, ConvertError> {
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return Err(ConvertError::ZeroDimension);
    }
    let cw = w.div_ceil(2);
    let luma = w * h;
    let needed = luma + 2 * cw * h.div_ceil(2);
    if data.len() < needed {
        return Err(ConvertError::ShortBuffer {
            needed,
            got: data.len(),
        });
    }

    let mut out = Vec::with_capacity(luma * 3);
    for row in 0..h {
        let chroma_row = luma + (row / 2) * cw * 2;
        for col in 0..w {
            let y = data[row * w + col] as f32;
            let vu = chroma_row + (col / 2) * 2;
            let v = data[vu] as f32 - 128.0;
            let u = data[vu + 1] as f32 - 128.0;
            out.push(clamp(y + 1.402 * v));
            out.push(clamp(y - 0.344136 * u - 0.714136 * v));
            out.push(clamp(y + 1.772 * u));
        }
    }
    RgbImage::from_raw(width, height, out).ok_or(ConvertError::ShortBuffer {
        needed: luma * 3,
        got: 0,
    })
}

fn clamp(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}
