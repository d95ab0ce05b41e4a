//! YuNet output decoding.
//!
//! The 2023mar export emits twelve tensors, four groups of three strides
//! (8, 16, 32): `cls`, `obj`, `bbox`, `kps`. Each row of a group belongs to
//! one grid cell; boxes and landmarks are offsets from that cell in units of
//! the stride.

use anyhow::Result;
use ndarray::{Array2, ArrayView2};

pub const INPUT_SIZE: usize = 640;
const STRIDES: [usize; 3] = [8, 16, 32];

/// Detection in input-canvas pixels.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub bbox: [f32; 4], // x, y, w, h
    pub score: f32,
    pub landmarks: [f32; 10], // right eye, left eye, nose, right mouth, left mouth
}

/// Outputs of one stride.
pub struct ScaleOutputs {
    pub stride: usize,
    pub scores: Array2<f32>,
    pub bboxes: Array2<f32>,
    pub landmarks: Array2<f32>,
}

fn tensor<'a>(
    outputs: &[(&[i64], &'a [f32])],
    index: usize,
    rows: usize,
    cols: usize,
) -> Result<ArrayView2<'a, f32>> {
    let &(shape, data) = outputs
        .get(index)
        .ok_or_else(|| anyhow::anyhow!("missing output {}", index))?;
    if shape != [1, rows as i64, cols as i64] {
        anyhow::bail!(
            "output {} has shape {:?}, expected [1, {}, {}]",
            index,
            shape,
            rows,
            cols
        );
    }
    Ok(ArrayView2::from_shape((rows, cols), data)?)
}

/// Split the raw output list into per-stride groups.
///
/// Scores are the geometric mean of the clamped class and objectness
/// outputs.
pub fn parse_outputs(
    outputs: &[(&[i64], &[f32])],
    input_size: usize,
) -> Result<Vec<ScaleOutputs>> {
    let groups = STRIDES.len();
    STRIDES
        .iter()
        .enumerate()
        .map(|(k, &stride)| -> Result<ScaleOutputs> {
            let cells = (input_size / stride).pow(2);
            let cls = tensor(outputs, k, cells, 1)?;
            let obj = tensor(outputs, k + groups, cells, 1)?;
            let mut scores = cls.to_owned();
            scores.zip_mut_with(&obj, |c, &o| {
                *c = (c.clamp(0.0, 1.0) * o.clamp(0.0, 1.0)).sqrt();
            });
            Ok(ScaleOutputs {
                stride,
                scores,
                bboxes: tensor(outputs, k + 2 * groups, cells, 4)?.to_owned(),
                landmarks: tensor(outputs, k + 3 * groups, cells, 10)?.to_owned(),
            })
        })
        .collect()
}

/// Turn grid predictions above `score_threshold` into boxes.
pub fn decode(scales: &[ScaleOutputs], score_threshold: f32, input_size: usize) -> Vec<RawDetection> {
    let mut detections = Vec::new();
    for scale in scales {
        let cols = input_size / scale.stride;
        let stride = scale.stride as f32;
        for (idx, score) in scale.scores.column(0).iter().copied().enumerate() {
            if score < score_threshold {
                continue;
            }
            let col = (idx % cols) as f32;
            let row = (idx / cols) as f32;
            let b = scale.bboxes.row(idx);
            let cx = (col + b[0]) * stride;
            let cy = (row + b[1]) * stride;
            let w = b[2].exp() * stride;
            let h = b[3].exp() * stride;

            let k = scale.landmarks.row(idx);
            let mut landmarks = [0.0f32; 10];
            for p in 0..5 {
                landmarks[p * 2] = (col + k[p * 2]) * stride;
                landmarks[p * 2 + 1] = (row + k[p * 2 + 1]) * stride;
            }

            detections.push(RawDetection {
                bbox: [cx - w / 2.0, cy - h / 2.0, w, h],
                score,
                landmarks,
            });
        }
    }
    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn blank_outputs(input_size: usize) -> Vec<(Vec<i64>, Vec<f32>)> {
        let widths = [1usize, 1, 4, 10];
        let mut out = Vec::new();
        for width in widths {
            for stride in STRIDES {
                let cells = (input_size / stride).pow(2);
                out.push((vec![1, cells as i64, width as i64], vec![0.0; cells * width]));
            }
        }
        out
    }

    fn refs(outputs: &[(Vec<i64>, Vec<f32>)]) -> Vec<(&[i64], &[f32])> {
        outputs
            .iter()
            .map(|(s, d)| (s.as_slice(), d.as_slice()))
            .collect()
    }

    #[test]
    fn test_decode_single_cell() -> Result<()> {
        let mut outputs = blank_outputs(INPUT_SIZE);
        // stride 32 grid is 20x20, cell (row 10, col 10)
        let idx = 10 * 20 + 10;
        outputs[2].1[idx] = 0.81; // cls
        outputs[5].1[idx] = 1.0; // obj
        let bbox = &mut outputs[8].1[idx * 4..idx * 4 + 4];
        bbox.copy_from_slice(&[0.5, 0.25, 4.0f32.ln(), 2.0f32.ln()]);
        outputs[11].1[idx * 10] = 0.5;

        let scales = parse_outputs(&refs(&outputs), INPUT_SIZE)?;
        let detections = decode(&scales, 0.5, INPUT_SIZE);
        assert_eq!(detections.len(), 1);

        let det = &detections[0];
        assert_abs_diff_eq!(det.score, 0.9, epsilon = 1e-5);
        // center (10.5 * 32, 10.25 * 32) = (336, 328), size 128x64
        assert_abs_diff_eq!(det.bbox[0], 272.0, epsilon = 1e-3);
        assert_abs_diff_eq!(det.bbox[1], 296.0, epsilon = 1e-3);
        assert_abs_diff_eq!(det.bbox[2], 128.0, epsilon = 1e-3);
        assert_abs_diff_eq!(det.bbox[3], 64.0, epsilon = 1e-3);
        assert_abs_diff_eq!(det.landmarks[0], 336.0, epsilon = 1e-3);
        assert_abs_diff_eq!(det.landmarks[1], 320.0, epsilon = 1e-3);
        Ok(())
    }

    #[test]
    fn test_below_threshold_is_dropped() -> Result<()> {
        let mut outputs = blank_outputs(INPUT_SIZE);
        outputs[0].1[0] = 0.2;
        outputs[3].1[0] = 0.2;
        let scales = parse_outputs(&refs(&outputs), INPUT_SIZE)?;
        assert!(decode(&scales, 0.5, INPUT_SIZE).is_empty());
        Ok(())
    }

    #[test]
    fn test_wrong_shape_is_rejected() {
        let mut outputs = blank_outputs(INPUT_SIZE);
        outputs[6].0 = vec![1, 6400, 5];
        assert!(parse_outputs(&refs(&outputs), INPUT_SIZE).is_err());
    }

    #[test]
    fn test_missing_output_is_rejected() {
        let mut outputs = blank_outputs(INPUT_SIZE);
        outputs.truncate(11);
        assert!(parse_outputs(&refs(&outputs), INPUT_SIZE).is_err());
    }
}
