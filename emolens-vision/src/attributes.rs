use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use ndarray::Array4;
use ort::{session::Session, value::Value};

/// Per-face probabilities, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceAttributes {
    pub smile: f32,
    pub left_eye_open: f32,
    pub right_eye_open: f32,
}

impl FaceAttributes {
    /// Read the first three values of a model output as smile, left eye
    /// open, right eye open.
    pub fn from_output(values: &[f32], logits: bool) -> Result<Self> {
        let [smile, left, right] = match values {
            [a, b, c, ..] => [*a, *b, *c],
            _ => anyhow::bail!("attribute output has {} values, need 3", values.len()),
        };
        let squash = |v: f32| {
            let p = if logits { sigmoid(v) } else { v };
            if p.is_nan() {
                0.0
            } else {
                p.clamp(0.0, 1.0)
            }
        };
        Ok(Self {
            smile: squash(smile),
            left_eye_open: squash(left),
            right_eye_open: squash(right),
        })
    }
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Runs the face attribute model on cropped faces.
///
/// Input is `[1, 3, S, S]` RGB scaled to `[0, 1]`.
pub struct AttributeEstimator {
    session: Session,
    input_size: u32,
    logits: bool,
}

impl AttributeEstimator {
    pub fn new(session: Session, input_size: u32, logits: bool) -> Self {
        Self {
            session,
            input_size,
            logits,
        }
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn estimate(&mut self, face: &RgbImage) -> Result<FaceAttributes> {
        let input = to_tensor(face, self.input_size);
        let input_tensor = Value::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .context("attribute inference")?;
        let (_shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        FaceAttributes::from_output(data, self.logits)
    }
}

fn to_tensor(face: &RgbImage, size: u32) -> Array4<f32> {
    let face = if face.dimensions() == (size, size) {
        face.clone()
    } else {
        imageops::resize(face, size, size, imageops::FilterType::Triangle)
    };
    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, p) in face.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = p[c] as f32 / 255.0;
        }
    }
    tensor
}
