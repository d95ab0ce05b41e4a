use std::path::PathBuf;

use anyhow::{Context, Result};
use image::RgbImage;
use ort::{session::Session, value::Value};

use crate::attributes::AttributeEstimator;
use crate::face::{self, DetectedFace, FaceDetector};
use crate::yunet;

/// Where the models live and how to read them.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub detector_model: PathBuf,
    pub attribute_model: PathBuf,
    pub attribute_input_size: u32,
    pub attribute_logits: bool,
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

/// Full pipeline: detect faces → crop → estimate attributes
pub struct Pipeline {
    pub detector: Session,
    pub attributes: AttributeEstimator,
    score_threshold: f32,
    nms_threshold: f32,
}

impl Pipeline {
    pub fn new(options: &PipelineOptions) -> Result<Self> {
        let attributes = AttributeEstimator::new(
            crate::model::attribute_session(&options.attribute_model)?,
            options.attribute_input_size,
            options.attribute_logits,
        );
        Ok(Self {
            detector: crate::model::detector_session(&options.detector_model)?,
            attributes,
            score_threshold: options.score_threshold,
            nms_threshold: options.nms_threshold,
        })
    }

    /// Face boxes and scores after NMS, highest score first.
    pub fn locate(&mut self, img: &RgbImage) -> Result<Vec<(face::BoundingBox, f32)>> {
        let size = yunet::INPUT_SIZE;
        let (input, letterbox) = face::letterbox_bgr(img, size as u32)?;
        let input_tensor = Value::from_array(input)?;
        let outputs = self
            .detector
            .run(ort::inputs![input_tensor])
            .context("detector inference")?;

        let mut output_data: Vec<(Vec<i64>, Vec<f32>)> = Vec::new();
        for (_name, output) in outputs.iter() {
            let (shape, data) = output.try_extract_tensor::<f32>()?;
            output_data.push((shape.iter().copied().collect(), data.to_vec()));
        }
        let output_refs: Vec<(&[i64], &[f32])> = output_data
            .iter()
            .map(|(s, d)| (s.as_slice(), d.as_slice()))
            .collect();

        let scales = yunet::parse_outputs(&output_refs, size)?;
        let boxes = yunet::decode(&scales, self.score_threshold, size)
            .iter()
            .map(|d| (letterbox.restore(d), d.score))
            .collect();
        Ok(face::nms(boxes, self.nms_threshold))
    }
}

impl FaceDetector for Pipeline {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>> {
        let located = self.locate(image).context("locating faces")?;
        let mut faces = Vec::with_capacity(located.len());
        for (bounds, score) in located {
            let Some(crop) = face::crop_face(image, &bounds, self.attributes.input_size()) else {
                log::debug!("face at {:?} lies outside the image, skipping", bounds);
                continue;
            };
            let attrs = self.attributes.estimate(&crop).context("estimating attributes")?;
            faces.push(DetectedFace {
                bounds,
                score,
                smile_probability: attrs.smile,
                left_eye_open_probability: attrs.left_eye_open,
                right_eye_open_probability: attrs.right_eye_open,
            });
        }
        Ok(faces)
    }
}
