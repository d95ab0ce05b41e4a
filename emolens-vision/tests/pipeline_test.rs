use anyhow::Result;
use emolens_vision::{FaceDetector, Pipeline, PipelineOptions};
use image::RgbImage;
use std::path::PathBuf;

fn options() -> Option<PipelineOptions> {
    let detector_model = PathBuf::from("models/face_detection_yunet_2023mar.onnx");
    let attribute_model = PathBuf::from("models/face_attributes.onnx");
    if !detector_model.exists() || !attribute_model.exists() {
        eprintln!("Skipping: models not found under models/");
        return None;
    }
    Some(PipelineOptions {
        detector_model,
        attribute_model,
        attribute_input_size: 64,
        attribute_logits: false,
        score_threshold: 0.6,
        nms_threshold: 0.3,
    })
}

#[test]
fn test_missing_model_is_reported() {
    let opts = PipelineOptions {
        detector_model: PathBuf::from("/nonexistent/yunet.onnx"),
        attribute_model: PathBuf::from("/nonexistent/attributes.onnx"),
        attribute_input_size: 64,
        attribute_logits: false,
        score_threshold: 0.6,
        nms_threshold: 0.3,
    };
    let err = Pipeline::new(&opts).err().expect("pipeline without models");
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_blank_image_has_no_faces() -> Result<()> {
    env_logger::try_init().ok();
    let Some(opts) = options() else {
        return Ok(());
    };
    let mut pipeline = Pipeline::new(&opts)?;
    let faces = pipeline.detect(&RgbImage::new(640, 480))?;
    assert!(faces.is_empty());
    Ok(())
}

#[test]
fn test_face_probabilities_in_unit_range() -> Result<()> {
    env_logger::try_init().ok();
    let Some(opts) = options() else {
        return Ok(());
    };
    let img_path = "test_faces/smile.png";
    if !std::path::Path::new(img_path).exists() {
        eprintln!("Skipping: {} not found", img_path);
        return Ok(());
    }
    let img = image::open(img_path)?.to_rgb8();
    let mut pipeline = Pipeline::new(&opts)?;
    let faces = pipeline.detect(&img)?;
    assert!(!faces.is_empty(), "expected a face in {}", img_path);
    for face in &faces {
        for p in [
            face.smile_probability,
            face.left_eye_open_probability,
            face.right_eye_open_probability,
        ] {
            assert!((0.0..=1.0).contains(&p));
        }
        assert!(face.bounds.width > 10.0 && face.bounds.height > 10.0);
    }
    Ok(())
}
