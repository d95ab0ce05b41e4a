pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod display;
pub mod overlay;
pub mod permission;

// Re-export vision types for convenience
pub use classifier::{classify, Classifier, EmotionLabel};
pub use emolens_vision::{
    convert, face, frame, pipeline, video, BoundingBox, DetectedFace, FaceDetector, FrameProxy,
    FrameSource, Pipeline,
};
