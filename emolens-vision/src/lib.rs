pub mod attributes;
pub mod convert;
pub mod face;
pub mod frame;
pub mod model;
pub mod pipeline;
pub mod video;
pub mod yunet;

// Re-export commonly used types
pub use convert::ConvertError;
pub use face::{BoundingBox, DetectedFace, FaceDetector};
pub use frame::{FrameProxy, FrameSource, PlanarImage};
pub use pipeline::{Pipeline, PipelineOptions};
pub use video::Camera;
