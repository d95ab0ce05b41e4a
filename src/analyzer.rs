use image::RgbImage;
use log::{debug, error, info, trace, warn};

use crate::classifier::{Classifier, EmotionLabel};
use crate::display::LabelPublisher;
use crate::overlay::OverlayEntry;
use emolens_vision::{convert, FaceDetector, FrameProxy, FrameSource};

/// What happened to a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The frame carried no pixel data.
    Unavailable,
    ConversionFailed,
    DetectionFailed,
    /// One label per face in detector order; empty when no face was found.
    Classified(Vec<EmotionLabel>),
}

/// How much the analyzer feeds to the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayMode {
    #[default]
    Off,
    /// Publish face boxes with their labels.
    Faces,
    /// Also publish the decoded frame the boxes belong to.
    FacesWithPreview,
}

/// Turns camera frames into published emotion labels.
pub struct FrameAnalyzer<D, P> {
    detector: D,
    classifier: Classifier,
    publisher: P,
    overlay: OverlayMode,
}

impl<D: FaceDetector, P: LabelPublisher> FrameAnalyzer<D, P> {
    pub fn new(detector: D, classifier: Classifier, publisher: P) -> Self {
        Self {
            detector,
            classifier,
            publisher,
            overlay: OverlayMode::Off,
        }
    }

    pub fn with_overlay(mut self, overlay: OverlayMode) -> Self {
        self.overlay = overlay;
        self
    }

    /// Process one frame and hand it back to its source, whatever the
    /// outcome.
    pub fn analyze(&mut self, frame: FrameProxy<'_>) -> Outcome {
        let outcome = self.process(&frame);
        frame.close();
        outcome
    }

    fn process(&mut self, frame: &FrameProxy<'_>) -> Outcome {
        let Some(image) = frame.image() else {
            trace!("frame {} has no image data", frame.sequence());
            return Outcome::Unavailable;
        };
        match convert::decode(image) {
            Ok(decoded) => self.analyze_image(decoded),
            Err(e) => {
                warn!("frame {}: bitmap conversion failed: {}", frame.sequence(), e);
                Outcome::ConversionFailed
            }
        }
    }

    /// Detect and classify every face in an already decoded image.
    pub fn analyze_image(&mut self, image: RgbImage) -> Outcome {
        let faces = match self.detector.detect(&image) {
            Ok(faces) => faces,
            Err(e) => {
                error!("face detection failed: {:#}", e);
                return Outcome::DetectionFailed;
            }
        };

        let mut labels = Vec::with_capacity(faces.len());
        let mut entries = Vec::with_capacity(faces.len());
        for face in &faces {
            debug!(
                "Smile: {:.3}, Left Eye: {:.3}, Right Eye: {:.3}",
                face.smile_probability,
                face.left_eye_open_probability,
                face.right_eye_open_probability
            );
            let label = self.classifier.classify(
                face.smile_probability,
                face.left_eye_open_probability,
                face.right_eye_open_probability,
            );
            self.publisher.publish(label);
            debug!("Face detected: {}", label);
            labels.push(label);
            entries.push(OverlayEntry {
                bounds: face.bounds,
                label,
            });
        }

        match self.overlay {
            OverlayMode::Off => {}
            OverlayMode::Faces => self.publisher.publish_faces(entries),
            OverlayMode::FacesWithPreview => {
                self.publisher.publish_preview(image, entries);
            }
        }
        Outcome::Classified(labels)
    }
}

/// Tally of a [`run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    pub unavailable: u64,
    pub conversion_failed: u64,
    pub detection_failed: u64,
    pub faces: u64,
}

impl RunStats {
    fn record(&mut self, outcome: &Outcome) {
        self.frames += 1;
        match outcome {
            Outcome::Unavailable => self.unavailable += 1,
            Outcome::ConversionFailed => self.conversion_failed += 1,
            Outcome::DetectionFailed => self.detection_failed += 1,
            Outcome::Classified(labels) => self.faces += labels.len() as u64,
        }
    }
}

/// Feed frames from `source` through `analyzer` until the stream ends,
/// `limit` frames were processed, or the source fails.
pub fn run<S, D, P>(source: &mut S, analyzer: &mut FrameAnalyzer<D, P>, limit: Option<u64>) -> RunStats
where
    S: FrameSource + ?Sized,
    D: FaceDetector,
    P: LabelPublisher,
{
    let mut stats = RunStats::default();
    while limit.map_or(true, |n| stats.frames < n) {
        let frame = match source.acquire() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("frame source finished");
                break;
            }
            Err(e) => {
                error!("frame source failed: {:#}", e);
                break;
            }
        };
        let outcome = analyzer.analyze(frame);
        stats.record(&outcome);
    }
    stats
}
