use anyhow::Result;
use image::{imageops, RgbImage};
use ndarray::Array4;

use crate::yunet::RawDetection;

/// Axis-aligned face region in pixels of the decoded image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }
        let inter = (x2 - x1) * (y2 - y1);
        inter / (self.area() + other.area() - inter)
    }

    /// Grow by `ratio` of the size on every side, then clip to the image.
    /// Returns `None` when nothing of the box is left inside.
    pub fn expand_within(&self, ratio: f32, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let dx = self.width * ratio;
        let dy = self.height * ratio;
        let x1 = (self.x - dx).max(0.0);
        let y1 = (self.y - dy).max(0.0);
        let x2 = (self.right() + dx).min(width as f32);
        let y2 = (self.bottom() + dy).min(height as f32);
        if x2 - x1 < 1.0 || y2 - y1 < 1.0 {
            return None;
        }
        Some((x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
    }
}

/// A face found in one image.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub bounds: BoundingBox,
    pub score: f32,
    pub smile_probability: f32,
    pub left_eye_open_probability: f32,
    pub right_eye_open_probability: f32,
}

/// Synchronous face detector over a decoded bitmap.
///
/// Faces come back in detector order; callers must not assume any sorting.
pub trait FaceDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>>;
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>> {
        (**self).detect(image)
    }
}

impl<D: FaceDetector + ?Sized> FaceDetector for &mut D {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>> {
        (**self).detect(image)
    }
}

/// Letterbox placement of an image on the square detector canvas.
#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl Letterbox {
    /// Map a canvas-space detection back to image pixels.
    pub fn restore(&self, d: &RawDetection) -> BoundingBox {
        BoundingBox::new(
            (d.bbox[0] - self.offset_x as f32) / self.scale,
            (d.bbox[1] - self.offset_y as f32) / self.scale,
            d.bbox[2] / self.scale,
            d.bbox[3] / self.scale,
        )
    }
}

/// Pad `img` to a `size` square without distortion and lay it out as a
/// BGR `[1, 3, size, size]` tensor.
pub fn letterbox_bgr(img: &RgbImage, size: u32) -> Result<(Array4<f32>, Letterbox)> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        anyhow::bail!("empty image");
    }
    let scale = size as f32 / w.max(h) as f32;
    let new_w = ((w as f32 * scale) as u32).clamp(1, size);
    let new_h = ((h as f32 * scale) as u32).clamp(1, size);
    let resized = imageops::resize(img, new_w, new_h, imageops::FilterType::Triangle);

    let mut canvas = RgbImage::new(size, size);
    let offset_x = (size - new_w) / 2;
    let offset_y = (size - new_h) / 2;
    imageops::overlay(&mut canvas, &resized, offset_x as i64, offset_y as i64);

    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, p) in canvas.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, 0, y, x]] = p[2] as f32;
        tensor[[0, 1, y, x]] = p[1] as f32;
        tensor[[0, 2, y, x]] = p[0] as f32;
    }
    Ok((
        tensor,
        Letterbox {
            scale,
            offset_x,
            offset_y,
        },
    ))
}

/// Greedy non-maximum suppression. Survivors keep descending score order.
pub fn nms(mut boxes: Vec<(BoundingBox, f32)>, iou_threshold: f32) -> Vec<(BoundingBox, f32)> {
    boxes.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut keep: Vec<(BoundingBox, f32)> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if keep.iter().all(|k| k.0.iou(&candidate.0) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Cut the face out of `img` with a margin and resize to a `size` square.
pub fn crop_face(img: &RgbImage, bounds: &BoundingBox, size: u32) -> Option<RgbImage> {
    let (x, y, w, h) = bounds.expand_within(0.1, img.width(), img.height())?;
    let crop = imageops::crop_imm(img, x, y, w, h).to_image();
    Some(imageops::resize(
        &crop,
        size,
        size,
        imageops::FilterType::Triangle,
    ))
}
