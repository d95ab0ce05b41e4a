use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::{drawing, rect::Rect};

use crate::classifier::EmotionLabel;
use emolens_vision::BoundingBox;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const STROKE_WIDTH: i32 = 8;
const TEXT_SIZE: f32 = 40.0;
const TEXT_GAP: i32 = 10;

/// A face rectangle paired with its label.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayEntry {
    pub bounds: BoundingBox,
    pub label: EmotionLabel,
}

/// Boxes and labels drawn over the camera preview.
///
/// Every update replaces the whole set and marks the view for redraw.
#[derive(Debug, Default)]
pub struct OverlayView {
    entries: Vec<OverlayEntry>,
    invalidated: bool,
}

impl OverlayView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_faces(&mut self, entries: Vec<OverlayEntry>) {
        self.entries.clear();
        self.entries.extend(entries);
        self.invalidated = true;
    }

    pub fn entries(&self) -> &[OverlayEntry] {
        &self.entries
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Paint the current entries onto `canvas` and clear the redraw flag.
    pub fn draw(&mut self, canvas: &mut RgbImage, font: Option<&FontVec>) {
        for entry in &self.entries {
            let b = &entry.bounds;
            let (left, top) = (b.x.round() as i32, b.y.round() as i32);
            let (w, h) = (b.width.round() as i32, b.height.round() as i32);
            // stroke is centred on the box edge
            for inset in -STROKE_WIDTH / 2..STROKE_WIDTH / 2 {
                let (sw, sh) = (w - 2 * inset, h - 2 * inset);
                if sw < 1 || sh < 1 {
                    continue;
                }
                let rect = Rect::at(left + inset, top + inset).of_size(sw as u32, sh as u32);
                drawing::draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
            }
            if let Some(font) = font {
                let baseline = top - TEXT_GAP;
                drawing::draw_text_mut(
                    canvas,
                    TEXT_COLOR,
                    left,
                    baseline - TEXT_SIZE as i32,
                    PxScale::from(TEXT_SIZE),
                    font,
                    entry.label.as_str(),
                );
            }
        }
        self.invalidated = false;
    }
}

pub fn load_font(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontVec::try_from_vec(data).with_context(|| format!("parsing font {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(x: f32, y: f32, label: EmotionLabel) -> OverlayEntry {
        OverlayEntry {
            bounds: BoundingBox::new(x, y, 40.0, 40.0),
            label,
        }
    }

    #[test]
    fn test_set_faces_replaces_previous_set() {
        let mut view = OverlayView::new();
        view.set_faces(vec![
            entry(0.0, 0.0, EmotionLabel::Happy),
            entry(50.0, 0.0, EmotionLabel::Sad),
        ]);
        view.set_faces(vec![entry(10.0, 10.0, EmotionLabel::Neutral)]);
        assert_eq!(view.entries().len(), 1);
        assert_eq!(view.entries()[0].label, EmotionLabel::Neutral);
        assert!(view.is_invalidated());
    }

    #[test]
    fn test_draw_paints_green_stroke_and_clears_flag() {
        let mut view = OverlayView::new();
        view.set_faces(vec![entry(20.0, 20.0, EmotionLabel::Happy)]);
        let mut canvas = RgbImage::new(100, 100);
        view.draw(&mut canvas, None);

        assert!(!view.is_invalidated());
        // on the edge, inside the stroke on both sides
        assert_eq!(*canvas.get_pixel(20, 40), BOX_COLOR);
        assert_eq!(*canvas.get_pixel(17, 40), BOX_COLOR);
        assert_eq!(*canvas.get_pixel(23, 40), BOX_COLOR);
        // well inside the box stays untouched
        assert_eq!(*canvas.get_pixel(40, 40), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_empty_set_draws_nothing() {
        let mut view = OverlayView::new();
        view.set_faces(Vec::new());
        let mut canvas = RgbImage::new(10, 10);
        view.draw(&mut canvas, None);
        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_missing_font_is_an_error() {
        assert!(load_font(Path::new("/nonexistent/font.ttf")).is_err());
    }
}
