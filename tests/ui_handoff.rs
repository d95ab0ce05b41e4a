use anyhow::Result;
use emolens::analyzer::{self, FrameAnalyzer};
use emolens::display::{self, LabelView, UiLoop};
use emolens::frame::PlanarImage;
use emolens::{BoundingBox, Classifier, DetectedFace, FaceDetector, FrameProxy, FrameSource};
use image::RgbImage;

struct CountingSource {
    remaining: u32,
    sequence: u64,
}

impl FrameSource for CountingSource {
    fn acquire(&mut self) -> Result<Option<FrameProxy<'_>>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.sequence += 1;
        let image = PlanarImage::grey(8, 8, vec![60u8; 64]);
        Ok(Some(FrameProxy::new(Some(image), self.sequence, |_| {})))
    }
}

/// Alternates between a smiling face and a frowning one, two faces per
/// frame, the second one deciding the displayed label.
struct AlternatingDetector {
    calls: u32,
}

impl FaceDetector for AlternatingDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<DetectedFace>> {
        self.calls += 1;
        let last = if self.calls % 2 == 0 { 0.9 } else { 0.1 };
        Ok([0.5, last]
            .into_iter()
            .map(|smile| DetectedFace {
                bounds: BoundingBox::new(0.0, 0.0, 4.0, 4.0),
                score: 0.8,
                smile_probability: smile,
                left_eye_open_probability: 0.9,
                right_eye_open_probability: 0.9,
            })
            .collect())
    }
}

#[test]
fn test_labels_reach_ui_thread_in_order() {
    let (ui, rx) = display::channel();

    let worker = std::thread::spawn(move || {
        let mut source = CountingSource {
            remaining: 10,
            sequence: 0,
        };
        let mut frame_analyzer =
            FrameAnalyzer::new(AlternatingDetector { calls: 0 }, Classifier::exact(), ui);
        analyzer::run(&mut source, &mut frame_analyzer, None)
    });

    // The label view lives here, on the test's own thread.
    let mut ui_loop = UiLoop::new(rx, LabelView::new(Vec::new()), None);
    ui_loop.run();
    let stats = worker.join().expect("analyzer thread panicked");

    assert_eq!(stats.frames, 10);
    assert_eq!(stats.faces, 20);
    assert_eq!(ui_loop.label().updates(), 20);
    // frame 10 is even, its last face smiles
    assert_eq!(ui_loop.label().text(), "Feliz");

    let printed = String::from_utf8(ui_loop.label().output().clone()).unwrap();
    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(&lines[..4], &["Neutral", "Triste", "Neutral", "Feliz"]);
}
