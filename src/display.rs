//! UI-thread side of the app.
//!
//! Background work never touches the views. It posts [`UiMessage`]s through
//! a [`UiHandle`], and the [`UiLoop`] on the UI thread applies them in the
//! order they were sent.

use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use ab_glyph::FontVec;
use crossbeam_channel::{Receiver, Sender};
use image::RgbImage;
use log::{debug, error, warn};

use crate::classifier::EmotionLabel;
use crate::overlay::{OverlayEntry, OverlayView};

#[derive(Debug)]
pub enum UiMessage {
    Label(EmotionLabel),
    Faces(Vec<OverlayEntry>),
    /// The preview slot holds a new frame.
    PreviewReady,
}

/// A decoded frame with the faces found in it.
#[derive(Debug)]
pub struct Preview {
    pub image: RgbImage,
    pub entries: Vec<OverlayEntry>,
}

/// Latest unconsumed preview. A newer frame replaces an older one that the
/// UI thread has not picked up yet.
type PreviewSlot = Arc<Mutex<Option<Preview>>>;

fn lock(slot: &PreviewSlot) -> MutexGuard<'_, Option<Preview>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Receiver of classification results.
pub trait LabelPublisher {
    fn publish(&self, label: EmotionLabel);

    fn publish_faces(&self, _entries: Vec<OverlayEntry>) {}

    fn publish_preview(&self, _image: RgbImage, _entries: Vec<OverlayEntry>) {}
}

/// Sending half of the UI queue. Cheap to clone and safe to move to worker
/// threads.
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: Sender<UiMessage>,
    preview: PreviewSlot,
}

impl UiHandle {
    /// Queue a message for the UI thread. Messages posted after the UI loop
    /// has gone away are dropped.
    pub fn post(&self, msg: UiMessage) {
        if self.tx.send(msg).is_err() {
            debug!("ui loop closed, dropping update");
        }
    }
}

impl LabelPublisher for UiHandle {
    fn publish(&self, label: EmotionLabel) {
        self.post(UiMessage::Label(label));
    }

    fn publish_faces(&self, entries: Vec<OverlayEntry>) {
        self.post(UiMessage::Faces(entries));
    }

    fn publish_preview(&self, image: RgbImage, entries: Vec<OverlayEntry>) {
        let replaced = lock(&self.preview).replace(Preview { image, entries });
        // Only an empty slot needs a wake-up, the pending one covers the rest.
        match replaced {
            None => self.post(UiMessage::PreviewReady),
            Some(_) => debug!("ui behind, dropping stale preview"),
        }
    }
}

/// Receiving half of the UI queue.
#[derive(Debug)]
pub struct UiQueue {
    rx: Receiver<UiMessage>,
    preview: PreviewSlot,
}

impl UiQueue {
    /// Messages waiting to be applied.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    fn take_preview(&self) -> Option<Preview> {
        lock(&self.preview).take()
    }
}

pub fn channel() -> (UiHandle, UiQueue) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let preview = PreviewSlot::default();
    (
        UiHandle {
            tx,
            preview: preview.clone(),
        },
        UiQueue { rx, preview },
    )
}

/// The text label showing the current emotion.
///
/// Not `Send`: it stays on the thread that created it.
pub struct LabelView<W: Write> {
    text: String,
    updates: u64,
    out: W,
    _ui_thread: PhantomData<*const ()>,
}

impl LabelView<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> LabelView<W> {
    pub fn new(out: W) -> Self {
        Self {
            text: String::new(),
            updates: 0,
            out,
            _ui_thread: PhantomData,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of times the text was set.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Replace the text. Redraws only when it changed.
    pub fn set_text(&mut self, text: &str) -> io::Result<()> {
        self.updates += 1;
        if self.text == text {
            return Ok(());
        }
        self.text.clear();
        self.text.push_str(text);
        writeln!(self.out, "{}", self.text)?;
        self.out.flush()
    }
}

/// Where the annotated preview goes.
pub struct SnapshotTarget {
    pub path: PathBuf,
    pub font: Option<FontVec>,
}

/// Drains the UI queue on the UI thread.
pub struct UiLoop<W: Write> {
    queue: UiQueue,
    label: LabelView<W>,
    overlay: OverlayView,
    preview: Option<RgbImage>,
    snapshot: Option<SnapshotTarget>,
}

impl<W: Write> UiLoop<W> {
    pub fn new(queue: UiQueue, label: LabelView<W>, snapshot: Option<SnapshotTarget>) -> Self {
        Self {
            queue,
            label,
            overlay: OverlayView::new(),
            preview: None,
            snapshot,
        }
    }

    /// Apply messages until every [`UiHandle`] is dropped.
    pub fn run(&mut self) {
        while let Ok(msg) = self.queue.rx.recv() {
            self.apply(msg);
        }
    }

    /// Apply whatever is queued right now without blocking.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(msg) = self.queue.rx.try_recv() {
            self.apply(msg);
            applied += 1;
        }
        applied
    }

    pub fn apply(&mut self, msg: UiMessage) {
        match msg {
            UiMessage::Label(label) => {
                if let Err(e) = self.label.set_text(label.as_str()) {
                    warn!("failed to render label: {}", e);
                }
            }
            UiMessage::Faces(entries) => self.overlay.set_faces(entries),
            UiMessage::PreviewReady => {
                if let Some(Preview { image, entries }) = self.queue.take_preview() {
                    self.preview = Some(image);
                    self.overlay.set_faces(entries);
                }
            }
        }
        if self.overlay.is_invalidated() {
            self.repaint();
        }
    }

    fn repaint(&mut self) {
        let (Some(target), Some(preview)) = (&self.snapshot, &self.preview) else {
            return;
        };
        let mut canvas = preview.clone();
        self.overlay.draw(&mut canvas, target.font.as_ref());
        if let Err(e) = canvas.save(&target.path) {
            error!("failed to write snapshot {}: {}", target.path.display(), e);
        }
    }

    pub fn label(&self) -> &LabelView<W> {
        &self.label
    }

    pub fn overlay(&self) -> &OverlayView {
        &self.overlay
    }
}
