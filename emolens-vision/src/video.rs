use anyhow::{Context, Result};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

use crate::frame::{FrameProxy, FrameSource, PlanarImage};

/// Pixel formats in order of preference. Planar first, packed as fallback.
const PREFERRED: [&[u8; 4]; 3] = [b"YU12", b"NV12", b"YUYV"];

/// V4L2 capture device delivering YUV frames.
///
/// The mmap stream re-queues a buffer when the next one is dequeued, so a
/// frame stays valid until its proxy is released and `acquire` is called
/// again.
pub struct Camera {
    stream: Stream<'static>,
    width: u32,
    height: u32,
    fourcc: FourCC,
    released: u64,
}

impl Camera {
    pub fn open(device: &str) -> Result<Self> {
        let dev = Device::with_path(device).context("open camera")?;
        let current = dev.format().context("get format")?;
        let fmt = negotiate(current, |desired| dev.set_format(desired));
        log::info!(
            "camera {} negotiated {}x{} {:?}",
            device,
            fmt.width,
            fmt.height,
            fmt.fourcc
        );
        let stream = Stream::with_buffers(&dev, Type::VideoCapture, 4).context("stream")?;
        Ok(Self {
            stream,
            width: fmt.width,
            height: fmt.height,
            fourcc: fmt.fourcc,
            released: 0,
        })
    }

    /// Number of frames handed back so far.
    pub fn released(&self) -> u64 {
        self.released
    }
}

impl FrameSource for Camera {
    fn acquire(&mut self) -> Result<Option<FrameProxy<'_>>> {
        let (data, meta) = self.stream.next().context("capture frame")?;
        log::trace!(
            "captured frame: width={} height={} fourcc={:?} seq={} len={}",
            self.width,
            self.height,
            self.fourcc,
            meta.sequence,
            data.len()
        );
        let image = planar_view(self.fourcc, self.width, self.height, data);
        let released = &mut self.released;
        Ok(Some(FrameProxy::new(
            image,
            meta.sequence as u64,
            move |seq| {
                *released += 1;
                log::trace!("released frame {}", seq);
            },
        )))
    }
}

/// Ask the driver for each preferred format in turn and keep the first one it
/// actually accepts. Drivers may answer a request with a different format, so
/// the returned format is what counts. Falls back to `current` when nothing
/// in [`PREFERRED`] is supported.
pub fn negotiate<F>(current: Format, mut set_format: F) -> Format
where
    F: FnMut(&Format) -> std::io::Result<Format>,
{
    for code in PREFERRED {
        let fourcc = FourCC::new(code);
        if current.fourcc == fourcc {
            return current;
        }
        let desired = Format::new(current.width, current.height, fourcc);
        match set_format(&desired) {
            Ok(granted) if granted.fourcc == fourcc => return granted,
            Ok(granted) => log::debug!("requested {:?}, driver offered {:?}", fourcc, granted.fourcc),
            Err(e) => log::debug!("format {:?} rejected: {}", fourcc, e),
        }
    }
    current
}

/// Describe a raw capture buffer as planes, `None` for unsupported formats.
pub fn planar_view(fourcc: FourCC, width: u32, height: u32, data: &[u8]) -> Option<PlanarImage<'_>> {
    match &fourcc.repr {
        b"YU12" => Some(PlanarImage::i420(width, height, data)),
        b"NV12" => Some(PlanarImage::nv12(width, height, data)),
        b"YUYV" => Some(PlanarImage::yuyv(width, height, data)),
        b"GREY" => Some(PlanarImage::grey(width, height, data)),
        other => {
            log::warn!(
                "unsupported pixel format {:?}, dropping frame of {} bytes",
                String::from_utf8_lossy(other),
                data.len()
            );
            None
        }
    }
}
